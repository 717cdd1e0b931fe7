//! Publication fixtures written to temporary directories.

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use rwp::decoder::deobfuscation::{deobfuscate, idpf_key};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const IDENTIFIER: &str = "urn:uuid:2c8b6ad1-4bf4-4f0c-8a5d-4f1e9c4d7b10";

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

pub const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="pub-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="pub-id">urn:uuid:2c8b6ad1-4bf4-4f0c-8a5d-4f1e9c4d7b10</dc:identifier>
    <dc:title>The Little Streamer</dc:title>
    <dc:creator>Ada Reader</dc:creator>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">2024-03-01T10:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="style" href="css/style.css" media-type="text/css"/>
    <item id="font" href="fonts/serif.otf" media-type="application/vnd.ms-opentype"/>
    <item id="ch1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc"><ol>
    <li><a href="text/chapter1.xhtml">Departure</a></li>
    <li><a href="text/chapter2.xhtml">Arrival</a></li>
  </ol></nav>
</body>
</html>"#;

pub const ENCRYPTION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container" xmlns:enc="http://www.w3.org/2001/04/xmlenc#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.idpf.org/2008/embedding"/>
    <enc:CipherData><enc:CipherReference URI="OEBPS/fonts/serif.otf"/></enc:CipherData>
  </enc:EncryptedData>
</encryption>"#;

pub const CHAPTER1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="en">
<head><title>Departure</title><link rel="stylesheet" href="../css/style.css"/></head>
<body>
  <h1>Departure</h1>
  <p>The train left at dawn.</p>
  <p>Nobody waved.</p>
</body>
</html>"#;

pub const CHAPTER2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="en">
<head><title>Arrival</title></head>
<body>
  <h1>Arrival</h1>
  <p>The station was empty.</p>
</body>
</html>"#;

pub const STYLE: &str = "body { font-family: serif; }\n";

/// Plain font bytes, longer than the obfuscated head.
pub fn font() -> Vec<u8> {
    (0..3000u32).map(|i| (i % 251) as u8).collect()
}

fn obfuscated_font() -> Vec<u8> {
    let mut data = font();
    let length = data.len() as u64;
    deobfuscate(&mut data, 0, &idpf_key(IDENTIFIER), length.min(1040));
    data
}

/// A chapter long enough to be worth compressing.
pub fn long_chapter() -> String {
    let paragraphs: String = (0..200)
        .map(|i| format!("  <p>Paragraph number {i} of a rather long chapter.</p>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Long</title></head><body>\n{paragraphs}</body></html>"
    )
}

/// A ZIP archive in memory; the first entry is stored, the others deflated.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (i, (name, data)) in entries.iter().enumerate() {
        let method = if i == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        zip.start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Write a ZIP archive; the first entry is stored, the others deflated.
pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    fs::write(path, zip_bytes(entries)).unwrap();
}

pub fn epub_entries() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("mimetype", b"application/epub+zip".to_vec()),
        ("META-INF/container.xml", CONTAINER.as_bytes().to_vec()),
        ("META-INF/encryption.xml", ENCRYPTION.as_bytes().to_vec()),
        ("OEBPS/content.opf", OPF.as_bytes().to_vec()),
        ("OEBPS/nav.xhtml", NAV.as_bytes().to_vec()),
        ("OEBPS/css/style.css", STYLE.as_bytes().to_vec()),
        ("OEBPS/fonts/serif.otf", obfuscated_font()),
        ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes().to_vec()),
        ("OEBPS/text/chapter2.xhtml", long_chapter().into_bytes()),
    ]
}

/// Write the sample EPUB as `dir/name`.
pub fn write_epub(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_zip(&path, &epub_entries());
    path
}

/// Write a two-track audiobook as `dir/name`.
pub fn write_audiobook(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("01 - Opening.mp3", b"ID3\x03\x00\x00\x00\x00\x00\x00first".to_vec()),
            ("02 - Closing.mp3", b"ID3\x03\x00\x00\x00\x00\x00\x00second".to_vec()),
        ],
    );
    path
}

/// Write a comic with two pages as `dir/name`.
pub fn write_comic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("page1.png", b"\x89PNG\r\n\x1a\n1".to_vec()),
            ("page2.png", b"\x89PNG\r\n\x1a\n2".to_vec()),
        ],
    );
    path
}
