//! Benchmarks for opening publications and serializing manifests.
//!
//! Run with: cargo bench

use std::fs::File;
use std::hint::black_box;
use std::io::Write;
use std::path::{Path, PathBuf};

use criterion::{Criterion, criterion_group, criterion_main};
use zip::write::SimpleFileOptions;

use rwp::asset::FileAsset;
use rwp::streamer::{Streamer, StreamerConfig};

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

const CHAPTERS: usize = 100;

/// An EPUB with many chapters, so that parsing dominates archive opening.
fn write_epub(dir: &Path) -> PathBuf {
    let items: String = (0..CHAPTERS)
        .map(|i| format!("<item id=\"c{i}\" href=\"c{i}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"))
        .collect();
    let itemrefs: String = (0..CHAPTERS).map(|i| format!("<itemref idref=\"c{i}\"/>\n")).collect();
    let nav_items: String = (0..CHAPTERS)
        .map(|i| format!("<li><a href=\"c{i}.xhtml\">Chapter {i}</a></li>\n"))
        .collect();
    let opf = format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">bench-book</dc:identifier>
    <dc:title>Benchmark</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    {items}
  </manifest>
  <spine>{itemrefs}</spine>
</package>"#
    );
    let nav = format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol>{nav_items}</ol></nav></body></html>"#
    );

    let path = dir.join("bench.epub");
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    for (name, data) in [
        ("META-INF/container.xml", CONTAINER.to_string()),
        ("OEBPS/content.opf", opf),
        ("OEBPS/nav.xhtml", nav),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    for i in 0..CHAPTERS {
        zip.start_file(format!("OEBPS/c{i}.xhtml"), SimpleFileOptions::default())
            .unwrap();
        write!(zip, "<html><body><h1>Chapter {i}</h1><p>Text.</p></body></html>").unwrap();
    }
    zip.finish().unwrap();
    path
}

fn bench_open_epub(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_epub(dir.path());
    let streamer = Streamer::new(StreamerConfig::default());

    c.bench_function("open_epub", |b| {
        b.iter(|| streamer.open(&FileAsset::new(black_box(&path))).unwrap());
    });
}

fn bench_manifest_json(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_epub(dir.path());
    let publication = Streamer::new(StreamerConfig::default())
        .open(&FileAsset::new(&path))
        .unwrap();

    c.bench_function("manifest_json", |b| {
        b.iter(|| {
            let manifest = publication.manifest().with_relative_hrefs();
            black_box(manifest.to_json(None).unwrap())
        });
    });
}

criterion_group!(benches, bench_open_epub, bench_manifest_json);
criterion_main!(benches);
