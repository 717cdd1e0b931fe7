//! rwp - Readium Web Publication streamer

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use rwp::asset::FileAsset;
use rwp::server::{self, ServerConfig};
use rwp::streamer::{InferA11y, Streamer, StreamerConfig};

#[derive(Parser)]
#[command(name = "rwp")]
#[command(version, about = "Readium Web Publication streamer", long_about = None)]
#[command(after_help = "EXAMPLES:
    rwp serve ~/books               Serve a directory of publications
    rwp manifest book.epub -i 2     Print the manifest of a publication")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the publications of a directory over HTTP
    Serve {
        /// Directory containing the publications
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:15080")]
        bind: SocketAddr,

        /// Indent JSON responses with N spaces
        #[arg(short, long, value_name = "N")]
        indent: Option<usize>,

        /// Infer accessibility metadata
        #[arg(long, value_enum, default_value_t = A11yMode::No)]
        infer_a11y: A11yMode,
    },
    /// Print the manifest of a publication
    Manifest {
        /// EPUB, audiobook, comic or packaged Web Publication
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Indent the JSON with N spaces
        #[arg(short, long, value_name = "N")]
        indent: Option<usize>,

        /// Infer accessibility metadata
        #[arg(long, value_enum, default_value_t = A11yMode::No)]
        infer_a11y: A11yMode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum A11yMode {
    No,
    Merged,
    Split,
}

impl From<A11yMode> for InferA11y {
    fn from(mode: A11yMode) -> Self {
        match mode {
            A11yMode::No => InferA11y::No,
            A11yMode::Merged => InferA11y::Merged,
            A11yMode::Split => InferA11y::Split,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve {
            directory,
            bind,
            indent,
            infer_a11y,
        } => serve(ServerConfig {
            base_directory: directory,
            bind_address: bind,
            json_indent: indent.map(|n| " ".repeat(n)),
            infer_a11y: infer_a11y.into(),
            ..Default::default()
        }),
        Command::Manifest {
            path,
            indent,
            infer_a11y,
        } => print_manifest(path, indent, infer_a11y.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(config: ServerConfig) -> rwp::Result<()> {
    if !config.base_directory.is_dir() {
        return Err(rwp::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", config.base_directory.display()),
        )));
    }
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(config))
}

fn print_manifest(path: PathBuf, indent: Option<usize>, infer_a11y: InferA11y) -> rwp::Result<()> {
    let streamer = Streamer::new(StreamerConfig {
        infer_a11y,
        ..Default::default()
    });
    let publication = streamer.open(&FileAsset::new(path))?;
    let manifest = publication.manifest().with_relative_hrefs();
    let json = match indent {
        Some(n) => manifest.to_json_pretty(None, &" ".repeat(n))?,
        None => manifest.to_json(None)?,
    };
    println!("{json}");
    Ok(())
}
