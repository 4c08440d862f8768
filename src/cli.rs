use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mixlens", about = "Audio mix analyzer with production feedback")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, M4A, AAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write `<file_id>.json` reports here instead of printing to stdout
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Config file (defaults to mixlens.toml or the global config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print a usage metrics summary after processing
    #[arg(long)]
    pub metrics: bool,

    /// Number of files analysed in parallel (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}
