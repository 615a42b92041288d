use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Target url
    #[arg(short, long, default_value = "http://127.0.0.1:8000/submit_order")]
    pub url: String,

    /// Number of virtual users
    #[arg(long, default_value_t = 1000)]
    pub vus: usize,

    /// Test duration, e.g. 1s, 500ms, 2m
    #[arg(short, long, default_value = "1s")]
    pub duration: String,

    /// k6 style options file ({"vus": .., "duration": ..}), overrides --vus and --duration
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Request method
    #[arg(short, long, default_value = "POST")]
    pub method: String,

    /// Request body as json, defaults to a BTCUSDT limit buy order
    #[arg(short, long)]
    pub json: Option<String>,

    /// Extra headers as `Name: Value`
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Per request timeout in seconds, 0 disables it
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Seconds between progress log lines, 0 disables them
    #[arg(long, default_value_t = 1)]
    pub progress: u64,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}
