use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "parley", about = "Chat with a model that can call tools")]
pub struct Args {
    /// Config file to use instead of the platform default.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter directive (e.g. "debug" or "parley_ai=trace").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Wait for complete replies instead of streaming them.
    #[arg(long)]
    pub no_stream: bool,

    /// Model name, overriding the config.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory of documents served for `/commands`, `@mentions` and tools.
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}
