use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (TOML). Defaults to `orchestrator.toml` if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port of the HTTP control surface
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between trading cycles (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub check_interval: Option<u64>,

    /// Log filter, e.g. `info` or `system_orchestrator=debug`
    #[arg(long)]
    pub log_level: Option<String>,
}
