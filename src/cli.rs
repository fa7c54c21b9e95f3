use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "extradata-scanner",
    version,
    about = "Scan a block range and count the distinct extra-data values"
)]
pub struct Cli {
    /// Config file path (YAML or TOML); defaults and SCANNER__* env vars apply without one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the node
    #[arg(long)]
    pub rpc: Option<String>,

    /// First block of the range
    #[arg(long)]
    pub start: Option<u64>,

    /// Last block of the range (inclusive). Latest block when omitted or below start
    #[arg(long)]
    pub end: Option<u64>,

    /// Number of concurrent fetchers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Cancel the scan after this many seconds and report the partial result
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log filter, e.g. "info" or "rs_extradata_scanner=debug"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["extradata-scanner"]);
        assert!(cli.config.is_none());
        assert!(cli.end.is_none());
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn parses_json_output() {
        let cli = Cli::parse_from(["extradata-scanner", "--output", "json", "--start", "100"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.start, Some(100));
    }
}
