use anyhow::Result;
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use crate::cli::Cli;

/// Global config structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// RPC related config
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    #[serde(default = "RpcConfig::default_url")]
    pub url: String,
    /// Per-request timeout
    #[serde(default = "RpcConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RpcConfig {
    fn default_url() -> String {
        "https://rpc.gnosischain.com".to_string()
    }
    fn default_timeout_secs() -> u64 {
        15
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Scan task config
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "ScannerConfig::default_chain_name")]
    pub chain_name: String,
    #[serde(default = "ScannerConfig::default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub start_block: u64,
    /// Latest block when unset
    #[serde(default)]
    pub end_block: Option<u64>,
    /// Deadline for the whole scan
    #[serde(default)]
    pub scan_timeout_secs: Option<u64>,
}

impl ScannerConfig {
    fn default_chain_name() -> String {
        "gnosis".to_string()
    }
    fn default_workers() -> usize {
        10
    }

    pub fn worker_count(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.workers)
            .ok_or_else(|| anyhow::anyhow!("scanner.workers must be at least 1"))
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            chain_name: Self::default_chain_name(),
            workers: Self::default_workers(),
            start_block: 0,
            end_block: None,
            scan_timeout_secs: None,
        }
    }
}

/// Logging config
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_file_path() -> String {
        "./logs/extradata-scanner.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            to_file: false,
            file_path: Self::default_file_path(),
        }
    }
}

/// Metrics config
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "MetricsConfig::default_prometheus_exporter_port")]
    pub prometheus_exporter_port: u16,
}

impl MetricsConfig {
    fn default_prometheus_exporter_port() -> u16 {
        9100
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            prometheus_exporter_port: Self::default_prometheus_exporter_port(),
        }
    }
}

impl AppConfig {
    /// Layer defaults, the optional config file and `SCANNER__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok(); // Load the .env file

        let mut builder = config_loader::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            builder = builder.add_source(config_loader::File::from(path.to_path_buf()));
        }

        let loaded = builder
            .add_source(config_loader::Environment::with_prefix("SCANNER").separator("__"))
            .build()?;

        Ok(loaded.try_deserialize::<AppConfig>()?)
    }

    /// Command line flags take precedence over file and environment values
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.rpc {
            self.rpc.url = url.clone();
        }
        if let Some(start) = cli.start {
            self.scanner.start_block = start;
        }
        if let Some(end) = cli.end {
            self.scanner.end_block = Some(end);
        }
        if let Some(workers) = cli.workers {
            self.scanner.workers = workers;
        }
        if let Some(secs) = cli.timeout_secs {
            self.scanner.scan_timeout_secs = Some(secs);
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn defaults_are_applied() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.rpc.url, "https://rpc.gnosischain.com");
        assert_eq!(cfg.rpc.timeout_secs, 15);
        assert_eq!(cfg.scanner.workers, 10);
        assert_eq!(cfg.scanner.start_block, 0);
        assert!(cfg.scanner.end_block.is_none());
        assert!(!cfg.metrics.enable);
        assert_eq!(cfg.metrics.prometheus_exporter_port, 9100);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn load_partial_yaml_fills_defaults() -> Result<()> {
        let mut file = Builder::new().suffix(".yaml").tempfile()?;
        writeln!(
            file,
            "rpc:\n  url: http://localhost:8545\nscanner:\n  workers: 4\n  start_block: 100\n  end_block: 104"
        )?;

        let cfg = AppConfig::load(Some(file.path()))?;
        assert_eq!(cfg.rpc.url, "http://localhost:8545");
        assert_eq!(cfg.rpc.timeout_secs, 15);
        assert_eq!(cfg.scanner.workers, 4);
        assert_eq!(cfg.scanner.start_block, 100);
        assert_eq!(cfg.scanner.end_block, Some(104));
        assert_eq!(cfg.scanner.chain_name, "gnosis");
        assert_eq!(cfg.logging.level, "info");
        Ok(())
    }

    #[test]
    fn cli_overrides_loaded_values() {
        let mut cfg = AppConfig::default();
        let cli = Cli::parse_from([
            "extradata-scanner",
            "--rpc",
            "http://node:8545",
            "--start",
            "5",
            "--end",
            "9",
            "--workers",
            "2",
            "--timeout-secs",
            "30",
        ]);
        cfg.apply_cli(&cli);

        assert_eq!(cfg.rpc.url, "http://node:8545");
        assert_eq!(cfg.scanner.start_block, 5);
        assert_eq!(cfg.scanner.end_block, Some(9));
        assert_eq!(cfg.scanner.workers, 2);
        assert_eq!(cfg.scanner.scan_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = ScannerConfig {
            workers: 0,
            ..ScannerConfig::default()
        };
        assert!(cfg.worker_count().is_err());
        assert_eq!(ScannerConfig::default().worker_count().unwrap().get(), 10);
    }
}
