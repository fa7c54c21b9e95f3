use std::{sync::Arc, time::Instant};

use anyhow::Result;
use clap::Parser;
use rs_extradata_scanner::{
    chains::evm::client::EvmClient,
    cli::{Cli, OutputFormat},
    config::AppConfig,
    core::{
        context::ScanContext,
        scanner::ExtraDataScanner,
        types::{BlockRange, ScanStatus},
    },
    report::{ScanReport, render_table},
    utils::{
        logger::init_logger,
        metrics::{NoopScanMetrics, PrometheusScanMetrics, ScanMetrics, install_prometheus_exporter},
        progress::LogProgress,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let mut cfg = AppConfig::load(args.config.as_deref())?;
    cfg.apply_cli(&args);

    init_logger(&cfg.logging)?;

    info!(chain_name = %cfg.scanner.chain_name, "Chain name");
    info!(rpc_url = %cfg.rpc.url, "RPC node");

    let metrics: Arc<dyn ScanMetrics> = if cfg.metrics.enable {
        install_prometheus_exporter(cfg.metrics.prometheus_exporter_port)?;
        info!(
            port = cfg.metrics.prometheus_exporter_port,
            "📈 Prometheus exporter listening"
        );
        Arc::new(PrometheusScanMetrics::new(cfg.scanner.chain_name.clone()))
    } else {
        Arc::new(NoopScanMetrics::new())
    };

    let client = Arc::new(EvmClient::new(&cfg.rpc.url, cfg.rpc.request_timeout())?);

    let start_block = cfg.scanner.start_block;
    let end_block = match cfg.scanner.end_block {
        Some(end) if end >= start_block => end,
        _ => {
            info!("End block not set or below start block, using latest block");
            let latest = client.get_latest_block_number().await?;
            info!(block = latest, "Using latest block as end block");
            latest
        }
    };
    let range = BlockRange::new(start_block, end_block)?;
    let workers = cfg.scanner.worker_count()?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listeners(cancel.clone());
    if let Some(deadline) = cfg.scanner.scan_timeout() {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("⏰ Scan deadline of {:?} reached, cancelling", deadline);
            cancel.cancel();
        });
    }

    let context = ScanContext::new(client, metrics, Arc::new(LogProgress::new()));
    let scanner = ExtraDataScanner::new(context);

    let started = Instant::now();
    let outcome = scanner.scan(range, workers, cancel).await;
    let elapsed = started.elapsed();

    let (status, result, failure) = match outcome {
        Ok(result) => (ScanStatus::Completed, result, None),
        Err(err) => {
            let message = err.to_string();
            let Some(partial) = err.into_partial() else {
                anyhow::bail!(message);
            };
            (ScanStatus::Cancelled, partial, Some(message))
        }
    };

    info!(total = result.total_requested, "Blocks scanned");
    let report = ScanReport::new(
        cfg.rpc.url.clone(),
        range,
        workers.get(),
        elapsed,
        status,
        result,
    );
    match args.output {
        OutputFormat::Table => print!("{}", render_table(&report.result)),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if let Some(message) = failure {
        error!("❌ Error scanning blocks: {}", message);
        anyhow::bail!(message);
    }

    Ok(())
}

/// Ctrl+C, and SIGTERM on Unix, cancel the scan
fn spawn_shutdown_listeners(cancel: CancellationToken) {
    let cancel_sigint = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("📡 Received shutdown signal (Ctrl+C)");
        cancel_sigint.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("📡 Received SIGTERM signal");
                cancel.cancel();
            }
        });
    }
}
