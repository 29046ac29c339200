use std::io::BufWriter;

use anyhow::Result;
use clap::Parser;

use logstreamer_core::config::LogstreamerConfig;
use logstreamer_daemon::cli::DaemonCli;
use logstreamer_daemon::logging::init_tracing;
use logstreamer_daemon::runner::{Runner, wait_for_shutdown_signal};
use logstreamer_daemon::sink::JsonLinesSink;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 (파일 -> 환경변수 -> CLI 순으로 덮어씀)
    let mut config = LogstreamerConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config.general);
    config.validate()?;

    if cli.validate {
        let runner = Runner::from_config(&config)?;
        println!(
            "configuration is valid: {} ({} groups)",
            cli.config.display(),
            runner.group_count()
        );
        return Ok(());
    }

    init_tracing(&config.general)?;
    logstreamer_core::metrics::describe_all();

    tracing::info!(
        config = %cli.config.display(),
        dirs = ?config.streamer.dirs,
        groups = config.group.len(),
        "logstreamer-daemon starting"
    );

    let mut runner = Runner::from_config(&config)?;

    let token = runner.shutdown_token();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
        }
        token.cancel();
    });

    let mut sink = JsonLinesSink::new(BufWriter::new(std::io::stdout()));
    let summary = runner.run(&mut sink).await?;

    tracing::info!(points = summary.points, "logstreamer-daemon shut down");
    Ok(())
}
