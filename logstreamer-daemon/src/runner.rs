//! Drain loop wiring the streamer to the output sink.
//!
//! The runner owns the [`LogStreamer`] and its bus handle. Each iteration
//! drains one window, reports the batch and writes the points. Shutdown is
//! requested by cancelling [`Runner::shutdown_token`]; the loop notices it
//! between windows so a batch already collected is never discarded.
//!
//! # Shutdown Sequence
//!
//! 1. Token cancelled (signal handler or test)
//! 2. Current drain window completes and is written
//! 3. `LogStreamer::stop()` closes the bus and joins every task
//! 4. Whatever the tailers pushed before exiting is drained and written

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logstreamer_core::config::LogstreamerConfig;
use logstreamer_core::pipeline::{HealthStatus, Pipeline};
use logstreamer_log_stream::{
    LogStreamError, LogStreamer, LogStreamerBuilder, Metric, MetricBus, StreamerConfig,
    report_batch,
};

use crate::sink::JsonLinesSink;

/// Counters accumulated over one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Non-empty drain windows processed.
    pub batches: u64,
    /// Points written to the sink.
    pub points: u64,
    /// Fields that failed suffix coercion.
    pub coercion_failures: u64,
}

/// Owns the streamer and drives the drain/report/write loop.
pub struct Runner {
    streamer: LogStreamer,
    bus: Arc<MetricBus>,
    drain_window: Duration,
}

impl Runner {
    /// Build the streamer from a loaded configuration.
    ///
    /// Compiles every group mask, rule and date layout, so this is also
    /// what `--validate` runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the streamer settings are out of range or any
    /// group pattern is invalid.
    pub fn from_config(config: &LogstreamerConfig) -> Result<Self> {
        let streamer_config =
            StreamerConfig::from_core(config).context("invalid streamer configuration")?;
        let drain_window = streamer_config.drain_window();

        let (streamer, bus) = LogStreamerBuilder::new()
            .config(streamer_config)
            .build()
            .context("failed to build log streamer")?;

        Ok(Self {
            streamer,
            bus,
            drain_window,
        })
    }

    /// Token that stops the drain loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.streamer.shutdown_token()
    }

    /// Number of compiled groups.
    pub fn group_count(&self) -> usize {
        self.streamer.groups().len()
    }

    /// Start the streamer and run until the shutdown token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the streamer fails to start (unreadable
    /// directory, file that cannot be opened, watch setup failure) or the
    /// sink cannot be written. The streamer is stopped in both cases once
    /// it has started.
    pub async fn run<W: Write>(&mut self, sink: &mut JsonLinesSink<W>) -> Result<RunSummary> {
        self.streamer
            .start()
            .await
            .context("failed to start log streamer")?;

        let token = self.streamer.shutdown_token();
        let mut summary = RunSummary::default();

        let loop_result = self.drain_loop(&token, sink, &mut summary).await;
        if loop_result.is_err() {
            token.cancel();
        }

        self.streamer
            .stop()
            .await
            .context("failed to stop log streamer")?;

        let remaining = self.bus.try_drain();
        if !remaining.is_empty() {
            debug!(count = remaining.len(), "final drain after stop");
        }
        loop_result?;
        write_batch(&remaining, sink, &mut summary)?;

        info!(
            batches = summary.batches,
            points = summary.points,
            coercion_failures = summary.coercion_failures,
            "drain loop finished"
        );
        Ok(summary)
    }

    async fn drain_loop<W: Write>(
        &self,
        token: &CancellationToken,
        sink: &mut JsonLinesSink<W>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut degraded = false;

        loop {
            let batch = self.bus.drain(self.drain_window).await;
            write_batch(&batch, sink, summary)?;

            match self.streamer.health_check().await {
                HealthStatus::Healthy => degraded = false,
                HealthStatus::Degraded(reason) if !degraded => {
                    warn!(reason = %reason, "log streamer degraded");
                    degraded = true;
                }
                HealthStatus::Degraded(_) => {}
                HealthStatus::Unhealthy(reason) => {
                    error!(reason = %reason, "log streamer unhealthy");
                }
            }

            if token.is_cancelled() {
                info!("shutdown requested, leaving drain loop");
                return Ok(());
            }
        }
    }
}

fn write_batch<W: Write>(
    batch: &[Metric],
    sink: &mut JsonLinesSink<W>,
    summary: &mut RunSummary,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let report = report_batch(batch);
    let (points, result) = report.into_result();
    if let Err(e) = result {
        // Only the failing fields are missing; the points are still written.
        warn!(error = %e, "field coercion failed in batch");
        summary.coercion_failures += coercion_count(&e);
    }

    let written = sink
        .write_points(&points)
        .context("failed to write points to sink")?;
    summary.batches += 1;
    summary.points += written as u64;
    debug!(metrics = batch.len(), points = written, "batch written");
    Ok(())
}

fn coercion_count(err: &LogStreamError) -> u64 {
    match err {
        LogStreamError::Coercion(failures) => failures.len() as u64,
        _ => 1,
    }
}

/// Wait for SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
