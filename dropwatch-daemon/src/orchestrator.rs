//! Daemon orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] owns the drop monitor client, the exporters and the
//! alert-processing task, and sequences their startup and shutdown.
//!
//! # Startup Order
//!
//! 1. Resolve the NET_DM family (fatal on failure)
//! 2. Configure alert mode / truncation length (failure is logged only)
//! 3. Enable software/hardware drop monitoring (fatal on failure)
//! 4. Start exporters (a failing exporter is skipped)
//! 5. Spawn the alert processor
//! 6. Join the alert multicast group and start receiving
//!
//! # Shutdown Order (producers first)
//!
//! 1. Stop the receive loop (leaves the group, closes the alert channel)
//! 2. Wait for the processor to route the remaining alerts
//! 3. Stop exporters (drain or discard their queues)
//! 4. Disable kernel drop monitoring (if `disable_on_exit`)
//! 5. Close the netlink socket

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dropwatch_core::config::DropwatchConfig;
use dropwatch_dropmon::{AlertMode, DropMonitor, MonitorState, MonitorStats, NetlinkTransport};
use dropwatch_exporter::ExportRouter;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status, monitor_status};
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};
use crate::processor::{AlertProcessor, ProcessorStats};

/// Name used for the drop monitor in health reports.
pub const MONITOR_MODULE: &str = "drop-monitor";

/// The main daemon orchestrator.
pub struct Orchestrator<T: NetlinkTransport> {
    /// Validated configuration.
    config: DropwatchConfig,
    /// NET_DM client.
    monitor: DropMonitor<T>,
    /// Registered exporters (ordered for start/stop).
    exporters: ModuleRegistry,
    /// Fan-out to the running exporters.
    router: ExportRouter,
    /// Alert processing task.
    processor: Option<JoinHandle<()>>,
    processor_stats: Arc<ProcessorStats>,
    /// Stops background tasks and `run`.
    cancel: CancellationToken,
    uptime_task: Option<JoinHandle<()>>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    started: bool,
}

impl<T: NetlinkTransport> Orchestrator<T> {
    /// Validate the configuration, install the metrics recorder and
    /// build every configured exporter.
    ///
    /// `verbose` adds the console exporter.
    pub fn build(config: DropwatchConfig, transport: T, verbose: bool) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let exporters = modules::init_exporters(&config, verbose);
        Self::build_with_exporters(config, transport, exporters)
    }

    /// Build from an explicit exporter registry.
    ///
    /// Used when exporters are assembled outside of the configuration file.
    pub fn build_with_exporters(
        config: DropwatchConfig,
        transport: T,
        exporters: ModuleRegistry,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if exporters.count() == 0 {
            tracing::warn!("no exporters configured; drop alerts will be decoded and discarded");
        }

        Ok(Self {
            config,
            monitor: DropMonitor::new(transport),
            exporters,
            router: ExportRouter::new(),
            processor: None,
            processor_stats: Arc::new(ProcessorStats::default()),
            cancel: CancellationToken::new(),
            uptime_task: None,
            start_time: Instant::now(),
            started: false,
        })
    }

    /// Bring up the monitor, the exporters and the processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the NET_DM family cannot be resolved, monitoring
    /// cannot be enabled, or the alert group cannot be joined. In the last
    /// case everything already started is shut down again.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(anyhow::anyhow!("orchestrator already started"));
        }
        self.started = true;

        let monitor_config = self.config.monitor.clone();

        self.monitor
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("failed to initialize drop monitor: {}", e))?;

        let mode = AlertMode::from_name(&monitor_config.alert_mode).ok_or_else(|| {
            anyhow::anyhow!("unknown alert mode '{}'", monitor_config.alert_mode)
        })?;
        let trunc_len = (monitor_config.trunc_len > 0).then_some(monitor_config.trunc_len);
        if let Err(e) = self.monitor.configure(mode, trunc_len).await {
            tracing::warn!(error = %e, "failed to configure drop monitor, keeping kernel settings");
        }

        self.monitor
            .enable_monitoring(monitor_config.sw_drops, monitor_config.hw_drops)
            .await
            .map_err(|e| anyhow::anyhow!("failed to enable drop monitoring: {}", e))?;

        let running = self.exporters.start_all().await;
        for handle in self.exporters.export_handles() {
            self.router.add(handle);
        }
        if running == 0 {
            tracing::warn!("no exporters running; drop alerts will be decoded and discarded");
        }
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(dropwatch_core::metrics::DAEMON_EXPORTERS_RUNNING).set(running as f64);

        let (alert_tx, alert_rx) = mpsc::channel(monitor_config.channel_capacity);
        let processor = AlertProcessor::new(alert_rx, self.router.clone());
        self.processor_stats = processor.stats();
        self.processor = Some(tokio::spawn(processor.run()));

        if let Err(e) = self.monitor.start(alert_tx) {
            tracing::error!(error = %e, "failed to start receiving drop alerts");
            if let Err(shutdown_err) = self.shutdown().await {
                tracing::error!(error = %shutdown_err, "cleanup after failed start also failed");
            }
            return Err(anyhow::anyhow!("failed to start drop monitor: {}", e));
        }

        if self.config.metrics.enabled {
            self.uptime_task = Some(spawn_uptime_updater(
                self.start_time,
                self.cancel.child_token(),
            ));
        }

        tracing::info!(
            exporters = running,
            alert_mode = %mode,
            sw_drops = monitor_config.sw_drops,
            hw_drops = monitor_config.hw_drops,
            "dropwatch running"
        );
        Ok(())
    }

    /// Start, wait for SIGTERM/SIGINT or [`Self::shutdown_token`], then shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let cancel = self.cancel.clone();
        tokio::select! {
            signal = wait_for_shutdown_signal() => {
                let signal = signal?;
                tracing::info!(signal = signal, "shutdown signal received");
            }
            _ = cancel.cancelled() => {
                tracing::info!("shutdown requested");
            }
        }

        self.shutdown().await
    }

    /// Stop everything in producer-first order.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();

        if let Err(e) = self.monitor.stop().await {
            tracing::warn!(error = %e, "drop monitor did not stop cleanly");
        }

        if let Some(task) = self.processor.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "alert processor task failed");
            }
        }

        let exporters_result = self.exporters.stop_all().await;

        if self.config.monitor.disable_on_exit && self.monitor.state() == MonitorState::Ready {
            let monitor_config = &self.config.monitor;
            if let Err(e) = self
                .monitor
                .disable_monitoring(monitor_config.sw_drops, monitor_config.hw_drops)
                .await
            {
                tracing::warn!(error = %e, "failed to disable drop monitoring");
            }
        }

        self.monitor.close().await;

        if let Some(task) = self.uptime_task.take() {
            let _ = task.await;
        }

        tracing::info!(
            processed = self.processor_stats.processed(),
            "dropwatch shut down"
        );
        exporters_result
    }

    /// Token that makes [`Self::run`] return as if a signal had arrived.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let mut modules = vec![ModuleHealth {
            name: MONITOR_MODULE.to_owned(),
            enabled: true,
            status: monitor_status(self.monitor.state()),
        }];
        modules.extend(
            self.exporters
                .health_statuses()
                .await
                .into_iter()
                .map(|(name, enabled, status)| ModuleHealth {
                    name,
                    enabled,
                    status,
                }),
        );

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DropwatchConfig {
        &self.config
    }

    /// Current drop monitor client state.
    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Receive-loop counters.
    pub fn monitor_stats(&self) -> Arc<MonitorStats> {
        self.monitor.stats()
    }

    /// Processing counters.
    pub fn processor_stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.processor_stats)
    }

    /// The router feeding the running exporters.
    pub fn router(&self) -> &ExportRouter {
        &self.router
    }

    /// Number of exporters currently taking part in routing.
    pub fn running_exporters(&self) -> usize {
        self.router.len()
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
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

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    use dropwatch_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
