//! Exporter registry and initialization.
//!
//! Each configured exporter is wrapped as a [`ModuleHandle`] that provides
//! uniform lifecycle management via the [`DynPipeline`] trait, plus the
//! [`ExportHandle`] the router uses to reach its queue.
//!
//! A bad exporter section never aborts the daemon: the exporter is logged
//! and skipped, and the remaining exporters still run.

pub mod console;
pub mod pcap;
pub mod telegraf;

use dropwatch_core::config::DropwatchConfig;
use dropwatch_core::pipeline::{DynPipeline, HealthStatus};
use dropwatch_exporter::{ExportHandle, ExportSink, Exporter};

/// A handle to a registered exporter.
pub struct ModuleHandle {
    /// Exporter name for logging and health reporting.
    pub name: String,
    /// Whether this exporter takes part in routing.
    ///
    /// Cleared when the exporter fails to start.
    pub enabled: bool,
    /// The exporter's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
    /// Queue handle given to the router.
    pub export: ExportHandle,
}

impl ModuleHandle {
    /// Create a new module handle.
    pub fn new(
        name: impl Into<String>,
        enabled: bool,
        pipeline: Box<dyn DynPipeline>,
        export: ExportHandle,
    ) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
            export,
        }
    }

    /// Wrap an exporter, taking its name and queue handle.
    pub fn from_exporter<S: ExportSink>(exporter: Exporter<S>) -> Self {
        let name = exporter.name().to_owned();
        let export = exporter.handle();
        Self::new(name, true, Box::new(exporter), export)
    }

    /// Check the exporter's health status.
    ///
    /// Disabled exporters always report `Healthy` (they are not expected to run).
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Registry of all exporters.
///
/// Provides ordered start/stop and health check aggregation.
pub struct ModuleRegistry {
    modules: Vec<ModuleHandle>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register an exporter.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all enabled exporters in registration order.
    ///
    /// An exporter that fails to start is logged, disabled and skipped;
    /// the others are still started. Returns the number of running exporters.
    pub async fn start_all(&mut self) -> usize {
        let mut started = 0;
        for handle in &mut self.modules {
            if !handle.enabled {
                tracing::debug!(module = %handle.name, "skipping disabled exporter");
                continue;
            }

            tracing::info!(module = %handle.name, "starting exporter");
            match handle.pipeline.start().await {
                Ok(()) => {
                    started += 1;
                    tracing::info!(module = %handle.name, "exporter started successfully");
                }
                Err(e) => {
                    tracing::warn!(
                        module = %handle.name,
                        error = %e,
                        "failed to start exporter, skipping"
                    );
                    handle.enabled = false;
                }
            }
        }
        started
    }

    /// Stop all enabled exporters in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining exporters.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.modules.iter_mut().rev() {
            if !handle.enabled {
                continue;
            }

            tracing::info!(module = %handle.name, "stopping exporter");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(
                    module = %handle.name,
                    error = %e,
                    "failed to stop exporter"
                );
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "exporter stopped successfully");
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping exporters: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Get health status for all exporters.
    pub async fn health_statuses(&self) -> Vec<(String, bool, HealthStatus)> {
        let mut statuses = Vec::new();
        for handle in &self.modules {
            let status = handle.health_check().await;
            statuses.push((handle.name.clone(), handle.enabled, status));
        }
        statuses
    }

    /// Queue handles of the enabled exporters, in registration order.
    pub fn export_handles(&self) -> Vec<ExportHandle> {
        self.modules
            .iter()
            .filter(|m| m.enabled)
            .map(|m| m.export.clone())
            .collect()
    }

    /// Names of the registered exporters, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Number of registered exporters.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Number of enabled exporters.
    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build every exporter the configuration asks for.
///
/// Registration order is console, pcap, telegraf. `verbose` enables the
/// console exporter even without an `[exporters.console]` section.
pub fn init_exporters(config: &DropwatchConfig, verbose: bool) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();

    for handle in [
        console::init(config, verbose),
        pcap::init(config),
        telegraf::init(config),
    ]
    .into_iter()
    .flatten()
    {
        registry.register(handle);
    }

    tracing::info!(
        exporters = registry.count(),
        names = ?registry.names(),
        "exporters initialized"
    );
    registry
}
