//! Export sinks used to observe what the daemon delivers.

use std::sync::Arc;

use tokio::sync::mpsc;

use dropwatch_core::event::WriteMsg;
use dropwatch_daemon::modules::{ModuleHandle, ModuleRegistry};
use dropwatch_exporter::{ExportSink, Exporter, ExporterError};

use super::config::capture_settings;

/// Forwards every exported message to a channel.
pub struct CaptureSink {
    name: &'static str,
    tx: mpsc::UnboundedSender<Arc<WriteMsg>>,
}

impl CaptureSink {
    pub fn new(name: &'static str) -> (Self, mpsc::UnboundedReceiver<Arc<WriteMsg>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx }, rx)
    }
}

impl ExportSink for CaptureSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }

    async fn write_batch(&mut self, batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        let count = batch.len();
        for msg in batch {
            let _ = self.tx.send(msg);
        }
        Ok(count)
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }
}

/// Blocks forever on its first batch.
pub struct StuckSink;

impl ExportSink for StuckSink {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }

    async fn write_batch(&mut self, _batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        std::future::pending::<()>().await;
        Ok(0)
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }
}

/// Refuses to open.
pub struct BrokenSink;

impl ExportSink for BrokenSink {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        Err(ExporterError::Io {
            exporter: "broken",
            reason: "device unavailable".to_owned(),
        })
    }

    async fn write_batch(&mut self, _batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        Ok(0)
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }
}

/// Registry holding a single capture exporter.
pub fn capture_registry() -> (ModuleRegistry, mpsc::UnboundedReceiver<Arc<WriteMsg>>) {
    let (sink, rx) = CaptureSink::new("capture");
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::from_exporter(Exporter::new(
        sink,
        capture_settings(),
    )));
    (registry, rx)
}

/// Wrap a sink as a registry entry with capture settings.
pub fn handle_for<S: ExportSink>(sink: S) -> ModuleHandle {
    ModuleHandle::from_exporter(Exporter::new(sink, capture_settings()))
}
