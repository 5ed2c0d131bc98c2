//! Alert processing loop.
//!
//! Receives decoded [`AlertEvent`]s from the drop monitor, dissects the
//! dropped packet, wraps both into a [`WriteMsg`] and hands it to the
//! [`ExportRouter`].
//!
//! ```text
//! DropMonitor --AlertEvent--> AlertProcessor --Arc<WriteMsg>--> ExportRouter
//!                              (dissect)                        ├─> console
//!                                                               ├─> pcap
//!                                                               └─> telegraf
//! ```
//!
//! Routing never blocks, so a slow exporter cannot stall this loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use dropwatch_core::event::{AlertEvent, WriteMsg};
use dropwatch_core::metrics as m;
use dropwatch_dissector::PacketDissector;
use dropwatch_exporter::ExportRouter;

/// Processing counters, shared with the orchestrator.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    processed: AtomicU64,
    malformed: AtomicU64,
    without_payload: AtomicU64,
    undelivered: AtomicU64,
}

impl ProcessorStats {
    /// Alerts taken from the monitor channel.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Payloads whose dissection stopped at a malformed header.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Alerts that carried no packet payload.
    pub fn without_payload(&self) -> u64 {
        self.without_payload.load(Ordering::Relaxed)
    }

    /// Per-exporter deliveries lost to full or closed queues.
    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

/// The alert-processing loop.
pub struct AlertProcessor {
    rx: mpsc::Receiver<AlertEvent>,
    router: ExportRouter,
    dissector: PacketDissector,
    stats: Arc<ProcessorStats>,
}

impl AlertProcessor {
    /// Create a processor reading from `rx` and delivering to `router`.
    pub fn new(rx: mpsc::Receiver<AlertEvent>, router: ExportRouter) -> Self {
        Self {
            rx,
            router,
            dissector: PacketDissector::new(),
            stats: Arc::new(ProcessorStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    /// Dissect the alert's payload and build the message for the exporters.
    ///
    /// An alert without payload gets no packet summary. A malformed payload
    /// still yields the layers decoded before the error.
    pub fn process(&self, alert: AlertEvent) -> Arc<WriteMsg> {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        if alert.packet.payload.is_empty() {
            self.stats.without_payload.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(drop_point = alert.drop_point(), "alert without payload");
            return Arc::new(WriteMsg::new(alert, None));
        }

        let dissection = self.dissector.dissect(&alert.packet.payload);
        let packet_type = dissection.summary.packet_type();
        metrics::counter!(m::DISSECTOR_PACKETS_TOTAL, m::LABEL_PACKET_TYPE => packet_type.as_str())
            .increment(1);

        if let Some(err) = &dissection.error {
            self.stats.malformed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::DISSECTOR_MALFORMED_TOTAL).increment(1);
            tracing::debug!(
                drop_point = alert.drop_point(),
                layer = %err.layer(),
                error = %err,
                "malformed packet header"
            );
        }

        Arc::new(WriteMsg::new(alert, Some(dissection.summary)))
    }

    /// Run until the monitor channel closes.
    ///
    /// The channel closes when the drop monitor stops, so every alert
    /// received before that is still routed.
    pub async fn run(mut self) {
        tracing::debug!(exporters = self.router.len(), "alert processor started");

        while let Some(alert) = self.rx.recv().await {
            let msg = self.process(alert);
            let report = self.router.route(msg);
            let lost = report.dropped + report.closed;
            if lost > 0 {
                self.stats
                    .undelivered
                    .fetch_add(lost as u64, Ordering::Relaxed);
            }
        }

        tracing::info!(
            processed = self.stats.processed(),
            malformed = self.stats.malformed(),
            undelivered = self.stats.undelivered(),
            "alert processor stopped"
        );
    }
}
