//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use meridian_contracts::errors::ErrorKind;
use meridian_contracts::events::VaultEvent;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc` inside) so it can be shared
/// across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Successful deposits and mints.
    pub deposits_total: IntCounter,
    /// Withdrawal requests accepted.
    pub withdrawal_requests_total: IntCounter,
    /// Withdrawal requests paid out.
    pub withdrawal_claims_total: IntCounter,
    /// Governance proposals that reached quorum and executed.
    pub governance_executions_total: IntCounter,
    /// Commands rejected, labelled by error kind.
    pub commands_rejected_total: IntCounterVec,
    /// Unclaimed withdrawal requests.
    pub pending_withdrawals: IntGauge,
    /// Committed state version.
    pub state_version: IntGauge,
    /// Histogram of command execution latency in seconds.
    pub command_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("meridian".into()), None)
            .expect("failed to create prometheus registry");

        let deposits_total = IntCounter::new("deposits_total", "Total number of deposits and mints")
            .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawal_requests_total = IntCounter::new(
            "withdrawal_requests_total",
            "Total number of withdrawal requests accepted",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawal_requests_total.clone()))
            .expect("metric registration");

        let withdrawal_claims_total = IntCounter::new(
            "withdrawal_claims_total",
            "Total number of withdrawal requests paid out",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawal_claims_total.clone()))
            .expect("metric registration");

        let governance_executions_total = IntCounter::new(
            "governance_executions_total",
            "Total number of governance proposals executed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(governance_executions_total.clone()))
            .expect("metric registration");

        let commands_rejected_total = IntCounterVec::new(
            Opts::new("commands_rejected_total", "Commands rejected, by error kind"),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(commands_rejected_total.clone()))
            .expect("metric registration");

        let pending_withdrawals = IntGauge::new(
            "pending_withdrawals",
            "Number of withdrawal requests not yet claimed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(pending_withdrawals.clone()))
            .expect("metric registration");

        let state_version = IntGauge::new("state_version", "Number of committed commands")
            .expect("metric creation");
        registry
            .register(Box::new(state_version.clone()))
            .expect("metric registration");

        let command_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "command_latency_seconds",
                "Vault command execution latency in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(command_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            deposits_total,
            withdrawal_requests_total,
            withdrawal_claims_total,
            governance_executions_total,
            commands_rejected_total,
            pending_withdrawals,
            state_version,
            command_latency_seconds,
        }
    }

    /// Counts one committed event.
    pub fn observe_event(&self, event: &VaultEvent) {
        match event {
            VaultEvent::Deposited { .. } => self.deposits_total.inc(),
            VaultEvent::WithdrawalRequested { .. } => self.withdrawal_requests_total.inc(),
            VaultEvent::WithdrawalClaimed { .. } => self.withdrawal_claims_total.inc(),
            VaultEvent::WhitelistUpdated { .. }
            | VaultEvent::SignerSetUpdated { .. }
            | VaultEvent::AssetsCapUpdated { .. } => self.governance_executions_total.inc(),
            _ => {}
        }
    }

    /// Counts one rejected command.
    pub fn observe_rejection(&self, kind: ErrorKind) {
        self.commands_rejected_total
            .with_label_values(&[&kind.to_string()])
            .inc();
    }

    /// Refreshes the gauges after a commit.
    pub fn observe_state(&self, pending: usize, version: u64) {
        self.pending_withdrawals.set(pending as i64);
        self.state_version.set(version as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_protocol::types::Address;

    #[test]
    fn events_and_rejections_are_counted() {
        let metrics = NodeMetrics::new();
        metrics.observe_event(&VaultEvent::Deposited {
            caller: Address::from_low_u8(1),
            receiver: Address::from_low_u8(1),
            assets: 10,
            shares: 10,
        });
        metrics.observe_event(&VaultEvent::AssetsCapUpdated {
            previous: 0,
            current: 5,
        });
        metrics.observe_rejection(ErrorKind::Validation);

        assert_eq!(metrics.deposits_total.get(), 1);
        assert_eq!(metrics.governance_executions_total.get(), 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("meridian_deposits_total 1"));
        assert!(text.contains("meridian_commands_rejected_total{kind=\"validation\"} 1"));
    }
}
