//! Metrics collection for observability
//!
//! Prometheus metrics for the transfer and purchase engines, kept in a
//! registry owned by the ledger so several ledgers can live in one process.
//!
//! # Metrics
//!
//! - `ledger_transfers_total{outcome}` - Transfers by outcome
//! - `ledger_transferred_coins_total` - Coins moved by committed transfers
//! - `ledger_purchases_total{outcome}` - Purchases by outcome
//! - `ledger_unit_duration_seconds{operation}` - Unit of work latency

use crate::error::Error;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Transfers by outcome
    pub transfers_total: IntCounterVec,

    /// Coins moved by committed transfers
    pub transferred_coins: IntCounter,

    /// Purchases by outcome
    pub purchases_total: IntCounterVec,

    /// Unit of work duration histogram
    pub unit_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl LedgerMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounterVec::new(
            Opts::new("ledger_transfers_total", "Transfers by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(transfers_total.clone()))?;

        let transferred_coins = IntCounter::new(
            "ledger_transferred_coins_total",
            "Coins moved by committed transfers",
        )?;
        registry.register(Box::new(transferred_coins.clone()))?;

        let purchases_total = IntCounterVec::new(
            Opts::new("ledger_purchases_total", "Purchases by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(purchases_total.clone()))?;

        let unit_duration = HistogramVec::new(
            HistogramOpts::new(
                "ledger_unit_duration_seconds",
                "Histogram of unit of work latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(unit_duration.clone()))?;

        Ok(Self {
            transfers_total,
            transferred_coins,
            purchases_total,
            unit_duration,
            registry,
        })
    }

    /// Record a committed transfer
    pub fn record_transfer(&self, amount: i64) {
        self.transfers_total.with_label_values(&["committed"]).inc();
        self.transferred_coins.inc_by(amount.max(0) as u64);
    }

    /// Record a rejected or failed transfer
    pub fn record_transfer_error(&self, err: &Error) {
        self.transfers_total
            .with_label_values(&[outcome(err)])
            .inc();
    }

    /// Record a committed purchase
    pub fn record_purchase(&self) {
        self.purchases_total.with_label_values(&["committed"]).inc();
    }

    /// Record a rejected or failed purchase
    pub fn record_purchase_error(&self, err: &Error) {
        self.purchases_total
            .with_label_values(&[outcome(err)])
            .inc();
    }

    /// Record how long one unit of work took
    pub fn record_unit_duration(&self, operation: &str, duration_seconds: f64) {
        self.unit_duration
            .with_label_values(&[operation])
            .observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn outcome(err: &Error) -> &'static str {
    match err {
        Error::InsufficientFunds { .. } => "insufficient_funds",
        Error::NotFound(_) => "not_found",
        Error::InvalidAmount(_) => "invalid_amount",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = LedgerMetrics::new().unwrap();
        assert_eq!(metrics.transferred_coins.get(), 0);

        // Independent registries do not collide
        assert!(LedgerMetrics::new().is_ok());
    }

    #[test]
    fn test_record_transfer() {
        let metrics = LedgerMetrics::new().unwrap();
        metrics.record_transfer(500);
        metrics.record_transfer(25);
        metrics.record_transfer_error(&Error::InsufficientFunds {
            required: 2000,
            available: 475,
        });

        assert_eq!(metrics.transferred_coins.get(), 525);
        assert_eq!(
            metrics
                .transfers_total
                .with_label_values(&["committed"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .transfers_total
                .with_label_values(&["insufficient_funds"])
                .get(),
            1
        );
    }

    #[test]
    fn test_render_contains_metric_names() {
        let metrics = LedgerMetrics::new().unwrap();
        metrics.record_purchase();
        metrics.record_unit_duration("buy_item", 0.002);

        let text = metrics.render().unwrap();
        assert!(text.contains("ledger_purchases_total"));
        assert!(text.contains("ledger_unit_duration_seconds"));
    }
}
