//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Snapshot counters
    pub snapshots_published: IntCounter,
    pub snapshots_superseded: IntCounter,
    pub snapshots_degraded: IntCounter,

    // Pricing counters
    pub price_quotes_live: IntCounter,
    pub price_quotes_fallback: IntCounter,

    // Swap counters
    pub swaps_total: IntCounter,
    pub swaps_confirmed: IntCounter,
    pub swaps_failed: IntCounter,

    // Histograms
    pub snapshot_latency: Histogram,
    pub quote_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let snapshots_published = IntCounter::with_opts(Opts::new(
            "snapshots_published",
            "Portfolio snapshots published to subscribers",
        ))?;

        let snapshots_superseded = IntCounter::with_opts(Opts::new(
            "snapshots_superseded",
            "Snapshot passes cancelled by a wallet change",
        ))?;

        let snapshots_degraded = IntCounter::with_opts(Opts::new(
            "snapshots_degraded",
            "Snapshot passes that fell back to zero balances",
        ))?;

        let price_quotes_live = IntCounter::with_opts(Opts::new(
            "price_quotes_live",
            "Token prices quoted live against the aggregator",
        ))?;

        let price_quotes_fallback = IntCounter::with_opts(Opts::new(
            "price_quotes_fallback",
            "Token prices served from the static reference table",
        ))?;

        let swaps_total =
            IntCounter::with_opts(Opts::new("swaps_total", "Swap attempts started"))?;

        let swaps_confirmed =
            IntCounter::with_opts(Opts::new("swaps_confirmed", "Swaps confirmed on-chain"))?;

        let swaps_failed =
            IntCounter::with_opts(Opts::new("swaps_failed", "Swap attempts that failed"))?;

        let snapshot_latency = Histogram::with_opts(
            HistogramOpts::new("snapshot_latency_seconds", "Full snapshot pass latency")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
        )?;

        let quote_latency = Histogram::with_opts(
            HistogramOpts::new("quote_latency_seconds", "Aggregator quote call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(snapshots_published.clone()))?;
        registry.register(Box::new(snapshots_superseded.clone()))?;
        registry.register(Box::new(snapshots_degraded.clone()))?;
        registry.register(Box::new(price_quotes_live.clone()))?;
        registry.register(Box::new(price_quotes_fallback.clone()))?;
        registry.register(Box::new(swaps_total.clone()))?;
        registry.register(Box::new(swaps_confirmed.clone()))?;
        registry.register(Box::new(swaps_failed.clone()))?;
        registry.register(Box::new(snapshot_latency.clone()))?;
        registry.register(Box::new(quote_latency.clone()))?;

        Ok(Self {
            registry,
            snapshots_published,
            snapshots_superseded,
            snapshots_degraded,
            price_quotes_live,
            price_quotes_fallback,
            swaps_total,
            swaps_confirmed,
            swaps_failed,
            snapshot_latency,
            quote_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics accessor
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}
