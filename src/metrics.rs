//! Coordinator counters, exported in the Prometheus text format.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the request-serving paths.
pub struct CoordinatorMetrics {
    registry: Registry,
    requests: IntCounterVec,
    lookups: IntCounterVec,
    navigation_fallbacks: IntCounterVec,
    network_errors: IntCounter,
    revalidations: IntCounterVec,
}

impl CoordinatorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("shell_cache".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Intercepted requests by route"),
            &["route"],
        )?;
        let lookups = IntCounterVec::new(
            Opts::new("lookups_total", "Static-asset cache lookups by outcome"),
            &["outcome"],
        )?;
        let navigation_fallbacks = IntCounterVec::new(
            Opts::new(
                "navigation_fallbacks_total",
                "Navigations answered without the network, by outcome",
            ),
            &["outcome"],
        )?;
        let network_errors = IntCounter::new(
            "network_errors_total",
            "Requests answered with a synthesized network error",
        )?;
        let revalidations = IntCounterVec::new(
            Opts::new("revalidations_total", "Background revalidations by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(lookups.clone()))?;
        registry.register(Box::new(navigation_fallbacks.clone()))?;
        registry.register(Box::new(network_errors.clone()))?;
        registry.register(Box::new(revalidations.clone()))?;

        Ok(Self {
            registry,
            requests,
            lookups,
            navigation_fallbacks,
            network_errors,
            revalidations,
        })
    }

    pub fn record_route(&self, route: &str) {
        self.requests.with_label_values(&[route]).inc();
    }

    pub fn record_lookup(&self, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        self.lookups.with_label_values(&[outcome]).inc();
    }

    pub fn record_navigation_fallback(&self, from_cache: bool) {
        let outcome = if from_cache { "cached" } else { "error" };
        self.navigation_fallbacks.with_label_values(&[outcome]).inc();
    }

    pub fn record_network_error(&self) {
        self.network_errors.inc();
    }

    pub fn record_revalidation(&self, outcome: &str) {
        self.revalidations.with_label_values(&[outcome]).inc();
    }

    pub fn route_count(&self, route: &str) -> u64 {
        self.requests.with_label_values(&[route]).get()
    }

    pub fn lookup_count(&self, hit: bool) -> u64 {
        let outcome = if hit { "hit" } else { "miss" };
        self.lookups.with_label_values(&[outcome]).get()
    }

    pub fn network_error_count(&self) -> u64 {
        self.network_errors.get()
    }

    pub fn revalidation_count(&self, outcome: &str) -> u64 {
        self.revalidations.with_label_values(&[outcome]).get()
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
