use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use eyre::Result;
use prometheus::{
    histogram_opts, labels, opts, register_counter_vec_with_registry,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, CounterVec, HistogramVec, IntCounterVec, IntGaugeVec,
    Registry,
};
use tcc_retry::RetryMetrics;

/// Macro to prefix a string with the namespace.
macro_rules! namespaced {
    ($name:expr) => {
        format!("{}_{}", super::NAMESPACE, $name)
    };
}

/// Process-wide metrics for the coordinator, injected into `TxManager`, `Monitor`, and
/// `RetryExecutor` rather than read from a global so callers can substitute a disposable
/// registry in tests.
pub struct CoreMetrics {
    registry: Registry,
    const_labels: HashMap<String, String>,
    agent_name: String,

    span_durations: CounterVec,
    span_counts: IntCounterVec,
    span_events: IntCounterVec,

    transaction_started: IntCounterVec,
    transaction_outcome: IntCounterVec,
    hanging_transaction_count: IntGaugeVec,
    retry_attempts: IntCounterVec,
    retry_exhausted: IntCounterVec,
    monitor_tick_duration: HistogramVec,
}

impl CoreMetrics {
    /// Track metrics for a particular agent name.
    ///
    /// - `for_agent` name of the agent these metrics are tracking.
    /// - `registry` prometheus registry to attach the metrics to.
    pub fn new(for_agent: &str, registry: Registry) -> prometheus::Result<Self> {
        let const_labels: HashMap<String, String> = labels! {
            namespaced!("baselib_version") => env!("CARGO_PKG_VERSION").into(),
            "agent".into() => for_agent.into(),
        };
        let const_labels_ref = const_labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<HashMap<_, _>>();

        let span_durations = register_counter_vec_with_registry!(
            opts!(
                namespaced!("span_duration_seconds"),
                "Duration from tracing span creation to span destruction",
                const_labels_ref
            ),
            &["span_name", "span_target"],
            registry
        )?;

        let span_counts = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("span_count"),
                "Number of times a span was exited",
                const_labels_ref
            ),
            &["span_name", "span_target"],
            registry
        )?;

        let span_events = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("span_events_total"),
                "Number of span events (logs and time metrics) emitted by level",
                const_labels_ref
            ),
            &["event_level"],
            registry
        )?;

        let transaction_started = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("transaction_started_total"),
                "Number of transactions started via StartTransaction",
                const_labels_ref
            ),
            &["instance"],
            registry
        )?;

        let transaction_outcome = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("transaction_outcome_total"),
                "Number of transactions reaching each discriminated StartTransaction outcome",
                const_labels_ref
            ),
            &["outcome"],
            registry
        )?;

        let hanging_transaction_count = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced!("hanging_transaction_count"),
                "Number of hanging transactions observed on the most recent monitor tick",
                const_labels_ref
            ),
            &["instance"],
            registry
        )?;

        let retry_attempts = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("retry_attempts_total"),
                "Number of retry attempts made by RetryExecutor",
                const_labels_ref
            ),
            &["operation"],
            registry
        )?;

        let retry_exhausted = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("retry_exhausted_total"),
                "Number of RetryExecutor loops that gave up after exhausting max_retries",
                const_labels_ref
            ),
            &["operation"],
            registry
        )?;

        let monitor_tick_duration = register_histogram_vec_with_registry!(
            histogram_opts!(
                namespaced!("monitor_tick_duration_seconds"),
                "Wall time spent in one monitor reconciliation tick",
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0],
                const_labels.clone()
            ),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            agent_name: for_agent.into(),
            registry,
            const_labels,

            span_durations,
            span_counts,
            span_events,

            transaction_started,
            transaction_outcome,
            hanging_transaction_count,
            retry_attempts,
            retry_exhausted,
            monitor_tick_duration,
        })
    }

    /// Create and register a new int gauge.
    pub fn new_int_gauge(
        &self,
        metric_name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<IntGaugeVec> {
        Ok(register_int_gauge_vec_with_registry!(
            opts!(namespaced!(metric_name), help, self.const_labels_str()),
            labels,
            self.registry
        )?)
    }

    /// Create and register a new int counter.
    pub fn new_int_counter(
        &self,
        metric_name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<IntCounterVec> {
        Ok(register_int_counter_vec_with_registry!(
            opts!(namespaced!(metric_name), help, self.const_labels_str()),
            labels,
            self.registry
        )?)
    }

    /// Incremented once per call to `TxManager::start_transaction`.
    pub fn transaction_started(&self) -> IntCounterVec {
        self.transaction_started.clone()
    }

    /// Incremented once per discriminated `StartTransactionOutcome`, labeled `outcome`
    /// (`ok`, `timeout`, `business_failure`).
    pub fn transaction_outcome(&self) -> IntCounterVec {
        self.transaction_outcome.clone()
    }

    /// Set on every monitor tick to the number of hanging transactions fetched.
    pub fn hanging_transaction_count(&self) -> IntGaugeVec {
        self.hanging_transaction_count.clone()
    }

    /// Point-in-time snapshot of `transaction_started_total` for `instance`, for `GetHealth`.
    pub fn transaction_started_value(&self, instance: &str) -> u64 {
        self.transaction_started.with_label_values(&[instance]).get()
    }

    /// Point-in-time snapshot of `hanging_transaction_count` for `instance`, for `GetHealth`.
    pub fn hanging_transaction_count_value(&self, instance: &str) -> i64 {
        self.hanging_transaction_count.with_label_values(&[instance]).get()
    }

    /// Histogram of monitor tick durations, labeled `outcome` (`ok`, `lock_unavailable`,
    /// `error`).
    pub fn monitor_tick_duration(&self) -> HistogramVec {
        self.monitor_tick_duration.clone()
    }

    /// Measure of span durations provided by tracing.
    pub fn span_duration_seconds(&self) -> CounterVec {
        self.span_durations.clone()
    }

    /// Counts of how many times a span was exited.
    pub fn span_count(&self) -> IntCounterVec {
        self.span_counts.clone()
    }

    /// Counts of tracing span events by level.
    pub fn span_events(&self) -> IntCounterVec {
        self.span_events.clone()
    }

    /// Gather available metrics into an encoded (plaintext, OpenMetrics format) report.
    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        use prometheus::Encoder;
        let collected_metrics = self.registry.gather();
        let mut out_buf = Vec::with_capacity(1024 * 64);
        let encoder = prometheus::TextEncoder::new();
        encoder.encode(&collected_metrics, &mut out_buf)?;
        Ok(out_buf)
    }

    /// The name of this agent, e.g. "coordinator".
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn const_labels_str(&self) -> HashMap<&str, &str> {
        self.const_labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl RetryMetrics for CoreMetrics {
    fn record_retry(&self, operation: &str) {
        self.retry_attempts.with_label_values(&[operation]).inc();
    }

    fn record_exhausted(&self, operation: &str) {
        self.retry_exhausted.with_label_values(&[operation]).inc();
    }
}

impl Debug for CoreMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoreMetrics {{ agent_name: {} }}", self.agent_name)
    }
}
