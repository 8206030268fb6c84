use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Events appended per aggregate type
// - Optimistic concurrency conflicts
// - Result lifecycle transitions
// - Retry attempts and outcomes of end-result updates
// - End-result projections left behind after an append
// - Apportionment runs (outcome, duration)
//
// The registry is handed to whatever exposes it; the engine only records.
// ============================================================================

/// Central metrics registry for the tallying engine
pub struct Metrics {
    registry: Registry,

    pub events_appended: IntCounterVec,
    pub concurrency_conflicts: IntCounterVec,
    pub state_transitions: IntCounterVec,
    pub projection_failures: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // Apportionment Metrics
    pub apportionment_runs: IntCounterVec,
    pub apportionment_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounterVec::new(
            Opts::new("tally_events_appended_total", "Total events appended to the event log"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new("tally_concurrency_conflicts_total", "Optimistic concurrency conflicts"),
            &["operation"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let state_transitions = IntCounterVec::new(
            Opts::new("tally_result_transitions_total", "Applied result lifecycle actions"),
            &["action"],
        )?;
        registry.register(Box::new(state_transitions.clone()))?;

        let projection_failures = IntCounterVec::new(
            Opts::new(
                "tally_projection_failures_total",
                "End-result updates that failed after the result events were appended",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(projection_failures.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("tally_retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_success = IntCounterVec::new(
            Opts::new("tally_retry_success_total", "Total successful retries"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_success.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("tally_retry_failure_total", "Total failed retries after all attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        // Apportionment Metrics
        let apportionment_runs = IntCounterVec::new(
            Opts::new("tally_apportionment_runs_total", "Apportionment runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(apportionment_runs.clone()))?;

        let apportionment_duration = HistogramVec::new(
            HistogramOpts::new("tally_apportionment_duration_seconds", "Apportionment computation duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(apportionment_duration.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            concurrency_conflicts,
            state_transitions,
            projection_failures,
            retry_attempts_total,
            retry_success,
            retry_failure,
            apportionment_runs,
            apportionment_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_events_appended(&self, aggregate_type: &str, count: usize) {
        self.events_appended
            .with_label_values(&[aggregate_type])
            .inc_by(count as u64);
    }

    pub fn record_conflict(&self, operation: &str) {
        self.concurrency_conflicts.with_label_values(&[operation]).inc();
    }

    pub fn record_transition(&self, action: &str) {
        self.state_transitions.with_label_values(&[action]).inc();
    }

    /// The end result is stale until it is rebuilt
    pub fn record_projection_failure(&self, operation: &str) {
        self.projection_failures.with_label_values(&[operation]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    /// Helper to record retry outcome
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        if success {
            self.retry_success.with_label_values(&[operation]).inc();
        } else {
            self.retry_failure.with_label_values(&[operation]).inc();
        }
    }

    /// `outcome` is `complete`, `pending_lot_decisions`, `non_convergence` or `failed`
    pub fn record_apportionment(&self, outcome: &str, duration_secs: f64) {
        self.apportionment_runs.with_label_values(&[outcome]).inc();
        self.apportionment_duration
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }
}
