//! The collection cycle.
//!
//! One cycle selects the report sources matching the configured glob, scans
//! each of them, optionally folds the results into a single aggregate and
//! publishes every value as a gauge through the [`metrics`] facade. Each cycle
//! records into a recorder of its own and is rendered before the next one may
//! start, so the exposition only ever holds what the current cycle found.
//!
//! A bad source never fails the cycle, it is logged, counted and left out. An
//! invalid pattern does: nothing is published and `litespeed_up` drops to 0.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use litespeed_report::{Options, Report, Scanner, merge, registry};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, error, warn};

use crate::config::Config;

/// Gauge carrying the server version as a label.
pub const VERSION_METRIC: &str = "litespeed_version";
/// Gauge set to 1 when the last cycle completed.
pub const UP_METRIC: &str = "litespeed_up";
/// Counter of cycles run.
pub const SCRAPES_METRIC: &str = "litespeed_exporter_scrapes_total";
/// Counter of cycle aborts, dropped sources and dropped fields.
pub const SCRAPE_FAILURES_METRIC: &str = "litespeed_exporter_scrape_failures_total";

#[derive(thiserror::Error, Debug)]
/// Errors that abort a whole collection cycle
pub enum Error {
    /// The source pattern is not a valid glob.
    #[error("Invalid scrape pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug)]
/// Runs collection cycles against one source pattern.
pub struct Collector {
    scanner: Scanner,
    pattern: String,
    metrics_by_core: bool,
    scrapes: AtomicU64,
    failures: AtomicU64,
    cycle: Mutex<()>,
}

impl Collector {
    /// Create a new [`Collector`] reading the sources matching `pattern`.
    #[must_use]
    pub fn new(pattern: impl Into<String>, metrics_by_core: bool, options: Options) -> Self {
        Self {
            scanner: Scanner::new(options),
            pattern: pattern.into(),
            metrics_by_core,
            scrapes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cycle: Mutex::new(()),
        }
    }

    /// Create a new [`Collector`] as `config` describes it.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.scrape_pattern.clone(),
            config.metrics_by_core,
            config.scan_options(),
        )
    }

    /// Read every source matching the pattern, keyed by source path. Without
    /// the per-core breakdown the result holds a single aggregate keyed by
    /// `""`, present even when nothing matched.
    ///
    /// Sources that fail to read or parse are dropped, as are fields whose
    /// value is not numeric; both are logged and counted as failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid glob.
    pub fn scrape_reports(&self) -> Result<BTreeMap<String, Report>, Error> {
        let mut reports = BTreeMap::new();
        for entry in glob::glob(&self.pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!("Failed to read report source: {err}");
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };
            let core = path.to_string_lossy().into_owned();
            match self.scanner.scan_path(&path) {
                Ok(scanned) => {
                    self.failures
                        .fetch_add(scanned.field_errors.len() as u64, Ordering::Relaxed);
                    debug!(core, "Scanned report source");
                    reports.insert(core, scanned.report);
                }
                Err(err) => {
                    warn!(core, "Dropping report source: {err}");
                    self.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if self.metrics_by_core {
            Ok(reports)
        } else {
            Ok(BTreeMap::from([(String::new(), merge(&reports))]))
        }
    }

    /// Run one collection cycle and render its results in the Prometheus
    /// text format. Overlapping calls are serialized, each one rendering only
    /// the cycle it ran.
    #[must_use]
    pub fn collect(&self) -> String {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let recorder = PrometheusBuilder::new().build_recorder();
        metrics::with_local_recorder(&recorder, || self.record());
        recorder.handle().render()
    }

    /// Run one cycle against the current recorder. Returns whether the cycle
    /// completed, which is also published as `litespeed_up`. Callers hold the
    /// cycle lock.
    fn record(&self) -> bool {
        self.describe();
        self.scrapes.fetch_add(1, Ordering::Relaxed);

        let up = match self.scrape_reports() {
            Ok(reports) => {
                publish(&reports);
                true
            }
            Err(err) => {
                error!("Aborting scrape: {err}");
                self.failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        };
        gauge!(UP_METRIC).set(if up { 1.0 } else { 0.0 });
        counter!(SCRAPES_METRIC).absolute(self.scrapes.load(Ordering::Relaxed));
        counter!(SCRAPE_FAILURES_METRIC).absolute(self.failures.load(Ordering::Relaxed));
        up
    }

    /// Register descriptions for everything this collector may publish.
    /// Excluded flags are left out.
    fn describe(&self) {
        let excluded = &self.scanner.options().excluded;
        for field in registry::fields() {
            if excluded.is_tracked(field.flag) {
                describe_gauge!(field.metric_name(), field.description);
            }
        }
        describe_gauge!(
            VERSION_METRIC,
            "A metric with a constant '1' value labeled by the LiteSpeed version."
        );
        describe_gauge!(UP_METRIC, "Was the last scrape of LiteSpeed successful.");
        describe_counter!(SCRAPES_METRIC, "Current total LiteSpeed scrapes.");
        describe_counter!(
            SCRAPE_FAILURES_METRIC,
            "Number of errors while scraping files."
        );
    }
}

/// Publish every sample of `reports`. `litespeed_version` is taken from the
/// first report in key order: the lowest source path per core, or the
/// aggregate, whose version is that of the last source folded into it.
fn publish(reports: &BTreeMap<String, Report>) {
    if let Some(report) = reports.values().next() {
        let version = &report.general_info.version;
        if !version.is_empty() {
            gauge!(VERSION_METRIC, "version" => version.clone()).set(1.0);
        }
    }
    for (core, report) in reports {
        for sample in report.samples(core) {
            gauge!(sample.descriptor.metric_name(), sample.labels.as_slice()).set(sample.value);
        }
    }
}
