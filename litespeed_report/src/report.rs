//! The parsed form of a report and the merge of several reports into one.
//!
//! When the per-core breakdown is disabled the reports of every core are
//! summed into a single synthetic [`Report`]. Numeric values add up key by key.
//! Request-rate records are matched by hostname. External-app records are
//! matched by service and hostname only: two records differing just in their
//! handler collapse into one, keeping the handler seen first.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

/// Numeric values of one record, keyed by registered flag.
pub type Values = FxHashMap<&'static str, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
/// Scalar and global counters of one core.
pub struct GeneralInfo {
    /// Server version string, e.g. `LiteSpeed Web Server/Enterprise/6.0.12`.
    pub version: String,
    /// Uptime as reported, e.g. `02:13:45`.
    pub uptime: String,
    /// Connection and bandwidth counters.
    pub values: Values,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Request throughput and cache counters of one virtual host.
pub struct RequestRate {
    /// The virtual host, empty for the server-wide bucket.
    pub hostname: String,
    /// Counters keyed by `REQ_RATE_` flags.
    pub values: Values,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Connection pool counters of one external application.
pub struct ExternalApp {
    /// Kind of application, e.g. `LSAPI` or `Proxy`.
    pub service: String,
    /// The virtual host the application serves.
    pub hostname: String,
    /// The application handler, e.g. `lsphp`.
    pub handler: String,
    /// Counters keyed by `EXTAPP_` flags.
    pub values: Values,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Everything parsed out of one report source, or the sum of several.
pub struct Report {
    /// Version, uptime and global counters.
    pub general_info: GeneralInfo,
    /// Per-host request rates, unique by hostname.
    pub req_rates: Vec<RequestRate>,
    /// Per-application counters.
    pub ext_apps: Vec<ExternalApp>,
}

impl Report {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first request-rate record matching `predicate`.
    pub fn index_of_req_rate<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&RequestRate) -> bool,
    {
        self.req_rates.iter().position(predicate)
    }

    /// Index of the first external-app record matching `predicate`.
    pub fn index_of_ext_app<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&ExternalApp) -> bool,
    {
        self.ext_apps.iter().position(predicate)
    }

    /// Add `other` into this report.
    ///
    /// Version and uptime are taken from `other`. Values are summed key by
    /// key. Records of `other` with no match here are appended.
    pub fn add(&mut self, other: &Report) {
        self.general_info.version.clone_from(&other.general_info.version);
        self.general_info.uptime.clone_from(&other.general_info.uptime);
        sum_values(&mut self.general_info.values, &other.general_info.values);

        for rate in &other.req_rates {
            match self.index_of_req_rate(|r| r.hostname == rate.hostname) {
                Some(idx) => sum_values(&mut self.req_rates[idx].values, &rate.values),
                None => self.req_rates.push(rate.clone()),
            }
        }

        // handler is deliberately not part of the match
        for app in &other.ext_apps {
            match self.index_of_ext_app(|a| a.service == app.service && a.hostname == app.hostname)
            {
                Some(idx) => sum_values(&mut self.ext_apps[idx].values, &app.values),
                None => self.ext_apps.push(app.clone()),
            }
        }
    }
}

/// Add `value` to `key` in `values`, inserting it when absent.
pub fn sum_or_insert(values: &mut Values, key: &'static str, value: f64) {
    *values.entry(key).or_insert(0.0) += value;
}

fn sum_values(into: &mut Values, from: &Values) {
    for (key, value) in from {
        sum_or_insert(into, *key, *value);
    }
}

/// Fold `reports` into one aggregate report.
///
/// Reports are folded in ascending source id order, so the version and
/// uptime of the aggregate are those of the last source id and first-seen
/// record order follows the sorted ids.
#[must_use]
pub fn merge(reports: &BTreeMap<String, Report>) -> Report {
    let mut total = Report::new();
    for report in reports.values() {
        total.add(report);
    }
    total
}
