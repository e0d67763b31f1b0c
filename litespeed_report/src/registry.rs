//! The table of every flag a LiteSpeed report may carry.
//!
//! Flags of the request-rate and external-app families are stored here with
//! their namespace prefix already applied, `REQ_RATE_TOT_REQS` rather than the
//! bare `TOT_REQS` found in the report, since both families reuse short names
//! such as `REQ_PER_SEC` with different meanings.

/// Prefix of every metric name derived from a flag.
pub const NAMESPACE: &str = "litespeed";
/// Namespace tag of the request-rate family.
pub const REQ_RATE_PREFIX: &str = "REQ_RATE_";
/// Namespace tag of the external-app family.
pub const EXTAPP_PREFIX: &str = "EXTAPP_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The set of labels a flag is reported with.
pub enum LabelShape {
    /// Labelled by core only.
    Generic,
    /// Labelled by core and virtual host.
    PerHost,
    /// Labelled by core, service, virtual host and handler.
    PerApp,
}

impl LabelShape {
    /// Label names in the order they are attached to a sample.
    #[must_use]
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            Self::Generic => &["core"],
            Self::PerHost => &["core", "hostname"],
            Self::PerApp => &["core", "service", "hostname", "handler"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A registry entry.
pub struct FieldDescriptor {
    /// The flag name, namespaced for the request-rate and external-app
    /// families.
    pub flag: &'static str,
    /// The labels samples of this flag carry.
    pub shape: LabelShape,
    /// Human readable description, used as metric help text.
    pub description: &'static str,
}

impl FieldDescriptor {
    const fn new(flag: &'static str, shape: LabelShape, description: &'static str) -> Self {
        Self {
            flag,
            shape,
            description,
        }
    }

    /// The exposed metric name, e.g. `litespeed_req_rate_tot_reqs`.
    #[must_use]
    pub fn metric_name(&self) -> String {
        format!("{NAMESPACE}_{}", self.flag.to_ascii_lowercase())
    }
}

use LabelShape::{Generic, PerApp, PerHost};

static FIELDS: [FieldDescriptor; 28] = [
    FieldDescriptor::new("BPS_IN", Generic, "Incoming plain traffic in bytes per second."),
    FieldDescriptor::new("BPS_OUT", Generic, "Outgoing plain traffic in bytes per second."),
    FieldDescriptor::new("SSL_BPS_IN", Generic, "Incoming SSL traffic in bytes per second."),
    FieldDescriptor::new("SSL_BPS_OUT", Generic, "Outgoing SSL traffic in bytes per second."),
    FieldDescriptor::new("MAXCONN", Generic, "Maximum number of plain connections."),
    FieldDescriptor::new("MAXSSL_CONN", Generic, "Maximum number of SSL connections."),
    FieldDescriptor::new("PLAINCONN", Generic, "Plain connections in use."),
    FieldDescriptor::new("AVAILCONN", Generic, "Plain connections available."),
    FieldDescriptor::new("IDLECONN", Generic, "Idle keep-alive connections."),
    FieldDescriptor::new("SSLCONN", Generic, "SSL connections in use."),
    FieldDescriptor::new("AVAILSSL", Generic, "SSL connections available."),
    FieldDescriptor::new("REQ_RATE_REQ_PROCESSING", PerHost, "Requests currently being processed."),
    FieldDescriptor::new("REQ_RATE_REQ_PER_SEC", PerHost, "Requests per second."),
    FieldDescriptor::new("REQ_RATE_TOT_REQS", PerHost, "Total requests served."),
    FieldDescriptor::new("REQ_RATE_PUB_CACHE_HITS_PER_SEC", PerHost, "Public cache hits per second."),
    FieldDescriptor::new("REQ_RATE_TOTAL_PUB_CACHE_HITS", PerHost, "Total public cache hits."),
    FieldDescriptor::new("REQ_RATE_PRIVATE_CACHE_HITS_PER_SEC", PerHost, "Private cache hits per second."),
    FieldDescriptor::new("REQ_RATE_TOTAL_PRIVATE_CACHE_HITS", PerHost, "Total private cache hits."),
    FieldDescriptor::new("REQ_RATE_STATIC_HITS_PER_SEC", PerHost, "Static file hits per second."),
    FieldDescriptor::new("REQ_RATE_TOTAL_STATIC_HITS", PerHost, "Total static file hits."),
    FieldDescriptor::new("EXTAPP_CMAXCONN", PerApp, "Configured maximum connections of the external app."),
    FieldDescriptor::new("EXTAPP_EMAXCONN", PerApp, "Effective maximum connections of the external app."),
    FieldDescriptor::new("EXTAPP_POOL_SIZE", PerApp, "Connection pool size of the external app."),
    FieldDescriptor::new("EXTAPP_INUSE_CONN", PerApp, "External app connections in use."),
    FieldDescriptor::new("EXTAPP_IDLE_CONN", PerApp, "Idle external app connections."),
    FieldDescriptor::new("EXTAPP_WAITQUE_DEPTH", PerApp, "Requests waiting for an external app connection."),
    FieldDescriptor::new("EXTAPP_REQ_PER_SEC", PerApp, "External app requests per second."),
    FieldDescriptor::new("EXTAPP_TOT_REQS", PerApp, "Total external app requests."),
];

/// Look up the descriptor of `flag`.
#[must_use]
pub fn describe(flag: &str) -> Option<&'static FieldDescriptor> {
    FIELDS.iter().find(|field| field.flag == flag)
}

/// Every registered descriptor, in table order.
#[must_use]
pub fn fields() -> &'static [FieldDescriptor] {
    &FIELDS
}

/// Every registered flag name, sorted alphabetically.
#[must_use]
pub fn all_flags() -> Vec<&'static str> {
    let mut flags: Vec<&'static str> = FIELDS.iter().map(|field| field.flag).collect();
    flags.sort_unstable();
    flags
}

/// The sorted flag names joined by `", "`, for help output.
#[must_use]
pub fn flags_string() -> String {
    all_flags().join(", ")
}

/// Whether `identifier` names a counter that leads a general-info line, such
/// as `BPS_IN` or `MAXCONN`.
#[must_use]
pub fn is_generic(identifier: &str) -> bool {
    describe(identifier).is_some_and(|field| field.shape == Generic)
}
