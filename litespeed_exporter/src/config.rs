//! This module controls configuration parsing from the end user. Every field
//! has a default so an absent or partial YAML file is fine; command line flags
//! are layered on top by the binary.
use std::{fs, net::SocketAddr, path::Path};

use litespeed_report::{ExclusionSet, Options, registry};
use serde::Deserialize;
use tracing::{debug, warn};

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Default address the telemetry endpoint listens on.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9777";
/// Default path of the telemetry endpoint.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
/// Default glob selecting report sources, one per `lshttpd` core.
pub const DEFAULT_SCRAPE_PATTERN: &str = "/tmp/lshttpd/.rtreport*";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
/// Main configuration struct for this program
pub struct Config {
    /// Address and port the telemetry endpoint binds to.
    pub listen_address: SocketAddr,
    /// Path under which metrics are exposed.
    pub telemetry_path: String,
    /// Glob selecting the report sources read each cycle.
    pub scrape_pattern: String,
    /// Flags never published.
    pub exclude_metrics: Vec<String>,
    /// Keep request rates of named virtual hosts, not only the server wide one.
    pub req_rates_by_host: bool,
    /// Publish one series set per source instead of a single aggregate.
    pub metrics_by_core: bool,
    /// Ignore external application lines entirely.
    pub exclude_extapp: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 9777)),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
            scrape_pattern: DEFAULT_SCRAPE_PATTERN.to_string(),
            exclude_metrics: Vec::new(),
            req_rates_by_host: false,
            metrics_by_core: false,
            exclude_extapp: false,
        }
    }
}

impl Config {
    /// Parse a configuration from YAML `contents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or names an unknown field.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        // An empty document deserializes to unit, not to an empty mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        debug!("Attempting to open configuration file at: {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Add a comma separated list of flags to the excluded ones.
    pub fn extend_exclusions(&mut self, list: &str) {
        self.exclude_metrics.extend(
            list.split(',')
                .map(str::trim)
                .filter(|flag| !flag.is_empty())
                .map(str::to_string),
        );
    }

    /// The excluded flags as a set. Flags the registry does not know are
    /// harmless and kept, but worth a warning since they are likely typos.
    #[must_use]
    pub fn exclusion_set(&self) -> ExclusionSet {
        let excluded = ExclusionSet::from_flags(&self.exclude_metrics);
        for flag in excluded.iter() {
            if registry::describe(flag).is_none() {
                warn!(
                    flag,
                    "excluded metric is unknown, known metrics are: {}",
                    registry::flags_string()
                );
            }
        }
        excluded
    }

    /// The parse options this configuration calls for.
    #[must_use]
    pub fn scan_options(&self) -> Options {
        Options {
            req_rates_by_host: self.req_rates_by_host,
            exclude_extapp: self.exclude_extapp,
            excluded: self.exclusion_set(),
        }
    }
}
