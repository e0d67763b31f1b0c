//! Coercion of raw report values into numbers.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// A single field whose raw value is not numeric.
///
/// The field is dropped from its record; the rest of the source is still
/// parsed.
#[error("field {flag} has non-numeric value {raw:?}: {source}")]
pub struct Error {
    /// The namespaced flag the value belongs to.
    pub flag: String,
    /// The raw value as found in the report.
    pub raw: String,
    /// The underlying parse failure.
    #[source]
    pub source: std::num::ParseFloatError,
}

/// Parse `raw`, the value of `flag`, as a decimal floating-point number.
///
/// # Errors
///
/// Returns an error naming `flag` and `raw` if `raw` is not a number.
pub fn coerce(flag: &str, raw: &str) -> Result<f64, Error> {
    raw.trim().parse::<f64>().map_err(|source| Error {
        flag: flag.to_string(),
        raw: raw.to_string(),
        source,
    })
}
