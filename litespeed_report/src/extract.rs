//! Line classification and per-record field extraction.
//!
//! A report line is classified by its leading identifier, the run of ASCII
//! alphanumerics and underscores it starts with. Lines look like this:
//!
//! ```text
//! VERSION: LiteSpeed Web Server/Enterprise/6.0.12
//! UPTIME: 02:13:45
//! BPS_IN: 12, BPS_OUT: 340, SSL_BPS_IN: 5, SSL_BPS_OUT: 88
//! MAXCONN: 10000, MAXSSL_CONN: 5000, PLAINCONN: 3, AVAILCONN: 9997, ...
//! REQ_RATE []: REQ_PROCESSING: 1, REQ_PER_SEC: 0.3, TOT_REQS: 920, ...
//! REQ_RATE [APVH_example.com:443]: REQ_PROCESSING: 0, REQ_PER_SEC: 0.1, ...
//! EXTAPP [LSAPI] [APVH_example.com:443] [lsphp]: CMAXCONN: 10, EMAXCONN: 10, ...
//! BLOCKED_IP:
//! EOF
//! ```
//!
//! The bracket captures of `REQ_RATE` and `EXTAPP` headers are positional, so
//! they are read by a small tokenizer rather than a general pattern. Keys of
//! those two families are namespaced with their identifier before they are
//! filtered and stored.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::{
    exclusion::ExclusionSet,
    line::{parse_key_value_pair, parse_key_values},
    registry::{self, EXTAPP_PREFIX, LabelShape, REQ_RATE_PREFIX},
    report::{ExternalApp, Report, RequestRate, Values},
    value,
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Structural faults of a single line. Any of these discards the whole source.
pub enum Error {
    /// The header carries the wrong number of bracket captures.
    #[error("{identifier} header expects {expected} bracket captures, found {found}")]
    Arity {
        /// Identifier of the offending line.
        identifier: &'static str,
        /// Human readable description of the accepted counts.
        expected: &'static str,
        /// Number of captures found.
        found: usize,
    },
    /// A `[` without its matching `]`.
    #[error("unclosed bracket in {identifier} header")]
    UnclosedBracket {
        /// Identifier of the offending line.
        identifier: &'static str,
    },
    /// The header is not followed by `:`.
    #[error("missing ':' after {identifier} header")]
    MissingSeparator {
        /// Identifier of the offending line.
        identifier: &'static str,
    },
}

#[derive(Debug, Clone, Default)]
/// Caller supplied switches for extraction.
pub struct Options {
    /// Keep request rates of individual virtual hosts. When unset only the
    /// server-wide bucket is produced.
    pub req_rates_by_host: bool,
    /// Skip `EXTAPP` lines entirely.
    pub exclude_extapp: bool,
    /// Flags never to store.
    pub excluded: ExclusionSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The recognized line identifiers.
pub enum Identifier {
    /// `VERSION: <string>`
    Version,
    /// `UPTIME: <string>`
    Uptime,
    /// A line of generic counters led by one of them, e.g. `BPS_IN` or
    /// `MAXCONN`.
    General,
    /// `REQ_RATE [hostname]: ...`
    ReqRate,
    /// `EXTAPP [service] [hostname] [handler]: ...`
    ExtApp,
}

impl Identifier {
    /// Classify `line` by its leading token.
    ///
    /// Returns the identifier and the remainder of the line after the token,
    /// or `None` for lines that carry nothing of interest.
    #[must_use]
    pub fn classify(line: &str) -> Option<(Self, &str)> {
        let token = leading_token(line);
        let identifier = match token {
            "VERSION" => Self::Version,
            "UPTIME" => Self::Uptime,
            "REQ_RATE" => Self::ReqRate,
            "EXTAPP" => Self::ExtApp,
            token if registry::is_generic(token) => Self::General,
            _ => return None,
        };
        Some((identifier, &line[token.len()..]))
    }
}

/// The run of ASCII alphanumerics and `_` that `line` starts with.
#[must_use]
pub fn leading_token(line: &str) -> &str {
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    &line[..end]
}

/// Split a record header into its bracket captures and the field list that
/// follows the `:` separator.
///
/// # Errors
///
/// Fails if a bracket is left open or the captures are not followed by `:`.
pub fn split_header<'a>(
    identifier: &'static str,
    header: &'a str,
) -> Result<(Vec<&'a str>, &'a str), Error> {
    let mut captures = Vec::with_capacity(3);
    let mut rest = header;
    loop {
        rest = rest.trim_start();
        if let Some(open) = rest.strip_prefix('[') {
            let end = open
                .find(|c: char| c == '[' || c == ']')
                .ok_or(Error::UnclosedBracket { identifier })?;
            if open[end..].starts_with('[') {
                return Err(Error::UnclosedBracket { identifier });
            }
            captures.push(&open[..end]);
            rest = &open[end + 1..];
        } else if let Some(fields) = rest.strip_prefix(':') {
            return Ok((captures, fields));
        } else {
            return Err(Error::MissingSeparator { identifier });
        }
    }
}

/// Accumulates the lines of one source into a [`Report`].
#[derive(Debug)]
pub struct Extractor<'a> {
    options: &'a Options,
    report: Report,
    field_errors: Vec<value::Error>,
}

impl<'a> Extractor<'a> {
    /// Create an extractor starting from an empty report.
    #[must_use]
    pub fn new(options: &'a Options) -> Self {
        Self {
            options,
            report: Report::new(),
            field_errors: Vec::new(),
        }
    }

    /// Extract whatever `line` carries into the report under construction.
    ///
    /// Lines with an unknown identifier are ignored. Fields with non-numeric
    /// values are dropped and remembered, see [`Extractor::finish`].
    ///
    /// # Errors
    ///
    /// Returns an error if a `REQ_RATE` or `EXTAPP` header is malformed.
    pub fn extract_line(&mut self, line: &str) -> Result<(), Error> {
        let Some((identifier, rest)) = Identifier::classify(line) else {
            return Ok(());
        };
        match identifier {
            Identifier::Version => {
                self.report.general_info.version = parse_key_value_pair(line, ": ").1.to_string();
            }
            Identifier::Uptime => {
                self.report.general_info.uptime = parse_key_value_pair(line, ": ").1.to_string();
            }
            Identifier::General => {
                let values = self.collect_values(line, None, LabelShape::Generic);
                self.report.general_info.values.extend(values);
            }
            Identifier::ReqRate => self.extract_req_rate(rest)?,
            Identifier::ExtApp => {
                if !self.options.exclude_extapp {
                    self.extract_ext_app(rest)?;
                }
            }
        }
        Ok(())
    }

    /// The finished report and every field coercion failure met on the way.
    #[must_use]
    pub fn finish(self) -> (Report, Vec<value::Error>) {
        (self.report, self.field_errors)
    }

    fn extract_req_rate(&mut self, header: &str) -> Result<(), Error> {
        const IDENTIFIER: &str = "REQ_RATE";

        let (captures, fields) = split_header(IDENTIFIER, header)?;
        let hostname = match captures.as_slice() {
            [] => "",
            [hostname] => hostname.trim(),
            _ => {
                return Err(Error::Arity {
                    identifier: IDENTIFIER,
                    expected: "at most 1",
                    found: captures.len(),
                });
            }
        };
        if !hostname.is_empty() && !self.options.req_rates_by_host {
            return Ok(());
        }

        let values = self.collect_values(fields, Some(REQ_RATE_PREFIX), LabelShape::PerHost);
        match self.report.index_of_req_rate(|r| r.hostname == hostname) {
            Some(idx) => self.report.req_rates[idx].values.extend(values),
            None => self.report.req_rates.push(RequestRate {
                hostname: hostname.to_string(),
                values,
            }),
        }
        Ok(())
    }

    fn extract_ext_app(&mut self, header: &str) -> Result<(), Error> {
        const IDENTIFIER: &str = "EXTAPP";

        let (captures, fields) = split_header(IDENTIFIER, header)?;
        let [service, hostname, handler] = captures.as_slice() else {
            return Err(Error::Arity {
                identifier: IDENTIFIER,
                expected: "exactly 3",
                found: captures.len(),
            });
        };
        let (service, hostname, handler) = (service.trim(), hostname.trim(), handler.trim());

        let values = self.collect_values(fields, Some(EXTAPP_PREFIX), LabelShape::PerApp);
        match self.report.index_of_ext_app(|a| {
            a.service == service && a.hostname == hostname && a.handler == handler
        }) {
            Some(idx) => self.report.ext_apps[idx].values.extend(values),
            None => self.report.ext_apps.push(ExternalApp {
                service: service.to_string(),
                hostname: hostname.to_string(),
                handler: handler.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Parse `fields`, namespace each key with `prefix`, drop excluded and
    /// unregistered flags and coerce what remains.
    fn collect_values(&mut self, fields: &str, prefix: Option<&str>, shape: LabelShape) -> Values {
        let mut values = Values::default();
        for (key, raw) in parse_key_values(fields) {
            let flag: Cow<'_, str> = match prefix {
                Some(prefix) => Cow::Owned(format!("{prefix}{key}")),
                None => Cow::Borrowed(key),
            };
            if !self.options.excluded.is_tracked(&flag) {
                continue;
            }
            let Some(descriptor) = registry::describe(&flag).filter(|d| d.shape == shape) else {
                debug!("ignoring unknown field {flag}");
                continue;
            };
            match value::coerce(descriptor.flag, raw) {
                Ok(v) => {
                    values.insert(descriptor.flag, v);
                }
                Err(err) => {
                    warn!("Can't parse field value: {err}");
                    self.field_errors.push(err);
                }
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(options: &Options, lines: &[&str]) -> Result<(Report, Vec<value::Error>), Error> {
        let mut extractor = Extractor::new(options);
        for line in lines {
            extractor.extract_line(line)?;
        }
        Ok(extractor.finish())
    }

    fn by_host() -> Options {
        Options {
            req_rates_by_host: true,
            ..Options::default()
        }
    }

    #[test]
    fn classify_known_identifiers() {
        let cases = [
            ("VERSION: 1", Some(Identifier::Version)),
            ("UPTIME: 00:00:01", Some(Identifier::Uptime)),
            ("BPS_IN: 1, BPS_OUT: 2", Some(Identifier::General)),
            ("MAXCONN: 10", Some(Identifier::General)),
            ("REQ_RATE []: TOT_REQS: 1", Some(Identifier::ReqRate)),
            ("REQ_RATE: TOT_REQS: 1", Some(Identifier::ReqRate)),
            ("EXTAPP [a] [b] [c]: TOT_REQS: 1", Some(Identifier::ExtApp)),
            ("BLOCKED_IP:", None),
            ("EOF", None),
            ("", None),
            ("  VERSION: indented", None),
            ("REQ_RATE_X: 1", None),
        ];
        for (line, expected) in cases {
            assert_eq!(Identifier::classify(line).map(|(i, _)| i), expected, "{line}");
        }
    }

    #[test]
    fn header_captures() {
        assert_eq!(
            split_header("REQ_RATE", " [APVH_example.com:443]: TOT_REQS: 5"),
            Ok((vec!["APVH_example.com:443"], " TOT_REQS: 5"))
        );
        assert_eq!(split_header("REQ_RATE", ": A: 1"), Ok((vec![], " A: 1")));
        assert_eq!(
            split_header("EXTAPP", " [LSAPI] [] [lsphp]: A: 1"),
            Ok((vec!["LSAPI", "", "lsphp"], " A: 1"))
        );
        assert_eq!(
            split_header("EXTAPP", " [LSAPI [x]: A: 1"),
            Err(Error::UnclosedBracket { identifier: "EXTAPP" })
        );
        assert_eq!(
            split_header("EXTAPP", " [LSAPI"),
            Err(Error::UnclosedBracket { identifier: "EXTAPP" })
        );
        assert_eq!(
            split_header("REQ_RATE", " [x] A: 1"),
            Err(Error::MissingSeparator { identifier: "REQ_RATE" })
        );
    }

    #[test]
    fn general_info_lines() {
        let (report, errors) = extract(
            &Options::default(),
            &[
                "VERSION: LiteSpeed Web Server/Enterprise/6.0.12",
                "UPTIME: 02:13:45",
                "BPS_IN: 12, BPS_OUT: 340, SSL_BPS_IN: 5, SSL_BPS_OUT: 88",
                "MAXCONN: 10000, MAXSSL_CONN: 5000, PLAINCONN: 3",
            ],
        )
        .expect("well formed");
        assert!(errors.is_empty());
        assert_eq!(
            report.general_info.version,
            "LiteSpeed Web Server/Enterprise/6.0.12"
        );
        assert_eq!(report.general_info.uptime, "02:13:45");
        assert_eq!(report.general_info.values.len(), 7);
        assert_eq!(report.general_info.values.get("BPS_OUT"), Some(&340.0));
        assert_eq!(report.general_info.values.get("PLAINCONN"), Some(&3.0));
    }

    #[test]
    fn last_version_wins() {
        let (report, _) = extract(&Options::default(), &["VERSION: a", "VERSION: b"])
            .expect("well formed");
        assert_eq!(report.general_info.version, "b");
    }

    #[test]
    fn unknown_keys_are_not_stored() {
        let (report, errors) = extract(
            &Options::default(),
            &["BPS_IN: 1, SOMETHING_NEW: 2, EXTAPP_TOT_REQS: 3"],
        )
        .expect("well formed");
        assert!(errors.is_empty());
        assert_eq!(report.general_info.values.len(), 1);
        assert_eq!(report.general_info.values.get("BPS_IN"), Some(&1.0));
    }

    #[test]
    fn req_rate_keys_are_namespaced() {
        let (report, _) = extract(
            &Options::default(),
            &["REQ_RATE []: REQ_PROCESSING: 1, REQ_PER_SEC: 0.3, TOT_REQS: 920"],
        )
        .expect("well formed");
        assert_eq!(report.req_rates.len(), 1);
        let rate = &report.req_rates[0];
        assert_eq!(rate.hostname, "");
        assert_eq!(rate.values.get("REQ_RATE_REQ_PER_SEC"), Some(&0.3));
        assert_eq!(rate.values.get("REQ_RATE_TOT_REQS"), Some(&920.0));
        assert!(!rate.values.contains_key("TOT_REQS"));
    }

    #[test]
    fn req_rate_without_brackets_is_server_wide() {
        let (report, _) =
            extract(&Options::default(), &["REQ_RATE: TOT_REQS: 4"]).expect("well formed");
        assert_eq!(report.req_rates.len(), 1);
        assert_eq!(report.req_rates[0].hostname, "");
    }

    #[test]
    fn req_rate_hosts_dropped_unless_requested() {
        let lines = [
            "REQ_RATE []: TOT_REQS: 10",
            "REQ_RATE [APVH_example.com:443]: TOT_REQS: 7",
        ];
        let (report, _) = extract(&Options::default(), &lines).expect("well formed");
        assert_eq!(report.req_rates.len(), 1);
        assert_eq!(report.req_rates[0].hostname, "");

        let (report, _) = extract(&by_host(), &lines).expect("well formed");
        assert_eq!(report.req_rates.len(), 2);
        assert_eq!(report.req_rates[1].hostname, "APVH_example.com:443");
        assert_eq!(report.req_rates[1].values.get("REQ_RATE_TOT_REQS"), Some(&7.0));
    }

    #[test]
    fn repeated_req_rate_host_is_unioned() {
        let (report, _) = extract(
            &by_host(),
            &[
                "REQ_RATE [a]: TOT_REQS: 1, REQ_PER_SEC: 2",
                "REQ_RATE [a]: TOT_REQS: 5, REQ_PROCESSING: 3",
            ],
        )
        .expect("well formed");
        assert_eq!(report.req_rates.len(), 1);
        let values = &report.req_rates[0].values;
        assert_eq!(values.len(), 3);
        assert_eq!(values.get("REQ_RATE_TOT_REQS"), Some(&5.0));
        assert_eq!(values.get("REQ_RATE_REQ_PER_SEC"), Some(&2.0));
    }

    #[test]
    fn req_rate_with_two_captures_is_structural() {
        let err = extract(&by_host(), &["REQ_RATE [a] [b]: TOT_REQS: 1"]).expect_err("arity");
        assert_eq!(
            err,
            Error::Arity {
                identifier: "REQ_RATE",
                expected: "at most 1",
                found: 2
            }
        );
    }

    #[test]
    fn ext_app_positional_captures() {
        let (report, _) = extract(
            &Options::default(),
            &["EXTAPP [LSAPI] [APVH_example.com:443] [lsphp]: CMAXCONN: 10, POOL_SIZE: 1, REQ_PER_SEC: 0.5"],
        )
        .expect("well formed");
        assert_eq!(report.ext_apps.len(), 1);
        let app = &report.ext_apps[0];
        assert_eq!(app.service, "LSAPI");
        assert_eq!(app.hostname, "APVH_example.com:443");
        assert_eq!(app.handler, "lsphp");
        assert_eq!(app.values.get("EXTAPP_CMAXCONN"), Some(&10.0));
        assert_eq!(app.values.get("EXTAPP_REQ_PER_SEC"), Some(&0.5));
    }

    #[test]
    fn ext_app_handler_distinguishes_records_within_a_source() {
        let (report, _) = extract(
            &Options::default(),
            &[
                "EXTAPP [LSAPI] [h] [lsphp74]: TOT_REQS: 1",
                "EXTAPP [LSAPI] [h] [lsphp81]: TOT_REQS: 2",
                "EXTAPP [LSAPI] [h] [lsphp74]: INUSE_CONN: 3",
            ],
        )
        .expect("well formed");
        assert_eq!(report.ext_apps.len(), 2);
        assert_eq!(report.ext_apps[0].values.len(), 2);
    }

    #[test]
    fn ext_app_wrong_arity_is_structural() {
        for line in ["EXTAPP [LSAPI] [h]: TOT_REQS: 1", "EXTAPP: TOT_REQS: 1"] {
            let err = extract(&Options::default(), &[line]).expect_err("arity");
            assert!(matches!(err, Error::Arity { identifier: "EXTAPP", .. }), "{line}");
        }
    }

    #[test]
    fn excluded_ext_apps_are_not_even_parsed() {
        let options = Options {
            exclude_extapp: true,
            ..Options::default()
        };
        let (report, _) = extract(&options, &["EXTAPP [broken: nonsense", "EXTAPP [a] [b] [c]: TOT_REQS: 1"])
            .expect("skipped");
        assert!(report.ext_apps.is_empty());
    }

    #[test]
    fn excluded_flags_are_never_coerced() {
        let options = Options {
            excluded: ExclusionSet::from_flags(["BPS_IN", "REQ_RATE_TOT_REQS"]),
            ..Options::default()
        };
        let (report, errors) = extract(
            &options,
            &["BPS_IN: not-a-number, BPS_OUT: 2", "REQ_RATE []: TOT_REQS: nope, REQ_PER_SEC: 1"],
        )
        .expect("well formed");
        assert!(errors.is_empty());
        assert_eq!(report.general_info.values.len(), 1);
        assert_eq!(report.req_rates[0].values.len(), 1);
        assert_eq!(report.req_rates[0].values.get("REQ_RATE_REQ_PER_SEC"), Some(&1.0));
    }

    #[test]
    fn non_numeric_field_is_dropped_and_reported() {
        let (report, errors) = extract(&Options::default(), &["BPS_IN: abc, BPS_OUT: 2"])
            .expect("well formed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].flag, "BPS_IN");
        assert_eq!(errors[0].raw, "abc");
        assert_eq!(report.general_info.values.len(), 1);
        assert_eq!(report.general_info.values.get("BPS_OUT"), Some(&2.0));
    }

    #[test]
    fn every_flag_excluded_leaves_empty_values() {
        let options = Options {
            req_rates_by_host: true,
            exclude_extapp: false,
            excluded: ExclusionSet::from_flags(registry::all_flags()),
        };
        let (report, _) = extract(
            &options,
            &[
                "BPS_IN: 1, BPS_OUT: 2",
                "REQ_RATE [x]: TOT_REQS: 3",
                "EXTAPP [a] [b] [c]: TOT_REQS: 4",
            ],
        )
        .expect("well formed");
        assert!(report.general_info.values.is_empty());
        assert!(report.req_rates.iter().all(|r| r.values.is_empty()));
        assert!(report.ext_apps.iter().all(|a| a.values.is_empty()));
    }

    #[test]
    fn structural_error_is_a_plain_value() {
        let err = extract(&Options::default(), &["EXTAPP [a] [b]: TOT_REQS: 1"])
            .expect_err("two captures");
        let reported = err;
        assert_eq!(reported, err);
        assert_eq!(
            err,
            Error::Arity {
                identifier: "EXTAPP",
                expected: "exactly 3",
                found: 2,
            }
        );
    }
}
