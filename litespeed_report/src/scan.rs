//! Scanning of a single report source.
//!
//! A source is read line by line and never held in memory whole. Failure is
//! source granular for I/O and structural faults: the partially built report
//! is dropped and the caller moves on to the next source. Non-numeric field
//! values only cost the field, see [`Scanned::field_errors`].

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::{
    extract::{self, Extractor, Options},
    report::Report,
    value,
};

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Scanner`]
pub enum Error {
    /// The source could not be opened.
    #[error("Failed to open {path:?}: {source}")]
    Open {
        /// Path of the source.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading the source failed part way, including invalid UTF-8.
    #[error("Failed to read line {line}: {source}")]
    Read {
        /// 1-based number of the line being read.
        line: usize,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A line is structurally malformed.
    #[error("Malformed line {line}: {source}")]
    Parse {
        /// 1-based number of the offending line.
        line: usize,
        /// What was wrong with it.
        #[source]
        source: extract::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
/// The result of scanning one source successfully.
pub struct Scanned {
    /// The parsed report.
    pub report: Report,
    /// Fields dropped because their value was not numeric.
    pub field_errors: Vec<value::Error>,
}

#[derive(Debug, Clone, Default)]
/// Turns report sources into [`Report`]s.
pub struct Scanner {
    options: Options,
}

impl Scanner {
    /// Create a new [`Scanner`] applying `options` to every source.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// The options this scanner applies.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Scan the report file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read, or if one of its
    /// lines is structurally malformed.
    pub fn scan_path(&self, path: &Path) -> Result<Scanned, Error> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.scan_reader(BufReader::new(file))
    }

    /// Scan a report from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or if a line is structurally
    /// malformed.
    pub fn scan_reader<R: BufRead>(&self, mut reader: R) -> Result<Scanned, Error> {
        let mut extractor = Extractor::new(&self.options);
        let mut buf = String::new();
        let mut line_number = 0;
        loop {
            buf.clear();
            let read = reader.read_line(&mut buf).map_err(|source| Error::Read {
                line: line_number + 1,
                source,
            })?;
            if read == 0 {
                break;
            }
            line_number += 1;

            let line = buf.strip_suffix('\n').unwrap_or(&buf);
            let line = line.strip_suffix('\r').unwrap_or(line);
            extractor
                .extract_line(line)
                .map_err(|source| Error::Parse {
                    line: line_number,
                    source,
                })?;
        }

        let (report, field_errors) = extractor.finish();
        Ok(Scanned {
            report,
            field_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf};

    use super::*;
    use crate::{ExclusionSet, registry};

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn by_host() -> Scanner {
        Scanner::new(Options {
            req_rates_by_host: true,
            ..Options::default()
        })
    }

    #[test]
    fn scans_fixture_report() {
        let scanned = by_host()
            .scan_path(&testdata(".rtreport"))
            .expect("fixture scans");
        let report = scanned.report;
        assert!(scanned.field_errors.is_empty());
        assert_eq!(
            report.general_info.version,
            "LiteSpeed Web Server/Enterprise/6.0.12"
        );
        assert_eq!(report.general_info.uptime, "02:13:45");
        assert_eq!(report.general_info.values.len(), 11);
        assert_eq!(report.general_info.values.get("BPS_IN"), Some(&12.0));
        assert_eq!(report.general_info.values.get("MAXCONN"), Some(&10000.0));

        assert_eq!(report.req_rates.len(), 3);
        assert_eq!(report.req_rates[0].hostname, "");
        assert_eq!(report.req_rates[0].values.len(), 9);
        assert_eq!(report.req_rates[1].hostname, "APVH_example.com:443");

        assert_eq!(report.ext_apps.len(), 2);
        assert_eq!(report.ext_apps[0].service, "LSAPI");
        assert_eq!(report.ext_apps[0].handler, "lsphp");
        assert_eq!(report.ext_apps[0].values.len(), 8);
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = by_host()
            .scan_path(&testdata("does-not-exist"))
            .expect_err("no such file");
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn malformed_fixture_is_parse_error() {
        let err = by_host()
            .scan_path(&testdata("malformed_report"))
            .expect_err("malformed");
        assert!(matches!(err, Error::Parse { line: 5, .. }), "{err}");
    }

    #[test]
    fn invalid_values_cost_only_the_field() {
        let scanned = Scanner::default()
            .scan_path(&testdata("invalid_value_types_report"))
            .expect("scans");
        assert_eq!(scanned.field_errors.len(), 3);
        let report = scanned.report;
        assert_eq!(report.general_info.values.get("BPS_IN"), None);
        assert_eq!(report.general_info.values.get("BPS_OUT"), Some(&2.0));
        assert_eq!(report.req_rates.len(), 1);
        assert_eq!(report.req_rates[0].values.get("REQ_RATE_TOT_REQS"), None);
        assert_eq!(report.ext_apps.len(), 1);
        assert_eq!(report.ext_apps[0].values.get("EXTAPP_REQ_PER_SEC"), None);
        assert_eq!(report.ext_apps[0].values.get("EXTAPP_TOT_REQS"), Some(&15.0));
    }

    #[test]
    fn invalid_utf8_is_read_error() {
        let bytes: &[u8] = b"VERSION: x\nBPS_IN: \xff\xfe\n";
        let err = Scanner::default()
            .scan_reader(bytes)
            .expect_err("invalid utf-8");
        assert!(matches!(err, Error::Read { line: 2, .. }));
    }

    #[test]
    fn crlf_and_missing_final_newline() {
        let text: &[u8] = b"UPTIME: 00:00:05\r\nBPS_IN: 4, BPS_OUT: 5";
        let scanned = Scanner::default().scan_reader(text).expect("scans");
        assert_eq!(scanned.report.general_info.uptime, "00:00:05");
        assert_eq!(scanned.report.general_info.values.get("BPS_OUT"), Some(&5.0));
    }

    #[test]
    fn line_order_is_irrelevant() {
        let forward: &[u8] = b"VERSION: v\nBPS_IN: 1\nREQ_RATE []: TOT_REQS: 2\n";
        let backward: &[u8] = b"REQ_RATE []: TOT_REQS: 2\nBPS_IN: 1\nVERSION: v\n";
        let scanner = Scanner::default();
        assert_eq!(
            scanner.scan_reader(forward).expect("scans"),
            scanner.scan_reader(backward).expect("scans")
        );
    }

    #[test]
    fn every_flag_excluded_scans_empty_values() {
        let scanner = Scanner::new(Options {
            req_rates_by_host: true,
            exclude_extapp: false,
            excluded: ExclusionSet::from_flags(registry::all_flags()),
        });
        let report = scanner
            .scan_path(&testdata(".rtreport"))
            .expect("scans")
            .report;
        assert!(report.general_info.values.is_empty());
        assert!(report.req_rates.iter().all(|r| r.values.is_empty()));
        assert!(report.ext_apps.iter().all(|a| a.values.is_empty()));
    }

    #[test]
    fn scans_temporary_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "EXTAPP [Proxy] [] [backend]: INUSE_CONN: 2").expect("write");
        let scanned = Scanner::default().scan_path(file.path()).expect("scans");
        assert_eq!(scanned.report.ext_apps.len(), 1);
        assert_eq!(scanned.report.ext_apps[0].hostname, "");
    }
}
