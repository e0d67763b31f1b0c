//! Prometheus exporter for LiteSpeed real-time reports.
//!
//! Each scrape of the telemetry endpoint runs one collection cycle: the
//! `.rtreport` sources matching the configured pattern are parsed with
//! [`litespeed_report`], optionally folded into one aggregate, and published
//! as gauges through the [`metrics`] facade. Rendering is left to
//! `metrics-exporter-prometheus`.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

pub mod collector;
pub mod config;
pub mod httpd;

pub use collector::Collector;
pub use config::Config;
