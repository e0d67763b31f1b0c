//! Parser and aggregation engine for LiteSpeed real-time reports.
//!
//! Every `lshttpd` core process periodically writes a plain-text status report,
//! the `.rtreport` file. This crate turns one such report into a [`Report`],
//! and folds the reports of several cores into a single aggregate when the
//! per-core breakdown is not wanted. Rendering the result is left to the
//! caller, see [`sample`].

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

pub mod exclusion;
pub mod extract;
pub mod line;
pub mod registry;
pub mod report;
pub mod sample;
pub mod scan;
pub mod value;

pub use exclusion::ExclusionSet;
pub use extract::Options;
pub use registry::{FieldDescriptor, LabelShape};
pub use report::{ExternalApp, GeneralInfo, Report, RequestRate, merge};
pub use sample::Sample;
pub use scan::{Scanned, Scanner};
