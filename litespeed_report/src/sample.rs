//! Flattening of a [`Report`] into labelled samples.
//!
//! This is the boundary with whatever exposes the metrics. Each sample carries
//! the registry descriptor of its flag, and the label tuple that descriptor's
//! shape calls for, with `core` first.

use crate::{
    registry::{self, FieldDescriptor, LabelShape},
    report::{Report, Values},
};

/// Label pairs of one sample, in [`LabelShape::label_names`] order.
pub type Labels = Vec<(&'static str, String)>;

#[derive(Debug, Clone, PartialEq)]
/// One value of one flag with its labels.
pub struct Sample {
    /// The flag this value belongs to.
    pub descriptor: &'static FieldDescriptor,
    /// The value.
    pub value: f64,
    /// Labels, shaped by `descriptor.shape`.
    pub labels: Labels,
}

impl Report {
    /// Flatten this report into samples labelled with `core`, the source
    /// identifier, or `""` for an aggregate.
    ///
    /// General info comes first, then request rates and external apps in
    /// record order. Within a record samples are sorted by flag.
    #[must_use]
    pub fn samples(&self, core: &str) -> Vec<Sample> {
        let mut samples = Vec::new();
        push_samples(
            &mut samples,
            &self.general_info.values,
            LabelShape::Generic,
            &[core],
        );
        for rate in &self.req_rates {
            push_samples(
                &mut samples,
                &rate.values,
                LabelShape::PerHost,
                &[core, rate.hostname.as_str()],
            );
        }
        for app in &self.ext_apps {
            push_samples(
                &mut samples,
                &app.values,
                LabelShape::PerApp,
                &[
                    core,
                    app.service.as_str(),
                    app.hostname.as_str(),
                    app.handler.as_str(),
                ],
            );
        }
        samples
    }
}

fn push_samples(samples: &mut Vec<Sample>, values: &Values, shape: LabelShape, label_values: &[&str]) {
    let mut flags: Vec<&&'static str> = values.keys().collect();
    flags.sort_unstable();
    for flag in flags {
        let Some(descriptor) = registry::describe(flag).filter(|d| d.shape == shape) else {
            continue;
        };
        let labels = shape
            .label_names()
            .iter()
            .zip(label_values)
            .map(|(name, value)| (*name, (*value).to_string()))
            .collect();
        samples.push(Sample {
            descriptor,
            value: values[flag],
            labels,
        });
    }
}
