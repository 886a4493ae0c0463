//! Property-publishing seam.
//!
//! The hub/transport that actually carries property updates is a
//! collaborator, not part of this crate. [`PropertySink`] is the seam: the
//! pipeline declares each property once at startup (name + unit metadata)
//! and then pushes one value per metric per cycle.

use crate::domain::MetricRecord;

pub trait PropertySink: Send {
    /// Announce a property and its unit (`None` = dimensionless).
    fn declare(&mut self, node: &str, property: &str, unit: Option<&str>);

    /// Publish one value.
    fn set_property_value(&mut self, node: &str, property: &str, value: f64);

    /// Publish a whole cycle record.
    fn publish_record(&mut self, node: &str, record: &MetricRecord) {
        for (property, value) in record.iter() {
            self.set_property_value(node, property, value);
        }
    }
}

/// Sink that writes updates to the log; the default for `run --simulate`
/// and handy when bringing a node up before the hub exists.
#[derive(Debug, Default)]
pub struct LogSink;

impl PropertySink for LogSink {
    fn declare(&mut self, node: &str, property: &str, unit: Option<&str>) {
        log::info!("declare {node}/{property} [{}]", unit.unwrap_or("-"));
    }

    fn set_property_value(&mut self, node: &str, property: &str, value: f64) {
        log::info!("{node}/{property} = {value}");
    }
}

/// Sink that records every call, for pipeline tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub declared: Vec<(String, String, Option<String>)>,
    pub published: Vec<(String, String, f64)>,
}

impl PropertySink for RecordingSink {
    fn declare(&mut self, node: &str, property: &str, unit: Option<&str>) {
        self.declared
            .push((node.to_string(), property.to_string(), unit.map(str::to_string)));
    }

    fn set_property_value(&mut self, node: &str, property: &str, value: f64) {
        self.published
            .push((node.to_string(), property.to_string(), value));
    }
}
