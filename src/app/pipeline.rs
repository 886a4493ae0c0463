//! Shared polling-pipeline logic.
//!
//! One outer tick runs every adapter's measurement cycle and publishes the
//! surviving records. Adapters are independent: cycles run on a rayon
//! parallel iterator, so a slow or faulting instrument is bounded by its own
//! timeout and cannot delay the others; results are joined before anything
//! is published.
//!
//! Fault policy: a failed cycle is logged and publishes nothing — the hub
//! keeps each property's previously published value, which is exactly the
//! "no new data this cycle" semantics the downstream consumers expect.

use std::time::Duration;

use rayon::prelude::*;

use crate::adapter::{CycleFault, Monitor};
use crate::domain::MetricRecord;
use crate::publish::PropertySink;

/// Announce every adapter's properties and units once, at startup.
pub fn declare_all(adapters: &[Box<dyn Monitor>], sink: &mut dyn PropertySink) {
    for adapter in adapters {
        for (property, unit) in adapter.get_units() {
            sink.declare(adapter.name(), property, unit.as_deref());
        }
    }
}

/// Run one measurement cycle per adapter; returns how many records were
/// published.
pub fn run_cycle(adapters: &mut [Box<dyn Monitor>], sink: &mut dyn PropertySink) -> usize {
    let outcomes: Vec<(String, Result<MetricRecord, CycleFault>)> = adapters
        .par_iter_mut()
        .map(|adapter| (adapter.name().to_string(), adapter.get_measured()))
        .collect();

    let mut published = 0;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(record) => {
                sink.publish_record(&name, &record);
                published += 1;
            }
            Err(fault) => log::warn!("{name}: cycle skipped: {fault}"),
        }
    }
    published
}

/// Drive cycles on a fixed cadence; `cycles = None` runs until interrupted.
pub fn run_loop(
    adapters: &mut [Box<dyn Monitor>],
    sink: &mut dyn PropertySink,
    wait: Duration,
    cycles: Option<u64>,
) {
    let mut cycle = 0u64;
    loop {
        let tick = chrono::Utc::now();
        let published = run_cycle(adapters, sink);
        log::debug!(
            "cycle {cycle} at {tick}: {published}/{} records published",
            adapters.len()
        );

        cycle += 1;
        if let Some(max) = cycles {
            if cycle >= max {
                return;
            }
        }
        std::thread::sleep(wait);
    }
}
