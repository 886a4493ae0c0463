//! Result assembly and formatting.
//!
//! We keep metric assembly and terminal formatting in one place so:
//! - the fit/adapter code stays clean and testable
//! - output changes are localized

use crate::domain::{ier_is_success, MetricRecord, PulseFit};
use crate::error::AppError;

/// Map an internal field name onto the external property namespace.
///
/// The property hub uses `-` as its word separator; this is a pure renaming
/// step with no semantic effect.
pub fn property_name(field: &str) -> String {
    field.replace('_', "-")
}

/// Combine a live fit with the reference baseline into the final record.
///
/// Every fit field except `ier` gains a `relative-<field>` companion equal
/// to `fit.<field> / reference.<field>`. The reference denominators are
/// validated at calibration time, but a zero slipping through must surface
/// as a fault rather than a silent `inf` in the published record.
pub fn assemble(fit: &PulseFit, reference: &PulseFit) -> Result<MetricRecord, AppError> {
    let mut record = MetricRecord::new();

    for (name, value) in fit.fields() {
        record.insert(property_name(name), value);
    }
    record.insert("ier", fit.ier as f64);

    for ((name, value), (_, denom)) in fit.fields().into_iter().zip(reference.fields()) {
        if !denom.is_finite() || denom == 0.0 {
            return Err(AppError::runtime(format!(
                "Reference '{name}' is {denom}; cannot compute relative metrics."
            )));
        }
        record.insert(format!("relative-{}", property_name(name)), value / denom);
    }

    Ok(record)
}

/// Render a record for terminal output, one aligned `name value` row per
/// metric.
pub fn format_record(record: &MetricRecord) -> String {
    let width = record
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (name, value) in record.iter() {
        if name == "ier" {
            out.push_str(&format!("{name:width$}  {}\n", value as i64));
        } else {
            out.push_str(&format!("{name:width$}  {value:.6e}\n"));
        }
    }
    out
}

/// Render a standalone fit (no reference available) for terminal output.
pub fn format_fit(fit: &PulseFit) -> String {
    let mut record = MetricRecord::new();
    for (name, value) in fit.fields() {
        record.insert(property_name(name), value);
    }
    record.insert("ier", fit.ier as f64);
    let convergence = if ier_is_success(fit.ier) {
        "converged"
    } else {
        "did not converge"
    };
    format!("{}fit {convergence} (ier = {})\n", format_record(&record), fit.ier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit() -> PulseFit {
        PulseFit {
            mu: 13000.0,
            fwhm: 705.0,
            amp: 0.04,
            area: 6.4,
            rms: 0.002,
            ier: 1,
        }
    }

    fn reference() -> PulseFit {
        PulseFit {
            mu: 12800.0,
            fwhm: 730.0,
            amp: 0.036,
            area: 5.0,
            rms: 0.001,
            ier: 2,
        }
    }

    #[test]
    fn relative_metrics_are_exact_ratios() {
        let fit = fit();
        let reference = reference();
        let record = assemble(&fit, &reference).unwrap();

        assert_eq!(record.get("relative-mu").unwrap(), fit.mu / reference.mu);
        assert_eq!(
            record.get("relative-fwhm").unwrap(),
            fit.fwhm / reference.fwhm
        );
        assert_eq!(record.get("relative-amp").unwrap(), fit.amp / reference.amp);
        assert_eq!(
            record.get("relative-area").unwrap(),
            fit.area / reference.area
        );
        assert_eq!(record.get("relative-rms").unwrap(), fit.rms / reference.rms);
    }

    #[test]
    fn ier_is_published_but_never_relative() {
        let record = assemble(&fit(), &reference()).unwrap();
        assert_eq!(record.get("ier"), Some(1.0));
        assert_eq!(record.get("relative-ier"), None);
        assert_eq!(record.len(), 11);
    }

    #[test]
    fn absolute_fields_are_copied_through() {
        let fit = fit();
        let record = assemble(&fit, &reference()).unwrap();
        assert_eq!(record.get("mu"), Some(fit.mu));
        assert_eq!(record.get("fwhm"), Some(fit.fwhm));
        assert_eq!(record.get("amp"), Some(fit.amp));
        assert_eq!(record.get("area"), Some(fit.area));
        assert_eq!(record.get("rms"), Some(fit.rms));
    }

    #[test]
    fn zero_reference_denominator_is_a_fault() {
        let mut reference = reference();
        reference.area = 0.0;
        assert!(assemble(&fit(), &reference).is_err());
    }

    #[test]
    fn property_names_use_hyphens() {
        assert_eq!(property_name("diode_temperature"), "diode-temperature");
        assert_eq!(property_name("mu"), "mu");
    }

    #[test]
    fn formatted_record_prints_every_metric() {
        let record = assemble(&fit(), &reference()).unwrap();
        let text = format_record(&record);
        for (name, _) in record.iter() {
            assert!(text.contains(name), "missing {name}");
        }
    }
}
