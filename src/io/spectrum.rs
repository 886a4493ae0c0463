//! Two-column spectrum file ingest.
//!
//! Reference spectra are stored by the acquisition software as a plain-text,
//! whitespace-delimited `(wavelength, intensity)` table with a fixed-size
//! metadata header and one footer line. This module is responsible for
//! turning such a file into two clean numeric columns.
//!
//! Design goals (matching the rest of the ingest surface):
//! - malformed files surface as load-time faults with line numbers, never as
//!   a silently empty spectrum
//! - no fitting logic here

use std::path::Path;

use crate::error::AppError;

/// Metadata lines before the numeric table in the stored format.
pub const REFERENCE_HEADER_LINES: usize = 14;
/// Trailing non-numeric lines after the table.
pub const REFERENCE_FOOTER_LINES: usize = 1;

/// Load a two-column numeric table, skipping `skip_header` leading and
/// `skip_footer` trailing lines.
///
/// Returns `(wavelengths, intensities)` in file order.
pub fn load_two_column(
    path: &Path,
    skip_header: usize,
    skip_footer: usize,
) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::calibration(format!(
            "Failed to read spectrum file '{}': {e}",
            path.display()
        ))
    })?;

    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= skip_header + skip_footer {
        return Err(AppError::calibration(format!(
            "Spectrum file '{}' has {} lines; expected more than {} (header) + {} (footer).",
            path.display(),
            lines.len(),
            skip_header,
            skip_footer
        )));
    }

    let body = &lines[skip_header..lines.len() - skip_footer];
    let mut wavelengths = Vec::with_capacity(body.len());
    let mut intensities = Vec::with_capacity(body.len());

    for (offset, raw) in body.iter().enumerate() {
        let line_no = skip_header + offset + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(AppError::calibration(format!(
                "Spectrum file '{}', line {line_no}: expected 2 columns, found {}.",
                path.display(),
                fields.len()
            )));
        }
        let w = parse_field(fields[0], path, line_no)?;
        let y = parse_field(fields[1], path, line_no)?;
        wavelengths.push(w);
        intensities.push(y);
    }

    if wavelengths.is_empty() {
        return Err(AppError::calibration(format!(
            "Spectrum file '{}' contains no numeric rows.",
            path.display()
        )));
    }

    Ok((wavelengths, intensities))
}

fn parse_field(raw: &str, path: &Path, line_no: usize) -> Result<f64, AppError> {
    let value: f64 = raw.parse().map_err(|_| {
        AppError::calibration(format!(
            "Spectrum file '{}', line {line_no}: '{raw}' is not a number.",
            path.display()
        ))
    })?;
    if !value.is_finite() {
        return Err(AppError::calibration(format!(
            "Spectrum file '{}', line {line_no}: non-finite value.",
            path.display()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn stored_format(rows: &[(f64, f64)]) -> String {
        let mut out = String::new();
        for i in 0..REFERENCE_HEADER_LINES {
            out.push_str(&format!("# header line {i}\n"));
        }
        for (w, y) in rows {
            out.push_str(&format!("{w:.4}\t{y:.4}\n"));
        }
        out.push_str(">>>>>End Processed Spectral Data<<<<<\n");
        out
    }

    #[test]
    fn loads_stored_format() {
        let dir = tempfile::tempdir().unwrap();
        let rows = [(780.0, 10.0), (781.0, 20.0), (782.0, 15.0)];
        let path = write_file(&dir, "ref.txt", &stored_format(&rows));

        let (w, y) =
            load_two_column(&path, REFERENCE_HEADER_LINES, REFERENCE_FOOTER_LINES).unwrap();
        assert_eq!(w, vec![780.0, 781.0, 782.0]);
        assert_eq!(y, vec![10.0, 20.0, 15.0]);
    }

    #[test]
    fn rejects_non_numeric_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = stored_format(&[(780.0, 10.0)]);
        contents.push_str("not a number here\n");
        let path = write_file(&dir, "bad.txt", &contents);

        // The trailing garbage displaces the real footer into the body, so
        // the loader must reject the now-misplaced non-numeric line.
        let err = load_two_column(&path, REFERENCE_HEADER_LINES, 1).unwrap_err();
        assert!(err.to_string().contains("columns") || err.to_string().contains("number"));
    }

    #[test]
    fn rejects_files_shorter_than_header_plus_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "short.txt", "only\nthree\nlines\n");
        assert!(load_two_column(&path, REFERENCE_HEADER_LINES, REFERENCE_FOOTER_LINES).is_err());
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        assert!(load_two_column(&path, 0, 0).is_err());
    }
}
