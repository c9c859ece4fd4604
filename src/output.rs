//! Score table output

use crate::prs::ScoreOutput;
use crate::PrsResult;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// How the `<name>_norm` column is scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Observed minimum and maximum of the totals
    Observed,
    /// Fixed population bounds
    Fixed { min: f64, max: f64 },
}

impl Normalization {
    fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Normalization::Observed => None,
            Normalization::Fixed { min, max } => Some((*min, *max)),
        }
    }
}

/// Min-max scaling of totals into `[0, 1]`.
///
/// Fixed bounds are used when given (values outside them fall outside
/// `[0, 1]`), otherwise the observed minimum and maximum. A zero range
/// maps everything to zero.
pub fn min_max_normalize(values: &[f64], bounds: Option<(f64, f64)>) -> Vec<f64> {
    let (min, max) = bounds.unwrap_or_else(|| {
        values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    });
    let range = max - min;

    values
        .iter()
        .map(|v| {
            if range.is_finite() && range != 0.0 {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect()
}

/// Write per-sample scores as CSV indexed by `IID`; gzip when the path ends in `.gz`.
///
/// Full-mode outputs get one column per variant before `<name>_total`.
pub fn write_scores(
    output: &ScoreOutput,
    name: &str,
    normalization: Option<Normalization>,
    output_path: &Path,
) -> PrsResult<()> {
    let file = File::create(output_path)?;
    if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        write_compressed(output, name, normalization, file)?;
    } else {
        let mut csv_writer = csv::Writer::from_writer(file);
        write_rows(&mut csv_writer, output, name, normalization)?;
        csv_writer.flush()?;
    }

    log::info!(
        "Wrote scores for {} samples to {}",
        output.samples.len(),
        output_path.display()
    );
    Ok(())
}

/// Gzip the score table into `inner`, failing if the gzip trailer cannot be written
fn write_compressed<W: Write>(
    output: &ScoreOutput,
    name: &str,
    normalization: Option<Normalization>,
    inner: W,
) -> PrsResult<W> {
    let mut csv_writer = csv::Writer::from_writer(GzEncoder::new(inner, Compression::default()));
    write_rows(&mut csv_writer, output, name, normalization)?;
    let encoder = csv_writer.into_inner().map_err(|e| e.into_error())?;
    Ok(encoder.finish()?)
}

fn write_rows<W: Write>(
    csv_writer: &mut csv::Writer<W>,
    output: &ScoreOutput,
    name: &str,
    normalization: Option<Normalization>,
) -> PrsResult<()> {
    let columns = output.columns().unwrap_or(&[]);
    let total = output.total();
    let normalized = normalization.map(|n| min_max_normalize(&total, n.bounds()));

    let mut header = vec!["IID".to_string()];
    header.extend(columns.iter().map(|c| c.label.clone()));
    header.push(format!("{}_total", name));
    if normalized.is_some() {
        header.push(format!("{}_norm", name));
    }
    csv_writer.write_record(&header)?;

    for (i, sample) in output.samples.names().iter().enumerate() {
        let mut row = Vec::with_capacity(header.len());
        row.push(sample.clone());
        row.extend(columns.iter().map(|c| c.values[i].to_string()));
        row.push(total[i].to_string());
        if let Some(normalized) = &normalized {
            row.push(normalized[i].to_string());
        }
        csv_writer.write_record(&row)?;
    }
    Ok(())
}
