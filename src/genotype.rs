//! Genotype decoding into reference-allele dosage

use crate::vcf::GenotypeRecord;
use crate::{GenotypeMode, PrsError, PrsResult};

/// Reference-allele copies for a hard call; anything but a biallelic diploid call is NaN
pub fn gt_dosage(gt: &str) -> f64 {
    match gt.replace('|', "/").as_str() {
        "0/0" => 2.0,
        "1/1" => 0.0,
        "0/1" | "1/0" => 1.0,
        _ => f64::NAN,
    }
}

/// Expected reference-allele copies from a `GP` triple: `2 * P(RR) + P(RA)`.
///
/// A fully missing value (`.`) is NaN. Any other value must hold exactly
/// three numeric probabilities.
pub fn gp_dosage(gp: &str) -> PrsResult<f64> {
    if gp == "." || gp.is_empty() {
        return Ok(f64::NAN);
    }

    let probs = gp
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|_| PrsError::Format(format!("Invalid GP value: {}", gp)))?;

    if probs.len() != 3 {
        return Err(PrsError::Format(format!(
            "Invalid GP format: expected exactly 3 probabilities, got {} in '{}'",
            probs.len(),
            gp
        )));
    }

    Ok(2.0 * probs[0] + probs[1])
}

/// Decode one dosage per sample of the record, in file sample order
pub fn decode_dosage(record: &GenotypeRecord, mode: GenotypeMode) -> PrsResult<Vec<f64>> {
    let index = record.format_index(mode.field()).ok_or_else(|| {
        PrsError::Configuration(format!(
            "FORMAT field {} not present at {}:{}",
            mode.field(),
            record.chrom,
            record.pos
        ))
    })?;

    (0..record.samples.len())
        .map(|sample| match record.sample_field(sample, index) {
            None => Ok(f64::NAN),
            Some(raw) => match mode {
                GenotypeMode::Gt => Ok(gt_dosage(raw)),
                GenotypeMode::Gp => gp_dosage(raw),
            },
        })
        .collect()
}
