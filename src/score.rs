//! Per-variant contribution scoring

use crate::Contribution;

/// Combine reference-allele dosage with an effect weight.
///
/// When the effect allele is the reference allele the dosage is used as is,
/// otherwise it is flipped to alternate-allele copies (`2 - dosage`).
/// Unresolvable dosages contribute zero.
pub fn contribution_values(dosage: &[f64], ref_allele: &str, effect_allele: &str, beta: f64) -> Vec<f64> {
    let effect_is_ref = effect_allele == ref_allele;
    dosage
        .iter()
        .map(|&d| {
            let score = if effect_is_ref { beta * d } else { beta * (2.0 - d) };
            if score.is_nan() {
                0.0
            } else {
                score
            }
        })
        .collect()
}

/// Score a located variant into a labelled contribution
pub fn score_genotype(
    label: String,
    dosage: &[f64],
    ref_allele: &str,
    effect_allele: &str,
    beta: f64,
) -> Contribution {
    Contribution::new(label, contribution_values(dosage, ref_allele, effect_allele, beta))
}
