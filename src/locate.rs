//! Variant lookup and allele-frequency helpers

use crate::vcf::{GenotypeRecord, VariantSource};
use crate::{PrsError, PrsResult};

/// Best record found at a position plus how many exact-position candidates were scored
#[derive(Debug, Clone, Default)]
pub struct Located {
    pub record: Option<GenotypeRecord>,
    pub candidates_examined: usize,
}

/// Alternate allele frequency of a record.
///
/// Uses the `AF` INFO annotation when present, otherwise counts alternate
/// alleles across all called `GT` values.
pub fn allele_frequency(record: &GenotypeRecord) -> PrsResult<f64> {
    if let Some(af) = record.info_value("AF") {
        return af.parse::<f64>().map_err(|_| {
            PrsError::Computation(format!(
                "Invalid AF annotation '{}' at {}:{}",
                af, record.chrom, record.pos
            ))
        });
    }

    let gt_index = record.format_index("GT").ok_or_else(|| {
        PrsError::Computation(format!(
            "No AF annotation and no GT field to compute it at {}:{}",
            record.chrom, record.pos
        ))
    })?;

    let mut alt_count = 0usize;
    let mut total = 0usize;
    for sample in 0..record.samples.len() {
        let Some(gt) = record.sample_field(sample, gt_index) else {
            continue;
        };
        for allele in gt.split(['/', '|']) {
            if let Ok(index) = allele.parse::<u32>() {
                total += 1;
                if index == 1 {
                    alt_count += 1;
                }
            }
        }
    }

    if total == 0 {
        return Err(PrsError::Computation(format!(
            "Unable to calculate AF at {}:{}: no called genotypes",
            record.chrom, record.pos
        )));
    }

    Ok(alt_count as f64 / total as f64)
}

/// Closeness of the allele frequency to 0.5: `min(af, 1 - af)`
pub fn balance_score(af: f64) -> f64 {
    af.min(1.0 - af)
}

/// Pick the most balanced record sitting exactly at a 1-based position
pub fn locate_variant<S: VariantSource + ?Sized>(
    source: &mut S,
    contig: &str,
    position: u64,
) -> PrsResult<Located> {
    if position == 0 {
        return Ok(Located::default());
    }

    let candidates = source.fetch(contig, position - 1, position)?;

    let mut located = Located::default();
    let mut best_score = f64::NEG_INFINITY;

    for candidate in candidates {
        if candidate.pos != position {
            continue;
        }

        located.candidates_examined += 1;
        let score = balance_score(allele_frequency(&candidate)?);
        if score > best_score {
            best_score = score;
            located.record = Some(candidate);
            if best_score == 0.5 {
                break;
            }
        }
    }

    Ok(located)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{record, MemorySource};

    #[test]
    fn test_allele_frequency_from_info() {
        let rec = record("1\t10\t.\tA\tG\t.\tPASS\tDP=4;AF=0.2\tGT\t0/0");
        assert!((allele_frequency(&rec).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_allele_frequency_from_genotypes() {
        let rec = record("1\t10\t.\tA\tG\t.\tPASS\t.\tGT:DP\t0/1:3\t1|1:4\t./.:0\t0/0:2");
        // 3 alternate alleles out of 6 called
        assert!((allele_frequency(&rec).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_allele_frequency_unavailable() {
        let rec = record("1\t10\t.\tA\tG\t.\tPASS\t.");
        assert!(matches!(allele_frequency(&rec), Err(PrsError::Computation(_))));

        let rec = record("1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t./.\t.");
        assert!(matches!(allele_frequency(&rec), Err(PrsError::Computation(_))));
    }

    #[test]
    fn test_balance_score() {
        assert!((balance_score(0.3) - 0.3).abs() < 1e-12);
        assert!((balance_score(0.7) - 0.3).abs() < 1e-12);
        assert_eq!(balance_score(0.5), 0.5);
    }

    #[test]
    fn test_locate_prefers_balanced_and_short_circuits() {
        let mut source = MemorySource::new(
            &["S1"],
            &[
                "1\t100\tfirst\tA\tG\t.\tPASS\tAF=0.3\tGT\t0/0",
                "1\t100\tbalanced\tA\tT\t.\tPASS\tAF=0.5\tGT\t0/0",
                "1\t100\tnever\tA\tC\t.\tPASS\tAF=0.5\tGT\t0/0",
            ],
        );

        let located = locate_variant(&mut source, "1", 100).unwrap();
        assert_eq!(located.record.unwrap().id, "balanced");
        assert_eq!(located.candidates_examined, 2);
    }

    #[test]
    fn test_locate_ties_keep_first_seen() {
        let mut source = MemorySource::new(
            &["S1"],
            &[
                "1\t100\tfirst\tA\tG\t.\tPASS\tAF=0.2\tGT\t0/0",
                "1\t100\tsecond\tA\tT\t.\tPASS\tAF=0.8\tGT\t0/0",
            ],
        );

        let located = locate_variant(&mut source, "1", 100).unwrap();
        assert_eq!(located.record.unwrap().id, "first");
        assert_eq!(located.candidates_examined, 2);
    }

    #[test]
    fn test_locate_ignores_overlapping_records() {
        // a deletion starting at 99 overlaps 100 but does not sit on it
        let mut source = MemorySource::new(
            &["S1"],
            &["1\t99\tdel\tAT\tA\t.\tPASS\tAF=0.5\tGT\t0/1"],
        );

        let located = locate_variant(&mut source, "1", 100).unwrap();
        assert!(located.record.is_none());
        assert_eq!(located.candidates_examined, 0);
    }

    #[test]
    fn test_locate_not_found() {
        let mut source = MemorySource::new(&["S1"], &["1\t100\t.\tA\tG\t.\tPASS\tAF=0.1\tGT\t0/0"]);
        assert!(locate_variant(&mut source, "1", 101).unwrap().record.is_none());
        assert!(locate_variant(&mut source, "2", 100).unwrap().record.is_none());
        assert!(locate_variant(&mut source, "1", 0).unwrap().record.is_none());
    }
}
