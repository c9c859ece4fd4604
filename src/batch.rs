//! Batch partitioning and per-batch variant processing

use crate::contig::VariantFileMap;
use crate::genotype::decode_dosage;
use crate::impute::impute_contribution;
use crate::locate::locate_variant;
use crate::score::score_genotype;
use crate::vcf::{VariantFileOpener, VariantSource};
use crate::{Contribution, PrsError, PrsResult, SampleSet, ScoreConfig, VariantRequest};
use std::path::{Path, PathBuf};

/// Contiguous slice of the requested variant list handled by one worker
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub requests: Vec<VariantRequest>,
}

/// What a worker hands back to the aggregator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub contributions: Vec<Contribution>,
    pub genotyped: usize,
    pub imputed: usize,
    pub skipped: usize,
}

impl BatchResult {
    /// Result of a batch that produced nothing
    pub fn empty(skipped: usize) -> Self {
        Self {
            skipped,
            ..Self::default()
        }
    }
}

/// Split requests into fixed-size batches, preserving order
pub fn partition(requests: &[VariantRequest], batch_size: usize) -> Vec<Batch> {
    requests
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            requests: chunk.to_vec(),
        })
        .collect()
}

/// Maps a file's sample order onto the run's `SampleSet`
#[derive(Debug, Clone)]
pub struct SampleAlignment {
    indices: Option<Vec<Option<usize>>>,
}

impl SampleAlignment {
    pub fn new(samples: &SampleSet, file_samples: &[String]) -> Self {
        if samples.names() == file_samples {
            return Self { indices: None };
        }
        let indices = samples
            .names()
            .iter()
            .map(|name| file_samples.iter().position(|s| s == name))
            .collect();
        Self {
            indices: Some(indices),
        }
    }

    /// Reorder per-file values into run order; samples absent from the file are NaN
    pub fn align(&self, values: Vec<f64>) -> Vec<f64> {
        match &self.indices {
            None => values,
            Some(indices) => indices
                .iter()
                .map(|i| i.and_then(|i| values.get(i).copied()).unwrap_or(f64::NAN))
                .collect(),
        }
    }
}

struct OpenFile<S> {
    path: PathBuf,
    source: S,
    alignment: SampleAlignment,
}

/// Process every request of a batch in order.
///
/// Requests whose contig has no registered (or existing) variant file are
/// skipped. The file is reopened only when the contig's file changes.
pub fn process_batch<O: VariantFileOpener>(
    opener: &O,
    files: &VariantFileMap,
    samples: &SampleSet,
    config: &ScoreConfig,
    requests: &[VariantRequest],
) -> PrsResult<BatchResult> {
    let mut result = BatchResult::default();
    let mut current: Option<OpenFile<O::Source>> = None;

    for request in requests {
        let Some(path) = resolve_existing(opener, files, &request.contig) else {
            log::warn!(
                "Skipping {}: variant file not found for contig {}",
                request,
                request.contig
            );
            result.skipped += 1;
            continue;
        };

        let reopen = current.as_ref().map_or(true, |open| open.path != path);
        if reopen {
            let source = opener.open(path)?;
            let alignment = SampleAlignment::new(samples, source.samples());
            current = Some(OpenFile {
                path: path.to_path_buf(),
                source,
                alignment,
            });
        }
        let Some(open) = current.as_mut() else {
            continue;
        };

        log::debug!("Processing variant {}", request);
        let located = locate_variant(&mut open.source, &request.contig, request.position)
            .map_err(|e| e.for_request(request))?;

        match located.record {
            Some(record) => {
                let dosage = decode_dosage(&record, config.mode).map_err(|e| e.for_request(request))?;
                let dosage = open.alignment.align(dosage);
                result.contributions.push(score_genotype(
                    request.label(),
                    &dosage,
                    &record.ref_allele,
                    &request.effect_allele,
                    request.beta,
                ));
                result.genotyped += 1;
            }
            None => match &config.reference {
                Some(panel) => {
                    log::info!("Imputing {}", request);
                    let contribution = impute_contribution(opener, panel, request, samples.len())
                        .map_err(|e| e.for_request(request))?;
                    result.contributions.push(contribution);
                    result.imputed += 1;
                }
                None => {
                    log::debug!("Variant {} not genotyped; imputation disabled", request);
                    result.skipped += 1;
                }
            },
        }
    }

    Ok(result)
}

fn resolve_existing<'a, O: VariantFileOpener>(
    opener: &O,
    files: &'a VariantFileMap,
    contig: &str,
) -> Option<&'a Path> {
    files.resolve(contig).filter(|path| opener.exists(path))
}

/// Run one batch, absorbing failures that only invalidate this batch
pub fn run_batch<O: VariantFileOpener>(
    opener: &O,
    files: &VariantFileMap,
    samples: &SampleSet,
    config: &ScoreConfig,
    batch: &Batch,
) -> PrsResult<BatchResult> {
    match process_batch(opener, files, samples, config, &batch.requests) {
        Ok(result) => Ok(result),
        Err(e) if e.is_batch_recoverable() => {
            let contig = batch
                .requests
                .first()
                .map(|r| r.contig.as_str())
                .unwrap_or("?");
            log::error!("Error processing batch {} (contig {}): {}", batch.index, contig, e);
            Ok(BatchResult::empty(batch.requests.len()))
        }
        Err(e) => Err(e),
    }
}
