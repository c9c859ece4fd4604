//! Scoring run orchestration and aggregation

use crate::batch::{partition, run_batch, Batch, BatchResult};
use crate::contig::{normalize_contigs, VariantFileMap};
use crate::pool::WorkerPool;
use crate::utils::{log_progress, Timer};
use crate::vcf::{HtsOpener, VariantFileOpener, VariantSource};
use crate::{Contribution, OutputMode, PrsError, PrsResult, SampleSet, ScoreConfig, VariantRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-scoped logging label and variant counters
#[derive(Debug, Clone)]
pub struct RunContext {
    label: String,
    pub genotyped: usize,
    pub imputed: usize,
    pub skipped: usize,
    pub batches_done: usize,
}

impl RunContext {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            genotyped: 0,
            imputed: 0,
            skipped: 0,
            batches_done: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn absorb(&mut self, result: &BatchResult) {
        self.genotyped += result.genotyped;
        self.imputed += result.imputed;
        self.skipped += result.skipped;
        self.batches_done += 1;
    }

    /// Wrap a fatal error with the counts accumulated so far
    pub fn abort(&self, error: PrsError) -> PrsError {
        log::error!("[{}] Run aborted: {}", self.label, error);
        PrsError::Aborted {
            genotyped: self.genotyped,
            imputed: self.imputed,
            skipped: self.skipped,
            source: Box::new(error),
        }
    }
}

/// Per-sample accumulator for streaming aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct RunningTotal {
    values: Vec<f64>,
}

impl RunningTotal {
    pub fn new(n_samples: usize) -> Self {
        Self {
            values: vec![0.0; n_samples],
        }
    }

    /// Add a contribution; missing or NaN entries count as zero
    pub fn add(&mut self, contribution: &Contribution) {
        for (total, value) in self.values.iter_mut().zip(&contribution.values) {
            if !value.is_nan() {
                *total += value;
            }
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Every per-variant contribution, in request order
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    pub columns: Vec<Contribution>,
}

impl ScoreMatrix {
    /// Row-wise sum over all variant columns
    pub fn total(&self, n_samples: usize) -> Vec<f64> {
        let mut total = RunningTotal::new(n_samples);
        for column in &self.columns {
            total.add(column);
        }
        total.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    Total(RunningTotal),
    Full(ScoreMatrix),
}

/// Outcome of a scoring run
#[derive(Debug, Clone)]
pub struct ScoreOutput {
    pub samples: SampleSet,
    pub genotyped: usize,
    pub imputed: usize,
    pub skipped: usize,
    pub scores: Scores,
}

impl ScoreOutput {
    /// Per-sample total score in `samples` order
    pub fn total(&self) -> Vec<f64> {
        match &self.scores {
            Scores::Total(total) => total.values().to_vec(),
            Scores::Full(matrix) => matrix.total(self.samples.len()),
        }
    }

    pub fn columns(&self) -> Option<&[Contribution]> {
        match &self.scores {
            Scores::Total(_) => None,
            Scores::Full(matrix) => Some(&matrix.columns),
        }
    }
}

struct Aggregator {
    mode: OutputMode,
    total: RunningTotal,
    slots: Vec<Option<Vec<Contribution>>>,
}

impl Aggregator {
    fn new(mode: OutputMode, n_samples: usize, n_batches: usize) -> Self {
        let slots = match mode {
            OutputMode::Streaming => Vec::new(),
            OutputMode::Full => vec![None; n_batches],
        };
        Self {
            mode,
            total: RunningTotal::new(n_samples),
            slots,
        }
    }

    fn fold(&mut self, index: usize, result: BatchResult) {
        match self.mode {
            OutputMode::Streaming => {
                for contribution in &result.contributions {
                    self.total.add(contribution);
                }
            }
            OutputMode::Full => self.slots[index] = Some(result.contributions),
        }
    }

    fn finish(self) -> Scores {
        match self.mode {
            OutputMode::Streaming => Scores::Total(self.total),
            OutputMode::Full => Scores::Full(ScoreMatrix {
                columns: self.slots.into_iter().flatten().flatten().collect(),
            }),
        }
    }
}

/// Read-only state handed to every batch task; the abort flag is the only shared write
struct Shared<O> {
    opener: Arc<O>,
    files: VariantFileMap,
    samples: SampleSet,
    config: ScoreConfig,
    abort: AtomicBool,
}

impl<O: VariantFileOpener> Shared<O> {
    fn work(&self, batch: &Batch) -> PrsResult<BatchResult> {
        if self.abort.load(Ordering::Relaxed) {
            return Ok(BatchResult::empty(batch.requests.len()));
        }
        run_batch(
            self.opener.as_ref(),
            &self.files,
            &self.samples,
            &self.config,
            batch,
        )
    }
}

/// Score a variant list against htslib-readable variant files
pub fn score_variants(
    config: &ScoreConfig,
    files: &VariantFileMap,
    requests: Vec<VariantRequest>,
    ctx: &mut RunContext,
) -> PrsResult<ScoreOutput> {
    score_variants_with(Arc::new(HtsOpener), config, files, requests, ctx)
}

/// Score a variant list, opening variant files through `opener`
pub fn score_variants_with<O>(
    opener: Arc<O>,
    config: &ScoreConfig,
    files: &VariantFileMap,
    mut requests: Vec<VariantRequest>,
    ctx: &mut RunContext,
) -> PrsResult<ScoreOutput>
where
    O: VariantFileOpener + 'static,
{
    log::info!("[{}] Starting PRS scoring of {} variants", ctx.label(), requests.len());

    let representative = files.representative();
    let source = opener.open(representative).map_err(|e| match e {
        PrsError::FileAccess(_) => e,
        other => PrsError::FileAccess(format!("{}: {}", representative.display(), other)),
    })?;
    let samples = SampleSet::new(source.samples().to_vec())?;
    let style = normalize_contigs(&mut requests, source.contigs());
    drop(source);
    log::info!(
        "[{}] {} samples; variant contigs normalized to {:?} naming",
        ctx.label(),
        samples.len(),
        style
    );

    let batches = partition(&requests, config.batch_size);
    let n_batches = batches.len();
    let mut aggregator = Aggregator::new(config.output_mode, samples.len(), n_batches);

    let shared = Arc::new(Shared {
        opener,
        files: files.clone(),
        samples: samples.clone(),
        config: config.clone(),
        abort: AtomicBool::new(false),
    });

    let _timer = Timer::new("Scoring batches");
    if config.parallel {
        let pool = WorkerPool::new(config.workers)?;
        log::info!(
            "[{}] Dispatching {} batches to {} workers",
            ctx.label(),
            n_batches,
            pool.workers()
        );
        let worker = Arc::clone(&shared);
        let collected = pool.run(
            batches,
            move |batch: Batch| worker.work(&batch),
            |index, result| {
                let result = result.map_err(|e| {
                    shared.abort.store(true, Ordering::Relaxed);
                    e
                })?;
                ctx.absorb(&result);
                aggregator.fold(index, result);
                log_progress(ctx.batches_done, n_batches, "Batches scored");
                Ok(())
            },
        );
        collected.map_err(|e| ctx.abort(e))?;
    } else {
        for batch in &batches {
            let result = shared.work(batch).map_err(|e| ctx.abort(e))?;
            ctx.absorb(&result);
            aggregator.fold(batch.index, result);
            log_progress(ctx.batches_done, n_batches, "Batches scored");
        }
    }

    log::info!(
        "[{}] Completed with {} genotyped, {} imputed and {} skipped variants",
        ctx.label(),
        ctx.genotyped,
        ctx.imputed,
        ctx.skipped
    );

    Ok(ScoreOutput {
        samples,
        genotyped: ctx.genotyped,
        imputed: ctx.imputed,
        skipped: ctx.skipped,
        scores: aggregator.finish(),
    })
}
