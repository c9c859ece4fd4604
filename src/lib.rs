//! # prs-rs - Polygenic Risk Scoring
//!
//! Computes polygenic risk scores for the samples of indexed VCF/BCF files by
//! combining per-variant effect sizes with observed (or allele-frequency
//! imputed) genotype dosage, aggregated across batches of variants.

pub mod batch;
pub mod contig;
pub mod genotype;
pub mod impute;
pub mod locate;
pub mod output;
pub mod pool;
pub mod prs;
pub mod score;
pub mod utils;
pub mod variants;
pub mod vcf;

use impute::ReferencePanel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One row of the requested variant list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRequest {
    pub contig: String,
    pub position: u64,
    pub effect_allele: String,
    pub beta: f64,
    pub group: Option<String>,
}

impl VariantRequest {
    pub fn new(contig: String, position: u64, effect_allele: String, beta: f64) -> Self {
        Self {
            contig,
            position,
            effect_allele,
            beta,
            group: None,
        }
    }

    /// Column label used for this variant's contribution, e.g. `chr1:1234`
    pub fn label(&self) -> String {
        format!("{}:{}", self.contig, self.position)
    }
}

impl fmt::Display for VariantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.contig, self.position, self.effect_allele)
    }
}

/// Ordered, duplicate-free sample identifiers shared by every per-sample series of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    names: Vec<String>,
}

impl SampleSet {
    pub fn new(names: Vec<String>) -> PrsResult<Self> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PrsError::Format(format!("Duplicate sample identifier: {}", name)));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Per-sample contribution of one variant, indexed by the run's `SampleSet`
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub label: String,
    pub values: Vec<f64>,
}

impl Contribution {
    pub fn new(label: String, values: Vec<f64>) -> Self {
        Self { label, values }
    }
}

/// Which FORMAT field genotype dosage is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenotypeMode {
    /// Hard calls (whole-genome sequencing)
    #[default]
    Gt,
    /// Genotype probabilities (imputed arrays)
    Gp,
}

impl GenotypeMode {
    pub fn field(&self) -> &'static str {
        match self {
            GenotypeMode::Gt => "GT",
            GenotypeMode::Gp => "GP",
        }
    }
}

impl FromStr for GenotypeMode {
    type Err = PrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GT" => Ok(GenotypeMode::Gt),
            "GP" => Ok(GenotypeMode::Gp),
            other => Err(PrsError::Configuration(format!(
                "Invalid genotype column '{}'. Must be 'GT' or 'GP'",
                other
            ))),
        }
    }
}

/// Genome build; selects the position column of the variant list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenomeBuild {
    Hg19,
    #[default]
    Hg38,
}

impl GenomeBuild {
    pub fn position_column(&self) -> &'static str {
        match self {
            GenomeBuild::Hg19 => "position_hg19",
            GenomeBuild::Hg38 => "position_hg38",
        }
    }
}

impl FromStr for GenomeBuild {
    type Err = PrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hg19" => Ok(GenomeBuild::Hg19),
            "hg38" => Ok(GenomeBuild::Hg38),
            other => Err(PrsError::Configuration(format!(
                "Invalid genome build '{}'. Must be 'hg19' or 'hg38'",
                other
            ))),
        }
    }
}

/// How per-variant contributions are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Only a running per-sample total is kept
    #[default]
    Streaming,
    /// Every per-variant contribution is kept alongside the total
    Full,
}

/// Validated configuration of one scoring run
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub mode: GenotypeMode,
    pub build: GenomeBuild,
    pub reference: Option<ReferencePanel>,
    pub parallel: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub output_mode: OutputMode,
}

impl ScoreConfig {
    pub fn builder() -> ScoreConfigBuilder {
        ScoreConfigBuilder::default()
    }

    pub fn impute(&self) -> bool {
        self.reference.is_some()
    }
}

/// Builder for `ScoreConfig`; all checks run in `build`
#[derive(Debug, Clone)]
pub struct ScoreConfigBuilder {
    mode: String,
    build: GenomeBuild,
    impute: bool,
    reference: Option<PathBuf>,
    parallel: bool,
    workers: usize,
    batch_size: usize,
    output_mode: OutputMode,
}

impl Default for ScoreConfigBuilder {
    fn default() -> Self {
        Self {
            mode: "GT".to_string(),
            build: GenomeBuild::default(),
            impute: false,
            reference: None,
            parallel: false,
            workers: utils::get_num_cpus(),
            batch_size: 1,
            output_mode: OutputMode::default(),
        }
    }
}

impl ScoreConfigBuilder {
    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = mode.to_string();
        self
    }

    pub fn build_version(mut self, build: GenomeBuild) -> Self {
        self.build = build;
        self
    }

    pub fn impute(mut self, impute: bool, reference: Option<PathBuf>) -> Self {
        self.impute = impute;
        self.reference = reference;
        self
    }

    pub fn parallel(mut self, parallel: bool, workers: usize) -> Self {
        self.parallel = parallel;
        self.workers = workers;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    pub fn build(self) -> PrsResult<ScoreConfig> {
        let mode = self.mode.parse::<GenotypeMode>()?;

        if self.batch_size == 0 {
            return Err(PrsError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.parallel && self.workers == 0 {
            return Err(PrsError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }

        let reference = match (self.impute, self.reference) {
            (true, Some(path)) => Some(ReferencePanel::from_path(&path)?),
            (true, None) => {
                return Err(PrsError::Configuration(
                    "a reference VCF/BCF or mapping file is required when imputation is enabled"
                        .to_string(),
                ))
            }
            (false, _) => None,
        };

        Ok(ScoreConfig {
            mode,
            build: self.build,
            reference,
            parallel: self.parallel,
            workers: self.workers.max(1),
            batch_size: self.batch_size,
            output_mode: self.output_mode,
        })
    }
}

/// Error types for the prs-rs library
#[derive(Debug, thiserror::Error)]
pub enum PrsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Cannot access file: {0}")]
    FileAccess(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Variant {contig}:{position} not found in reference")]
    NotFound { contig: String, position: u64 },

    #[error("Effect allele {effect_allele} matches neither REF {ref_allele} nor ALT {alt_allele}")]
    AlleleMismatch {
        effect_allele: String,
        ref_allele: String,
        alt_allele: String,
    },

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("While scoring {contig}:{position} (effect allele {effect_allele}): {source}")]
    Variant {
        contig: String,
        position: u64,
        effect_allele: String,
        #[source]
        source: Box<PrsError>,
    },

    #[error("Run aborted after {genotyped} genotyped, {imputed} imputed and {skipped} skipped variants: {source}")]
    Aborted {
        genotyped: usize,
        imputed: usize,
        skipped: usize,
        #[source]
        source: Box<PrsError>,
    },
}

impl PrsError {
    /// Wrap an error with the request that triggered it
    pub fn for_request(self, request: &VariantRequest) -> Self {
        PrsError::Variant {
            contig: request.contig.clone(),
            position: request.position,
            effect_allele: request.effect_allele.clone(),
            source: Box::new(self),
        }
    }

    /// Whether a failure inside one batch may be absorbed by dropping that batch
    pub fn is_batch_recoverable(&self) -> bool {
        match self {
            PrsError::Io(_)
            | PrsError::Htslib(_)
            | PrsError::FileAccess(_)
            | PrsError::Computation(_)
            | PrsError::NotFound { .. }
            | PrsError::AlleleMismatch { .. } => true,
            PrsError::Variant { source, .. } => source.is_batch_recoverable(),
            _ => false,
        }
    }
}

pub type PrsResult<T> = Result<T, PrsError>;

#[cfg(test)]
pub(crate) mod test_utils;
