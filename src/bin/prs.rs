//! CLI binary for polygenic risk scoring of VCF/BCF genotypes

use anyhow::Context;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use std::path::PathBuf;
use prs_rs::{
    contig::VariantFileMap,
    output::{write_scores, Normalization},
    prs::{score_variants, RunContext},
    utils::{ensure_parent_dirs, get_num_cpus, log_memory_usage, validate_file_readable, Timer},
    variants::read_variant_list,
    GenomeBuild, OutputMode, PrsError, ScoreConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Column {
    #[value(name = "GT")]
    Gt,
    #[value(name = "GP")]
    Gp,
}

impl Column {
    fn as_str(&self) -> &'static str {
        match self {
            Column::Gt => "GT",
            Column::Gp => "GP",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Build {
    Hg19,
    Hg38,
}

impl From<Build> for GenomeBuild {
    fn from(build: Build) -> Self {
        match build {
            Build::Hg19 => GenomeBuild::Hg19,
            Build::Hg38 => GenomeBuild::Hg38,
        }
    }
}

#[derive(Parser)]
#[command(name = "prs")]
#[command(about = "Polygenic risk scoring from indexed VCF/BCF genotypes")]
#[command(long_about = "
Computes a polygenic risk score for every sample of an indexed VCF/BCF file
(or a set of per-contig files) from a list of weighted variants.

For each variant the record at the exact position is located, its genotype is
converted to effect-allele dosage (GT hard calls or GP probabilities) and
multiplied by the variant's beta. Variants absent from the genotype files can
be imputed from a reference panel's allele frequency with --impute.

The variant list is a tab-separated file (comma-separated for .csv, optionally
gzipped) with the columns contig_id, position_hg38/position_hg19 (or position),
effect_allele and beta.

The output is a CSV indexed by IID with a <name>_total column, preceded by one
column per variant with --full.
")]
struct Args {
    /// Indexed VCF/BCF file, or a .txt file mapping contigs to files
    #[arg(long, value_name = "FILE")]
    vcf: PathBuf,

    /// Variant list with effect alleles and weights
    #[arg(long, value_name = "FILE")]
    variants: PathBuf,

    /// Genotype column to score (GT=WGS, GP=imputed array)
    #[arg(long, value_enum, default_value = "GT")]
    col: Column,

    /// Genome build of the variant positions
    #[arg(long, value_enum, default_value = "hg38")]
    build: Build,

    /// Impute variants missing from the genotypes from reference allele frequencies
    #[arg(long, requires = "ref_vcf")]
    impute: bool,

    /// Reference VCF/BCF, or a .txt file mapping files to contigs
    #[arg(long, value_name = "FILE")]
    ref_vcf: Option<PathBuf>,

    /// Process batches in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of parallel workers
    #[arg(long, default_value_t = get_num_cpus())]
    ntasks: usize,

    /// Number of variants per batch
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Keep every per-variant contribution in the output
    #[arg(long)]
    full: bool,

    /// Name used for the score columns
    #[arg(long, default_value = "prs")]
    name: String,

    /// Add a min-max normalized column (observed bounds unless --norm-min/--norm-max)
    #[arg(long)]
    norm: bool,

    /// Fixed lower bound for normalization
    #[arg(long, requires_all = ["norm", "norm_max"])]
    norm_min: Option<f64>,

    /// Fixed upper bound for normalization
    #[arg(long, requires_all = ["norm", "norm_min"])]
    norm_max: Option<f64>,

    /// Path to the output CSV file (.gz to compress)
    #[arg(long, value_name = "FILE", default_value = "results.csv")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of output file if it exists
    #[arg(short, long)]
    force: bool,
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting PRS scoring");
    log::info!("Genotypes: {:?}", args.vcf);
    log::info!("Variant list: {:?}", args.variants);
    log::info!("Output: {:?}", args.output);

    validate_file_readable(&args.vcf)?;
    validate_file_readable(&args.variants)?;

    if args.output.exists() && !args.force {
        return Err(PrsError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Output file {:?} already exists. Use --force to overwrite.", args.output),
        ))
        .into());
    }
    ensure_parent_dirs(&args.output)?;

    let config = ScoreConfig::builder()
        .mode(args.col.as_str())
        .build_version(args.build.into())
        .impute(args.impute, args.ref_vcf.clone())
        .parallel(args.parallel, args.ntasks)
        .batch_size(args.batch_size)
        .output_mode(if args.full {
            OutputMode::Full
        } else {
            OutputMode::Streaming
        })
        .build()?;
    log::info!(
        "Configuration: col={}, build={:?}, impute={}, parallel={} ({} workers), batch size={}",
        config.mode.field(),
        config.build,
        config.impute(),
        config.parallel,
        config.workers,
        config.batch_size
    );

    let files = VariantFileMap::from_path(&args.vcf)?;
    let requests = read_variant_list(&args.variants, config.build)?;
    if requests.is_empty() {
        log::warn!("No variants found in {:?}", args.variants);
    }

    let mut ctx = RunContext::new(&args.name);
    let output = {
        let _timer = Timer::new("Scoring variants");
        score_variants(&config, &files, requests, &mut ctx)?
    };
    log_memory_usage("after scoring");

    let normalization = match (args.norm, args.norm_min, args.norm_max) {
        (false, _, _) => None,
        (true, Some(min), Some(max)) => Some(Normalization::Fixed { min, max }),
        (true, _, _) => Some(Normalization::Observed),
    };
    if normalization.is_some() && !config.impute() {
        log::warn!("Normalizing without imputation; totals of samples with missing variants are not comparable");
    }

    write_scores(&output, &args.name, normalization, &args.output)
        .with_context(|| format!("writing scores to {:?}", args.output))?;

    log::info!(
        "Scored {} samples: {} genotyped, {} imputed, {} skipped variants",
        output.samples.len(),
        output.genotyped,
        output.imputed,
        output.skipped
    );

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: anyhow::Error) -> ! {
    let Some(prs_error) = error.downcast_ref::<PrsError>() else {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    };

    let root = match prs_error {
        PrsError::Aborted {
            genotyped,
            imputed,
            skipped,
            source,
        } => {
            eprintln!(
                "Run aborted after {} genotyped, {} imputed and {} skipped variants.",
                genotyped, imputed, skipped
            );
            source.as_ref()
        }
        other => other,
    };

    match root {
        PrsError::Variant {
            contig,
            position,
            effect_allele,
            source,
        } => {
            eprintln!("Error: {}", source);
            eprintln!(
                "Offending variant: {}:{} (effect allele {})",
                contig, position, effect_allele
            );
        }
        PrsError::Configuration(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check --col, --impute/--ref-vcf, --ntasks and --batch-size.");
        }
        PrsError::FileAccess(msg) => {
            eprintln!("Error: Cannot access file: {}", msg);
            eprintln!("Please check that the file exists, is readable and is indexed (.csi/.tbi).");
        }
        PrsError::Format(msg) => {
            eprintln!("Error: Invalid input format: {}", msg);
        }
        PrsError::Htslib(e) => {
            eprintln!("Error: VCF/BCF processing error: {}", e);
            eprintln!("Please check that your variant files are valid and indexed.");
        }
        PrsError::Io(e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        other => {
            eprintln!("Error: {}", other);
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["prs", "--vcf", "a.bcf", "--variants", "v.tsv"]).unwrap();
        assert_eq!(args.col.as_str(), "GT");
        assert!(matches!(args.build, Build::Hg38));
        assert_eq!(args.batch_size, 1);
        assert!(!args.full);
        assert_eq!(args.output, PathBuf::from("results.csv"));
    }

    #[test]
    fn test_cli_impute_requires_reference() {
        let result = Args::try_parse_from(["prs", "--vcf", "a.bcf", "--variants", "v.tsv", "--impute"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "prs", "--vcf", "a.bcf", "--variants", "v.tsv", "--impute", "--ref-vcf", "ref.vcf.gz",
            "--col", "GP", "--build", "hg19",
        ])
        .unwrap();
        assert!(args.impute);
        assert_eq!(args.col.as_str(), "GP");
        assert!(matches!(args.build, Build::Hg19));
    }

    #[test]
    fn test_cli_rejects_unknown_column() {
        let result = Args::try_parse_from(["prs", "--vcf", "a.bcf", "--variants", "v.tsv", "--col", "DS"]);
        assert!(result.is_err());
    }
}
