//! Allele-frequency imputation from a reference panel

use crate::contig::{match_contig, strip_chr};
use crate::locate::{allele_frequency, locate_variant};
use crate::vcf::{VariantFileOpener, VariantSource};
use crate::{Contribution, PrsError, PrsResult, VariantRequest};
use std::fs;
use std::path::{Path, PathBuf};

/// Where reference allele frequencies come from
#[derive(Debug, Clone, PartialEq)]
pub enum ReferencePanel {
    /// One VCF/BCF covering every contig
    Single(PathBuf),
    /// Per-contig files from a `path contig` mapping; contigs stored without `chr`
    Mapping {
        source: PathBuf,
        entries: Vec<(String, PathBuf)>,
    },
}

impl ReferencePanel {
    /// Load a reference source: a `.txt` mapping file or a single VCF/BCF path
    pub fn from_path<P: AsRef<Path>>(path: P) -> PrsResult<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy();

        if name.ends_with(".txt") {
            let content = fs::read_to_string(path).map_err(|e| {
                PrsError::FileAccess(format!("Mapping file {}: {}", path.display(), e))
            })?;
            let entries = parse_reference_mapping(&content)?;
            log::info!(
                "Loaded reference mapping {} with {} entries",
                path.display(),
                entries.len()
            );
            return Ok(ReferencePanel::Mapping {
                source: path.to_path_buf(),
                entries,
            });
        }

        if !looks_like_variant_file(&name) {
            return Err(PrsError::Configuration(format!(
                "Invalid reference {}: provide a .vcf/.bcf file or a .txt mapping",
                path.display()
            )));
        }

        Ok(ReferencePanel::Single(path.to_path_buf()))
    }

    /// Reference file holding a contig; exactly one mapping entry must match
    pub fn resolve(&self, contig: &str) -> PrsResult<PathBuf> {
        match self {
            ReferencePanel::Single(path) => Ok(path.clone()),
            ReferencePanel::Mapping { source, entries } => {
                let key = strip_chr(contig);
                let matches: Vec<&PathBuf> = entries
                    .iter()
                    .filter(|(c, _)| c == key)
                    .map(|(_, p)| p)
                    .collect();
                match matches.as_slice() {
                    [path] => Ok((*path).clone()),
                    [] => Err(PrsError::Configuration(format!(
                        "No reference file for contig {} in {}",
                        contig,
                        source.display()
                    ))),
                    _ => Err(PrsError::Configuration(format!(
                        "Multiple reference files for contig {} in {}",
                        contig,
                        source.display()
                    ))),
                }
            }
        }
    }
}

fn parse_reference_mapping(content: &str) -> PrsResult<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [file, contig] = fields.as_slice() else {
            return Err(PrsError::Format(format!(
                "Reference mapping line {}: expected 'path contig', got '{}'",
                i + 1,
                line
            )));
        };
        entries.push((strip_chr(contig).to_string(), PathBuf::from(file)));
    }
    Ok(entries)
}

/// `.vcf`, `.bcf` and their compressed forms, case-insensitive
fn looks_like_variant_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    [".vcf", ".bcf"].iter().any(|ext| {
        lower
            .match_indices(ext)
            .any(|(i, _)| matches!(lower[i + ext.len()..].chars().next(), None | Some('.')))
    })
}

/// Reference allele frequency oriented to the effect allele
pub fn effect_allele_frequency(
    request: &VariantRequest,
    ref_allele: &str,
    alt_allele: &str,
    af: f64,
) -> PrsResult<f64> {
    if request.effect_allele == ref_allele {
        Ok(1.0 - af)
    } else if request.effect_allele == alt_allele {
        Ok(af)
    } else {
        Err(PrsError::AlleleMismatch {
            effect_allele: request.effect_allele.clone(),
            ref_allele: ref_allele.to_string(),
            alt_allele: alt_allele.to_string(),
        })
    }
}

/// Expected contribution under allele-frequency substitution: `beta * af * (2 - af)`
pub fn imputed_value(beta: f64, af: f64) -> f64 {
    beta * af * (2.0 - af)
}

/// Impute a missing variant from the reference panel; identical for every sample
pub fn impute_contribution<O: VariantFileOpener>(
    opener: &O,
    panel: &ReferencePanel,
    request: &VariantRequest,
    n_samples: usize,
) -> PrsResult<Contribution> {
    let path = panel.resolve(&request.contig)?;
    if !opener.exists(&path) {
        return Err(PrsError::FileAccess(format!(
            "Reference file not found: {}",
            path.display()
        )));
    }

    let mut source = opener.open(&path)?;
    let contig = match_contig(source.contigs(), &request.contig);
    let record = locate_variant(&mut source, &contig, request.position)?
        .record
        .ok_or_else(|| PrsError::NotFound {
            contig: request.contig.clone(),
            position: request.position,
        })?;

    let af = allele_frequency(&record)?;
    let af = effect_allele_frequency(request, &record.ref_allele, &record.alt_allele, af)?;
    let value = imputed_value(request.beta, af);

    log::debug!("Imputed {} with AF {:.4}: {:.6}", request, af, value);

    Ok(Contribution::new(
        format!("{}_imputed", request.label()),
        vec![value; n_samples],
    ))
}
