//! In-memory variant files for unit tests

use crate::vcf::{GenotypeRecord, VariantFileOpener, VariantSource};
use crate::{PrsError, PrsResult, VariantRequest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn record(line: &str) -> GenotypeRecord {
    GenotypeRecord::from_line(line).unwrap()
}

pub fn request(contig: &str, position: u64, effect_allele: &str, beta: f64) -> VariantRequest {
    VariantRequest::new(contig.to_string(), position, effect_allele.to_string(), beta)
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub samples: Vec<String>,
    pub contigs: Vec<String>,
    pub records: Vec<GenotypeRecord>,
}

impl MemorySource {
    pub fn new(samples: &[&str], lines: &[&str]) -> Self {
        let records: Vec<GenotypeRecord> = lines.iter().map(|l| record(l)).collect();
        let mut contigs: Vec<String> = Vec::new();
        for r in &records {
            if !contigs.contains(&r.chrom) {
                contigs.push(r.chrom.clone());
            }
        }
        Self {
            samples: samples.iter().map(|s| s.to_string()).collect(),
            contigs,
            records,
        }
    }
}

impl VariantSource for MemorySource {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn contigs(&self) -> &[String] {
        &self.contigs
    }

    fn fetch(&mut self, contig: &str, start: u64, stop: u64) -> PrsResult<Vec<GenotypeRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| {
                let begin = r.pos - 1;
                let end = begin + r.ref_allele.len().max(1) as u64;
                r.chrom == contig && begin < stop && end > start
            })
            .cloned()
            .collect())
    }
}

/// Serves `MemorySource`s by path; unknown paths fail like unreadable files
#[derive(Debug, Default)]
pub struct MemoryOpener {
    pub files: HashMap<PathBuf, MemorySource>,
    pub broken: Vec<PathBuf>,
    pub opened: AtomicUsize,
}

impl MemoryOpener {
    pub fn with(mut self, path: &str, source: MemorySource) -> Self {
        self.files.insert(PathBuf::from(path), source);
        self
    }

    pub fn broken(mut self, path: &str) -> Self {
        self.broken.push(PathBuf::from(path));
        self
    }
}

impl VariantFileOpener for MemoryOpener {
    type Source = MemorySource;

    fn open(&self, path: &Path) -> PrsResult<MemorySource> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| PrsError::FileAccess(path.display().to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.broken.iter().any(|p| p == path)
    }
}
