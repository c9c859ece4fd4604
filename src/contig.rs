//! Contig naming reconciliation and contig-to-file registry

use crate::{PrsError, PrsResult, VariantRequest};
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which a single variant file covering every contig is registered
pub const ALL_CONTIGS: &str = "all";

pub fn strip_chr(contig: &str) -> &str {
    contig.strip_prefix("chr").unwrap_or(contig)
}

pub fn add_chr(contig: &str) -> String {
    if contig.starts_with("chr") {
        contig.to_string()
    } else {
        format!("chr{}", contig)
    }
}

/// Contig naming convention of a variant file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContigStyle {
    Prefixed,
    Bare,
}

impl ContigStyle {
    pub fn detect(contigs: &[String]) -> Self {
        if contigs.iter().any(|c| c.starts_with("chr")) {
            ContigStyle::Prefixed
        } else {
            ContigStyle::Bare
        }
    }

    pub fn apply(&self, contig: &str) -> String {
        match self {
            ContigStyle::Prefixed => add_chr(contig),
            ContigStyle::Bare => strip_chr(contig).to_string(),
        }
    }
}

/// Rewrite every request's contig to the file's naming convention
pub fn normalize_contigs(requests: &mut [VariantRequest], contigs: &[String]) -> ContigStyle {
    let style = ContigStyle::detect(contigs);
    for request in requests.iter_mut() {
        request.contig = style.apply(&request.contig);
    }
    style
}

/// Name a contig as a particular file spells it, if it spells it at all
pub fn match_contig(contigs: &[String], contig: &str) -> String {
    if contigs.iter().any(|c| c == contig) {
        return contig.to_string();
    }
    let toggled = if contig.starts_with("chr") {
        strip_chr(contig).to_string()
    } else {
        add_chr(contig)
    };
    if contigs.iter().any(|c| *c == toggled) {
        toggled
    } else {
        contig.to_string()
    }
}

/// Variant files registered per contig, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct VariantFileMap {
    entries: Vec<(String, PathBuf)>,
}

impl VariantFileMap {
    /// One file holding every contig
    pub fn single<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            entries: vec![(ALL_CONTIGS.to_string(), path.into())],
        }
    }

    pub fn from_entries(entries: Vec<(String, PathBuf)>) -> PrsResult<Self> {
        if entries.is_empty() {
            return Err(PrsError::Configuration(
                "variant file mapping has no entries".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// A `.txt` file of `contig path` lines (paths relative to the mapping), or a single VCF/BCF
    pub fn from_path<P: AsRef<Path>>(path: P) -> PrsResult<Self> {
        let path = path.as_ref();
        if !path.to_string_lossy().ends_with(".txt") {
            log::info!("Processing a single variant file: {}", path.display());
            return Ok(Self::single(path));
        }

        log::info!("Reading variant file mapping from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| PrsError::FileAccess(format!("{}: {}", path.display(), e)))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let mut entries = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [contig, file] = fields.as_slice() else {
                return Err(PrsError::Format(format!(
                    "Variant file mapping line {}: expected 'contig path', got '{}'",
                    i + 1,
                    line
                )));
            };
            entries.push((contig.to_string(), base.join(file)));
        }

        Self::from_entries(entries)
    }

    /// The first registered file
    pub fn representative(&self) -> &Path {
        &self.entries[0].1
    }

    fn get(&self, key: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(c, _)| c == key)
            .map(|(_, p)| p.as_path())
    }

    /// File for a contig: exact name, `chr`-prefixed, `chr`-stripped, then the wildcard
    pub fn resolve(&self, contig: &str) -> Option<&Path> {
        self.get(contig)
            .or_else(|| self.get(&format!("chr{}", contig)))
            .or_else(|| self.get(strip_chr(contig)))
            .or_else(|| self.get(ALL_CONTIGS))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::request;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn names(contigs: &[&str]) -> Vec<String> {
        contigs.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_normalize_adds_prefix() {
        let mut requests = vec![request("1", 10, "A", 1.0), request("chr2", 20, "G", 1.0)];
        let style = normalize_contigs(&mut requests, &names(&["chr1", "chr2"]));
        assert_eq!(style, ContigStyle::Prefixed);
        assert_eq!(requests[0].contig, "chr1");
        assert_eq!(requests[1].contig, "chr2");
        assert_eq!(requests[0].position, 10);
        assert_eq!(requests[1].effect_allele, "G");
    }

    #[test]
    fn test_normalize_strips_prefix() {
        let mut requests = vec![request("chr1", 10, "A", 1.0), request("X", 20, "G", 1.0)];
        let style = normalize_contigs(&mut requests, &names(&["1", "X"]));
        assert_eq!(style, ContigStyle::Bare);
        assert_eq!(requests[0].contig, "1");
        assert_eq!(requests[1].contig, "X");
    }

    #[test]
    fn test_match_contig() {
        let contigs = names(&["chr1", "2"]);
        assert_eq!(match_contig(&contigs, "chr1"), "chr1");
        assert_eq!(match_contig(&contigs, "1"), "chr1");
        assert_eq!(match_contig(&contigs, "chr2"), "2");
        assert_eq!(match_contig(&contigs, "3"), "3");
    }

    #[test]
    fn test_resolve_priority() {
        let map = VariantFileMap::from_entries(vec![
            ("chr1".to_string(), PathBuf::from("prefixed.bcf")),
            ("1".to_string(), PathBuf::from("bare.bcf")),
            ("2".to_string(), PathBuf::from("two.bcf")),
        ])
        .unwrap();

        assert_eq!(map.resolve("1"), Some(Path::new("bare.bcf")));
        assert_eq!(map.resolve("chr1"), Some(Path::new("prefixed.bcf")));
        assert_eq!(map.resolve("chr2"), Some(Path::new("two.bcf")));
        assert_eq!(map.resolve("3"), None);
        assert_eq!(map.representative(), Path::new("prefixed.bcf"));
    }

    #[test]
    fn test_resolve_wildcard() {
        let map = VariantFileMap::single("all.bcf");
        assert_eq!(map.resolve("chr7"), Some(Path::new("all.bcf")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_mapping_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("files.txt");
        let mut mapping = std::fs::File::create(&mapping_path).unwrap();
        writeln!(mapping, "chr1\tchr1.bcf").unwrap();
        writeln!(mapping, "chr2    /abs/chr2.bcf").unwrap();
        drop(mapping);

        let map = VariantFileMap::from_path(&mapping_path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.representative(), dir.path().join("chr1.bcf"));
        assert_eq!(map.resolve("2"), Some(Path::new("/abs/chr2.bcf")));
    }

    #[test]
    fn test_mapping_empty() {
        let mut mapping = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(mapping, "# nothing here").unwrap();
        mapping.flush().unwrap();
        assert!(matches!(
            VariantFileMap::from_path(mapping.path()),
            Err(PrsError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_file_path() {
        let map = VariantFileMap::from_path("cohort.vcf.gz").unwrap();
        assert_eq!(map.resolve("1"), Some(Path::new("cohort.vcf.gz")));
    }
}
