//! Variant file access and record parsing

use crate::{PrsError, PrsResult};
use rust_htslib::bcf::{self, Read};
use std::path::Path;

/// A single located variant row with its per-sample raw genotype fields
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: String,
    pub ref_allele: String,
    pub alt_allele: String,
    pub info: String,
    pub format: Vec<String>,
    pub samples: Vec<String>,
}

impl GenotypeRecord {
    /// Parse a tab-separated VCF data line
    pub fn from_line(line: &str) -> PrsResult<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();

        if fields.len() < 8 {
            return Err(PrsError::Format(format!(
                "Invalid VCF line format - not enough columns: {}",
                line
            )));
        }

        let pos = fields[1]
            .parse::<u64>()
            .map_err(|_| PrsError::Format(format!("Invalid position: {}", fields[1])))?;
        let format = match fields.get(8) {
            Some(f) if !f.is_empty() && *f != "." => f.split(':').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        let samples = if fields.len() > 9 {
            fields[9..].iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };

        Ok(GenotypeRecord {
            chrom: fields[0].to_string(),
            pos,
            id: fields[2].to_string(),
            ref_allele: fields[3].to_string(),
            alt_allele: fields[4].to_string(),
            info: fields[7].to_string(),
            format,
            samples,
        })
    }

    /// Index of a FORMAT key, e.g. `GT`
    pub fn format_index(&self, key: &str) -> Option<usize> {
        self.format.iter().position(|f| f == key)
    }

    /// Raw value of one FORMAT key for one sample; trailing fields may be dropped
    pub fn sample_field(&self, sample: usize, key_index: usize) -> Option<&str> {
        self.samples
            .get(sample)
            .and_then(|s| s.split(':').nth(key_index))
    }

    /// First value of an INFO key, e.g. `AF`
    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.info
            .split(';')
            .find_map(|entry| entry.strip_prefix(key)?.strip_prefix('='))
            .map(|value| value.split(',').next().unwrap_or(value))
    }
}

/// Read access to an open variant file
pub trait VariantSource {
    /// Sample names in file order
    fn samples(&self) -> &[String];

    /// Contig names declared in the header
    fn contigs(&self) -> &[String];

    /// Records overlapping the zero-based half-open range `[start, stop)`
    fn fetch(&mut self, contig: &str, start: u64, stop: u64) -> PrsResult<Vec<GenotypeRecord>>;
}

/// Opens variant files on behalf of batch workers
pub trait VariantFileOpener: Send + Sync {
    type Source: VariantSource;

    fn open(&self, path: &Path) -> PrsResult<Self::Source>;

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Indexed VCF/BCF file backed by htslib
pub struct HtsVariantFile {
    reader: bcf::IndexedReader,
    samples: Vec<String>,
    contigs: Vec<String>,
}

impl HtsVariantFile {
    pub fn new<P: AsRef<Path>>(path: P) -> PrsResult<Self> {
        let path = path.as_ref();
        let reader = bcf::IndexedReader::from_path(path).map_err(|e| {
            PrsError::FileAccess(format!("{}: {}", path.display(), e))
        })?;
        let (samples, contigs) = header_names(reader.header());

        Ok(HtsVariantFile {
            reader,
            samples,
            contigs,
        })
    }
}

impl VariantSource for HtsVariantFile {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn contigs(&self) -> &[String] {
        &self.contigs
    }

    fn fetch(&mut self, contig: &str, start: u64, stop: u64) -> PrsResult<Vec<GenotypeRecord>> {
        let rid = match self.reader.header().name2rid(contig.as_bytes()) {
            Ok(rid) => rid,
            Err(_) => {
                log::debug!("Contig {} not present in variant file header", contig);
                return Ok(Vec::new());
            }
        };
        if stop <= start {
            return Ok(Vec::new());
        }

        // htslib takes an inclusive end coordinate
        self.reader.fetch(rid, start, Some(stop - 1))?;

        let mut records = Vec::new();
        for record in self.reader.records() {
            let record = record?;
            let line = record.to_vcf_string()?;
            records.push(GenotypeRecord::from_line(&line)?);
        }

        Ok(records)
    }
}

/// Opens `HtsVariantFile` handles
#[derive(Debug, Clone, Copy, Default)]
pub struct HtsOpener;

impl VariantFileOpener for HtsOpener {
    type Source = HtsVariantFile;

    fn open(&self, path: &Path) -> PrsResult<HtsVariantFile> {
        HtsVariantFile::new(path)
    }
}

fn header_names(header: &bcf::header::HeaderView) -> (Vec<String>, Vec<String>) {
    let samples = header
        .samples()
        .iter()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    let contigs = (0..header.contig_count())
        .filter_map(|rid| header.rid2name(rid).ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();
    (samples, contigs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VCF: &str = "\
##fileformat=VCFv4.2
##contig=<ID=chr1,length=10000>
##contig=<ID=chr2,length=10000>
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3
chr1\t100\trs1\tA\tG\t.\tPASS\tAF=0.3\tGT\t0/0\t0|1\t1/1
chr1\t200\trs2\tC\tT\t.\tPASS\tAF=0.5\tGT\t0/1\t./.\t0/0
chr2\t50\trs3\tG\tA\t.\tPASS\tAF=0.1\tGT\t0/0\t0/0\t0/1
";

    #[test]
    fn test_genotype_record_from_line() {
        let line = "chr1\t100\trs1\tA\tG\t.\tPASS\tDP=30;AF=0.25,0.1\tGT:GP\t0/1:0,1,0\t1/1";
        let record = GenotypeRecord::from_line(line).unwrap();

        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, 100);
        assert_eq!(record.ref_allele, "A");
        assert_eq!(record.alt_allele, "G");
        assert_eq!(record.format, vec!["GT", "GP"]);
        assert_eq!(record.samples.len(), 2);
        assert_eq!(record.info_value("AF"), Some("0.25"));
        assert_eq!(record.info_value("DP"), Some("30"));
        assert_eq!(record.info_value("MAF"), None);
        assert_eq!(record.sample_field(0, 1), Some("0,1,0"));
        assert_eq!(record.sample_field(1, 1), None);
    }

    #[test]
    fn test_genotype_record_sites_only() {
        let record = GenotypeRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\tAF=0.2").unwrap();
        assert!(record.format.is_empty());
        assert!(record.samples.is_empty());
        assert_eq!(record.format_index("GT"), None);
    }

    #[test]
    fn test_genotype_record_invalid() {
        assert!(GenotypeRecord::from_line("chr1\t100\t.\tA").is_err());
        assert!(GenotypeRecord::from_line("chr1\tx\t.\tA\tG\t.\tPASS\t.").is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let result = HtsVariantFile::new("/nonexistent/file.vcf.gz");
        assert!(matches!(result, Err(PrsError::FileAccess(_))));
    }

    #[test]
    fn test_open_unindexed_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", VCF).unwrap();
        temp_file.flush().unwrap();

        let result = HtsOpener.open(temp_file.path());
        assert!(matches!(result, Err(PrsError::FileAccess(_))));
    }

    #[test]
    fn test_indexed_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.vcf.gz");
        {
            let mut writer = rust_htslib::bgzf::Writer::from_path(&path).unwrap();
            writer.write_all(VCF.as_bytes()).unwrap();
            writer.flush().unwrap();
        }
        bcf::index::build(&path, None, 1, bcf::index::Type::Tbx).unwrap();

        let mut file = HtsVariantFile::new(&path).unwrap();
        assert_eq!(file.samples(), &["S1", "S2", "S3"]);
        assert_eq!(file.contigs(), &["chr1", "chr2"]);

        let records = file.fetch("chr1", 99, 100).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pos, 100);
        assert_eq!(records[0].id, "rs1");
        assert_eq!(records[0].samples, vec!["0/0", "0|1", "1/1"]);

        assert!(file.fetch("chr1", 149, 150).unwrap().is_empty());
        assert!(file.fetch("chr9", 99, 100).unwrap().is_empty());
    }
}
