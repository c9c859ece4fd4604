//! Variant list loading

use crate::utils::is_gzipped;
use crate::{GenomeBuild, PrsError, PrsResult, VariantRequest};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Column indices of a variant list header
#[derive(Debug, Clone)]
pub struct VariantListColumns {
    pub contig: usize,
    pub position: usize,
    pub effect_allele: usize,
    pub beta: usize,
    pub group: Option<usize>,
}

impl VariantListColumns {
    pub fn from_header(header: &csv::StringRecord, build: GenomeBuild) -> PrsResult<Self> {
        let find = |name: &str| header.iter().position(|col| col.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                PrsError::Format(format!("{} column not found in variant list header", name))
            })
        };

        let position = find(build.position_column())
            .or_else(|| find("position"))
            .ok_or_else(|| {
                PrsError::Format(format!(
                    "neither {} nor position column found in variant list header",
                    build.position_column()
                ))
            })?;

        Ok(VariantListColumns {
            contig: require("contig_id")?,
            position,
            effect_allele: require("effect_allele")?,
            beta: require("beta")?,
            group: find("group").or_else(|| find("tag")),
        })
    }
}

/// Parse delimited variant list rows from any reader
pub fn parse_variant_list<R: Read>(
    reader: R,
    delimiter: u8,
    build: GenomeBuild,
) -> PrsResult<Vec<VariantRequest>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let columns = VariantListColumns::from_header(csv_reader.headers()?, build)?;
    let mut requests = Vec::new();

    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i + 2;
        let field = |index: usize| {
            record.get(index).map(str::trim).ok_or_else(|| {
                PrsError::Format(format!("Variant list line {}: missing column {}", line, index + 1))
            })
        };

        let position = field(columns.position)?;
        let position = position.parse::<u64>().map_err(|_| {
            PrsError::Format(format!("Variant list line {}: invalid position '{}'", line, position))
        })?;
        let beta = field(columns.beta)?;
        let beta = beta.parse::<f64>().map_err(|_| {
            PrsError::Format(format!("Variant list line {}: invalid beta '{}'", line, beta))
        })?;

        requests.push(VariantRequest {
            contig: field(columns.contig)?.to_string(),
            position,
            effect_allele: field(columns.effect_allele)?.to_string(),
            beta,
            group: columns
                .group
                .and_then(|g| record.get(g))
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
        });
    }

    Ok(requests)
}

/// Read a variant list: tab-separated (comma for `.csv`), optionally gzipped
pub fn read_variant_list<P: AsRef<Path>>(path: P, build: GenomeBuild) -> PrsResult<Vec<VariantRequest>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| PrsError::FileAccess(format!("{}: {}", path.display(), e)))?;

    let reader: Box<dyn Read> = if is_gzipped(path)? {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let name = path.to_string_lossy().to_lowercase();
    let delimiter = if name.ends_with(".csv") || name.ends_with(".csv.gz") {
        b','
    } else {
        b'\t'
    };

    let requests = parse_variant_list(BufReader::new(reader), delimiter, build)?;
    log::info!("Read {} variants from {}", requests.len(), path.display());
    Ok(requests)
}
