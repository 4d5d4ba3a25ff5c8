//! Taxon sources: multiple-sequence alignments trimmed to
//! parsimony-informative columns.
//!
//! A column is informative when no taxon shows a gap there (anything outside
//! `ACGT` counts as one) and at least two distinct nucleotides each occur at
//! least twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::AlignmentError;
use crate::phylo::item::{NUM_NUCLEOTIDES, Taxon, nucleotide_index};

const CLUSTAL_HEADER: &str = "CLUSTAL";

/// Supplies the taxa a population is seeded from.
pub trait TaxonSource {
    fn load(&self) -> Result<Vec<Arc<Taxon>>, AlignmentError>;
}

/// Taxa already held in memory and already trimmed.
#[derive(Clone, Debug)]
pub struct InMemoryTaxa(pub Vec<Taxon>);

impl TaxonSource for InMemoryTaxa {
    fn load(&self) -> Result<Vec<Arc<Taxon>>, AlignmentError> {
        check_rectangular(&self.0)?;
        Ok(self.0.iter().cloned().map(Arc::new).collect())
    }
}

/// A ClustalW (`.aln`) alignment file.
#[derive(Clone, Debug)]
pub struct ClustalFile {
    path: PathBuf,
}

impl ClustalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaxonSource for ClustalFile {
    fn load(&self) -> Result<Vec<Arc<Taxon>>, AlignmentError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| AlignmentError::Io {
            path: self.path.clone(),
            source,
        })?;
        let taxa = parse_clustal(&text)?;
        let width = taxa.first().map_or(0, Taxon::sites);
        let trimmed = retain_informative_sites(taxa)?;
        debug!(
            path = %self.path.display(),
            taxa = trimmed.len(),
            columns = width,
            informative = trimmed.first().map_or(0, Taxon::sites),
            "loaded alignment"
        );
        Ok(trimmed.into_iter().map(Arc::new).collect())
    }
}

/// Parses interleaved ClustalW text into untrimmed taxa.
///
/// Blank lines, lines opening with whitespace (the conservation track) and
/// the `CLUSTAL` header are skipped. Every other line is a name followed by a
/// sequence chunk, optionally followed by a running residue count. Chunks
/// are concatenated per name; taxa keep first-appearance order.
pub fn parse_clustal(text: &str) -> Result<Vec<Taxon>, AlignmentError> {
    let mut taxa: Vec<Taxon> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty()
            || line.starts_with(char::is_whitespace)
            || line.starts_with(CLUSTAL_HEADER)
        {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let chunk = match tokens.as_slice() {
            [_, chunk] => *chunk,
            [_, chunk, count] if count.bytes().all(|b| b.is_ascii_digit()) => *chunk,
            _ => {
                return Err(AlignmentError::MalformedLine {
                    line: number + 1,
                    content: line.to_string(),
                });
            }
        };
        let name = tokens[0];
        match taxa.iter_mut().find(|t| t.name == name) {
            Some(taxon) => taxon.sequence.push_str(chunk),
            None => taxa.push(Taxon::new(name, chunk)),
        }
    }
    check_rectangular(&taxa)?;
    Ok(taxa)
}

fn check_rectangular(taxa: &[Taxon]) -> Result<(), AlignmentError> {
    let first = taxa.first().ok_or(AlignmentError::NoTaxa)?;
    let expected = first.sites();
    match taxa.iter().find(|t| t.sites() != expected) {
        Some(t) => Err(AlignmentError::RaggedSequence {
            name: t.name.clone(),
            expected,
            found: t.sites(),
        }),
        None => Ok(()),
    }
}

/// Applies the informative-site rule to one column.
pub fn is_informative_site(column: impl IntoIterator<Item = u8>) -> bool {
    let mut counts = [0usize; NUM_NUCLEOTIDES];
    for symbol in column {
        match nucleotide_index(symbol) {
            Some(i) => counts[i] += 1,
            None => return false,
        }
    }
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts[0] >= 2 && counts[1] >= 2
}

/// Indices of the informative columns of a rectangular alignment.
pub fn informative_sites(taxa: &[Taxon]) -> Vec<usize> {
    let width = taxa.first().map_or(0, Taxon::sites);
    (0..width)
        .filter(|&site| is_informative_site(taxa.iter().filter_map(|t| t.symbol(site))))
        .collect()
}

/// Drops every non-informative column from every taxon.
///
/// Fails when the sequences differ in length.
pub fn retain_informative_sites(taxa: Vec<Taxon>) -> Result<Vec<Taxon>, AlignmentError> {
    check_rectangular(&taxa)?;
    let keep = informative_sites(&taxa);
    let trimmed = taxa
        .into_iter()
        .map(|t| {
            let bytes = t.sequence.as_bytes();
            let sequence = keep.iter().map(|&i| bytes[i] as char).collect();
            Taxon {
                name: t.name,
                sequence,
            }
        })
        .collect();
    Ok(trimmed)
}
