//! Corpus index: the embedding matrix paired with its metadata records.
//!
//! The index is loaded once from the artifacts written by the corpus
//! pipeline and is read-only afterwards. Row `i` of the matrix and record `i`
//! of the metadata describe the same paper; that pairing is checked when the
//! index is built and can never be reordered independently, because the
//! index exposes no mutation at all.
//!
//! # Artifacts
//!
//! | File | Content |
//! |---|---|
//! | `embeddings.npy` | N x D float matrix, row order = corpus order |
//! | `metadata.json` | JSON array of N [`PaperRecord`]s |
//! | `manifest.json` | optional [`CorpusManifest`] pinning the model identity |

pub mod metadata;
pub mod npy;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{CorpusManifest, PaperRecord};

/// Default directory holding the corpus artifacts.
pub const DEFAULT_DATA_DIR: &str = "data/processed";

/// Violations of the record/row alignment of a corpus.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusIntegrityError {
    /// Metadata and matrix disagree on the number of papers
    #[error("metadata has {records} records but the embedding matrix has {rows} rows")]
    LengthMismatch { records: usize, rows: usize },

    /// The manifest was written for a corpus of a different size
    #[error("manifest declares {expected} papers but the corpus has {actual}")]
    ManifestCountMismatch { expected: usize, actual: usize },

    /// The manifest was written for vectors of a different dimension
    #[error("manifest declares dimension {expected} but the embedding matrix has {actual}")]
    ManifestDimensionMismatch { expected: usize, actual: usize },
}

/// Errors that can occur while loading or saving a corpus.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Reading or writing an artifact failed
    #[error("I/O error: {0}")]
    IoError(String),

    /// The embedding matrix file is malformed
    #[error("Malformed embedding matrix: {0}")]
    MatrixFormatError(String),

    /// The metadata file is malformed
    #[error("Malformed metadata: {0}")]
    MetadataFormatError(String),

    /// A metadata record is missing required data
    #[error("Invalid metadata record: {0}")]
    InvalidRecord(String),

    /// Matrix and metadata do not describe the same corpus
    #[error("Corpus integrity error: {0}")]
    Integrity(#[from] CorpusIntegrityError),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Dense row-major N x D matrix of f32.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    /// Returns `IndexError::MatrixFormatError` if `data` does not hold exactly
    /// `rows * dim` values.
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> IndexResult<Self> {
        if rows.checked_mul(dim) != Some(data.len()) {
            return Err(IndexError::MatrixFormatError(format!(
                "{} values cannot form a {} x {} matrix",
                data.len(),
                rows,
                dim
            )));
        }
        Ok(Self { rows, dim, data })
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> IndexResult<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        let count = rows.len();
        let mut data = Vec::with_capacity(count * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(IndexError::MatrixFormatError(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    dim
                )));
            }
            data.extend(row);
        }
        Self::new(count, dim, data)
    }

    /// A matrix with no rows.
    pub fn empty() -> Self {
        Self {
            rows: 0,
            dim: 0,
            data: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row `i`. Panics if `i >= rows()`.
    pub fn row(&self, i: usize) -> &[f32] {
        assert!(i < self.rows, "row {} out of range for {} rows", i, self.rows);
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Locations of the corpus artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub embeddings: PathBuf,
    pub metadata: PathBuf,
    pub manifest: PathBuf,
}

impl CorpusPaths {
    /// Standard artifact names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            embeddings: dir.join("embeddings.npy"),
            metadata: dir.join("metadata.json"),
            manifest: dir.join("manifest.json"),
        }
    }
}

impl Default for CorpusPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}

/// Immutable, aligned pairing of metadata records with embedding rows.
///
/// Built once at startup and shared by reference with every query.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    records: Vec<PaperRecord>,
    matrix: EmbeddingMatrix,
}

impl CorpusIndex {
    /// Pair a matrix with its metadata records.
    ///
    /// # Errors
    /// Returns `CorpusIntegrityError::LengthMismatch` if the number of
    /// records differs from the number of matrix rows.
    pub fn new(matrix: EmbeddingMatrix, records: Vec<PaperRecord>) -> Result<Self, CorpusIntegrityError> {
        if records.len() != matrix.rows() {
            return Err(CorpusIntegrityError::LengthMismatch {
                records: records.len(),
                rows: matrix.rows(),
            });
        }
        Ok(Self { records, matrix })
    }

    /// An index with no papers.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            matrix: EmbeddingMatrix::empty(),
        }
    }

    /// Load and verify the corpus artifacts.
    ///
    /// The manifest is optional; when present its count and dimension must
    /// agree with the loaded matrix. Returns the manifest alongside the index
    /// so callers can check the model identity.
    ///
    /// # Arguments
    /// * `paths` - Locations of the matrix, metadata and manifest files
    ///
    /// # Returns
    /// The verified index and the manifest, if one was found
    ///
    /// # Errors
    /// Returns `IndexError::IoError` for an unreadable artifact,
    /// `IndexError::MatrixFormatError` or `IndexError::MetadataFormatError` for
    /// a malformed one, `IndexError::InvalidRecord` for a record without a
    /// paper id, and `IndexError::Integrity` when the artifacts disagree.
    pub fn load(paths: &CorpusPaths) -> IndexResult<(Self, Option<CorpusManifest>)> {
        info!(path = %paths.embeddings.display(), "Loading embedding matrix");
        let matrix = npy::read_matrix(&paths.embeddings)?;
        debug!(rows = matrix.rows(), dim = matrix.dim(), "Embedding matrix loaded");

        info!(path = %paths.metadata.display(), "Loading metadata");
        let records = metadata::read_records(&paths.metadata)?;

        let manifest = read_manifest(&paths.manifest)?;
        let index = Self::new(matrix, records)?;

        match &manifest {
            Some(manifest) => index.verify_manifest(manifest)?,
            None => warn!(
                path = %paths.manifest.display(),
                "No corpus manifest found; embedding model identity cannot be checked"
            ),
        }

        info!(papers = index.len(), dimension = index.dimension(), "Corpus index ready");
        Ok((index, manifest))
    }

    /// Write the corpus artifacts, creating the parent directories.
    pub fn save(&self, paths: &CorpusPaths, manifest: &CorpusManifest) -> IndexResult<()> {
        self.verify_manifest(manifest)?;

        for path in [&paths.embeddings, &paths.metadata, &paths.manifest] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| IndexError::IoError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        npy::write_matrix(&paths.embeddings, &self.matrix)?;
        metadata::write_records(&paths.metadata, &self.records)?;

        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| IndexError::MetadataFormatError(e.to_string()))?;
        fs::write(&paths.manifest, json)
            .map_err(|e| IndexError::IoError(format!("{}: {}", paths.manifest.display(), e)))?;

        info!(papers = self.len(), "Corpus artifacts written");
        Ok(())
    }

    /// Check that `manifest` describes this corpus.
    ///
    /// An empty corpus carries no dimension, so only the count is compared.
    pub fn verify_manifest(&self, manifest: &CorpusManifest) -> Result<(), CorpusIntegrityError> {
        if manifest.count != self.len() {
            return Err(CorpusIntegrityError::ManifestCountMismatch {
                expected: manifest.count,
                actual: self.len(),
            });
        }
        if !self.is_empty() && manifest.dimension != self.dimension() {
            return Err(CorpusIntegrityError::ManifestDimensionMismatch {
                expected: manifest.dimension,
                actual: self.dimension(),
            });
        }
        Ok(())
    }

    /// Number of papers (N).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector dimension (D). Zero for an empty corpus loaded from a 1-D file.
    pub fn dimension(&self) -> usize {
        self.matrix.dim()
    }

    /// Record at position `i`. Panics if `i >= len()`.
    pub fn record_at(&self, i: usize) -> &PaperRecord {
        &self.records[i]
    }

    /// Embedding row at position `i`. Panics if `i >= len()`.
    pub fn vector_row(&self, i: usize) -> &[f32] {
        self.matrix.row(i)
    }

    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }
}

fn read_manifest(path: &Path) -> IndexResult<Option<CorpusManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .map_err(|e| IndexError::IoError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| IndexError::MetadataFormatError(format!("{}: {}", path.display(), e)))
}
