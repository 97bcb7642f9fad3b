use crate::factorize::{NdarrayLinAlgBackend, SvdBackend, ThreadSafeStdError};
use crate::id_index::{Id, IdIndex};
use crate::ingest;
use log::{debug, info};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Error taxonomy for factor-model construction, reduction and queries.
///
/// All recoverable variants leave the model untouched; a failed build never
/// exposes a partially-populated model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A query or reduction was attempted before a successful build.
    #[error("model is empty")]
    EmptyModel,

    /// `cut` was called with a rank below the minimum of 1.
    #[error("k={k} must be at least 1")]
    InvalidRank { k: usize },

    /// `compress` was called with a kept-energy share outside the valid interval.
    #[error("saved_part={saved_part} must be in interval (0.0, 1.0]")]
    InvalidSavedPart { saved_part: f64 },

    /// The SVD routine failed to converge. The build aborts entirely; this
    /// is not a normal operational condition and is never retried.
    #[error("factorization failed: {0}")]
    Factorization(ThreadSafeStdError),

    #[error("failed to encode model: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode model: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shape report for a factor model: matrix rows `m`, rank `k`, matrix
/// columns `n`, and the distinct object and subject counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub m: usize,
    pub k: usize,
    pub n: usize,
    pub objects: usize,
    pub subjects: usize,
}

/// Low-rank factor store for an object×subject interaction matrix.
///
/// Owns the thin-SVD factors `u` (m×k), `sigma` (k, descending) and `v`
/// (n×k) together with the two id indexes row-aligned with `u` and `v`.
/// Built once from a full record set; the only in-place mutations are the
/// rank reductions ([`cut`](Self::cut), [`compact`](Self::compact),
/// [`compress`](Self::compress)), which monotonically shrink `k`.
///
/// The model is not internally synchronized. Embedders serving it from
/// multiple threads must hold an exclusive lock across reductions and a
/// shared lock across queries; a rebuild should construct a fresh instance
/// and swap it in rather than mutate a live one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorModel {
    u: Array2<f64>,
    sigma: Array1<f64>,
    v: Array2<f64>,
    object_index: IdIndex,
    subject_index: IdIndex,
}

impl FactorModel {
    /// Creates an empty model. Every query on it reports
    /// [`ModelError::EmptyModel`] (or the documented zero value) until a
    /// build replaces it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model from a row stream using the default
    /// [`NdarrayLinAlgBackend`] for factorization.
    ///
    /// Rows that fail to decode are skipped, see [`ingest::ingest`].
    ///
    /// # Errors
    /// [`ModelError::Factorization`] if the SVD routine does not converge;
    /// no partial model is produced in that case.
    pub fn build<I, E>(rows: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = Result<(i64, i64, f64), E>>,
        E: fmt::Display,
    {
        Self::build_with_backend(rows, &NdarrayLinAlgBackend)
    }

    /// Builds a model from a row stream, factorizing with `backend`.
    pub fn build_with_backend<I, E, B>(rows: I, backend: &B) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = Result<(i64, i64, f64), E>>,
        E: fmt::Display,
        B: SvdBackend,
    {
        let (matrix, object_index, subject_index) = ingest::ingest(rows);

        let (m, n) = matrix.dim();
        if m == 0 || n == 0 {
            info!("no usable records ingested; model stays empty");
            return Ok(Self::new());
        }

        let factors = backend
            .thin_svd(matrix)
            .map_err(ModelError::Factorization)?;

        info!(
            "factorized {}x{} interaction matrix into rank-{} factors",
            m,
            n,
            factors.sigma.len()
        );

        Ok(Self::from_parts(
            factors.u,
            factors.sigma,
            factors.v,
            object_index,
            subject_index,
        ))
    }

    pub(crate) fn from_parts(
        u: Array2<f64>,
        sigma: Array1<f64>,
        v: Array2<f64>,
        object_index: IdIndex,
        subject_index: IdIndex,
    ) -> Self {
        Self {
            u,
            sigma,
            v,
            object_index,
            subject_index,
        }
    }

    /// True if any of the factors or indexes is zero-sized. An empty model
    /// is a terminal input state for every query operation.
    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
            || self.sigma.is_empty()
            || self.v.is_empty()
            || self.object_index.is_empty()
            || self.subject_index.is_empty()
    }

    /// Number of retained singular-value/vector triples.
    pub fn rank(&self) -> usize {
        self.sigma.len()
    }

    /// The retained singular values, descending.
    pub fn sigma(&self) -> &Array1<f64> {
        &self.sigma
    }

    fn ensure_populated(&self) -> Result<(), ModelError> {
        if self.is_empty() {
            Err(ModelError::EmptyModel)
        } else {
            Ok(())
        }
    }

    /// Truncates the model to its top-`k` factors.
    ///
    /// `sigma` is sorted descending, so the top k factors are the first k:
    /// `sigma` keeps its first k entries and `u` and `v` their first k
    /// columns. Calling with `k` at or above the current rank is a no-op.
    /// This is the single mutation primitive; `compact` and `compress` are
    /// both expressed in terms of it.
    ///
    /// # Errors
    /// [`ModelError::EmptyModel`] on an empty model,
    /// [`ModelError::InvalidRank`] if `k < 1`. The model is unchanged on
    /// either failure.
    pub fn cut(&mut self, k: usize) -> Result<(), ModelError> {
        self.ensure_populated()?;

        if k < 1 {
            return Err(ModelError::InvalidRank { k });
        }

        if k >= self.rank() {
            debug!("cut to k={} requested at rank {}; nothing to do", k, self.rank());
            return Ok(());
        }

        self.sigma = self.sigma.slice(s![..k]).to_owned();
        self.u = self.u.slice(s![.., ..k]).to_owned();
        self.v = self.v.slice(s![.., ..k]).to_owned();

        info!("cut factor model to rank {}", k);
        Ok(())
    }

    /// Lossless rank reduction: cuts at the first singular value that is
    /// zero or negative. Such trailing entries contribute nothing to
    /// predictions and only arise from numerical noise. A model with a
    /// strictly positive spectrum is already minimal and is left unchanged.
    pub fn compact(&mut self) -> Result<(), ModelError> {
        self.ensure_populated()?;

        match self.sigma.iter().position(|&value| value <= 0.0) {
            Some(k) => self.cut(k),
            None => Ok(()),
        }
    }

    /// Lossy energy-based reduction: keeps the shortest prefix of factors
    /// whose cumulative singular-value sum reaches `saved_part` of the
    /// total spectral energy, with a minimum retained rank of 1.
    ///
    /// # Errors
    /// [`ModelError::EmptyModel`] on an empty model,
    /// [`ModelError::InvalidSavedPart`] unless `saved_part` lies in
    /// `(0.0, 1.0]`. The model is unchanged on either failure.
    pub fn compress(&mut self, saved_part: f64) -> Result<(), ModelError> {
        self.ensure_populated()?;

        if !(saved_part > 0.0 && saved_part <= 1.0) {
            return Err(ModelError::InvalidSavedPart { saved_part });
        }

        let total: f64 = self.sigma.sum();
        let target = total * saved_part;

        let mut running = 0.0;
        let mut cut_k = 0;

        for (k, &value) in self.sigma.iter().enumerate() {
            running += value;
            cut_k = k + 1;

            if running >= target {
                break;
            }
        }

        self.cut(cut_k)
    }

    /// Shape report. All fields are zero on an empty model.
    pub fn dimensions(&self) -> Dimensions {
        if self.is_empty() {
            return Dimensions::default();
        }

        Dimensions {
            m: self.u.nrows(),
            k: self.rank(),
            n: self.v.nrows(),
            objects: self.object_index.len(),
            subjects: self.subject_index.len(),
        }
    }

    /// Dense row index of `object` in `u`.
    ///
    /// An object that was never observed maps to row 0 (see
    /// [`IdIndex::position`] for this deliberately preserved edge).
    pub fn object_position(&self, object: Id) -> Result<usize, ModelError> {
        self.ensure_populated()?;
        Ok(self.object_index.position(object))
    }

    /// Dense row index of `subject` in `v`; same unknown-id edge as
    /// [`object_position`](Self::object_position).
    pub fn subject_position(&self, subject: Id) -> Result<usize, ModelError> {
        self.ensure_populated()?;
        Ok(self.subject_index.position(subject))
    }

    /// Predicted value for one (object, subject) cell:
    /// `Σ_j u[row][j] · sigma[j] · v[col][j]`, the truncated-SVD
    /// reconstruction evaluated at the requested cell only.
    ///
    /// Returns 0.0 on an empty model.
    pub fn predict(&self, object: Id, subject: Id) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let row = self.object_index.position(object);
        let col = self.subject_index.position(subject);

        let weighted = &self.u.row(row) * &self.sigma;
        weighted.dot(&self.v.row(col))
    }

    /// Predicted values for `object` against every indexed subject, sorted
    /// descending by value. The sort is stable, so subjects with equal
    /// predictions stay in dense-index (first-occurrence) order; that
    /// ordering is incidental, not meaningful.
    ///
    /// Returns an empty vector on an empty model.
    pub fn top_subjects(&self, object: Id) -> Vec<(Id, f64)> {
        if self.is_empty() {
            return Vec::new();
        }

        let row = self.object_index.position(object);
        let weighted = &self.u.row(row) * &self.sigma;

        let mut ranked: Vec<(Id, f64)> = self
            .subject_index
            .ids()
            .iter()
            .enumerate()
            .map(|(col, &subject)| (subject, weighted.dot(&self.v.row(col))))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Encodes the full model state (factors plus both id indexes) as a
    /// self-contained byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    /// Decodes a model previously produced by [`to_bytes`](Self::to_bytes).
    /// Floating values round-trip bit-for-bit.
    ///
    /// # Errors
    /// [`ModelError::Decode`] on malformed or truncated bytes; no model is
    /// produced in that case.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let (model, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(model)
    }

    /// Writes the encoded model to a file.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Loads a model previously written by [`save_model`](Self::save_model).
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let model = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(model)
    }
}
