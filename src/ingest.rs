use crate::id_index::{Id, IdIndex};
use log::{debug, info};
use ndarray::Array2;
use sprs::TriMat;
use std::collections::HashMap;
use std::fmt;

/// One observed (object, subject, value) interaction.
///
/// Records are transient: they exist only between row decoding and matrix
/// construction and are not retained by the factor model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record {
    pub object: Id,
    pub subject: Id,
    pub value: f64,
}

/// Converts a stream of raw rows into a dense interaction matrix plus the
/// object and subject index maps.
///
/// Each row either decodes into `(object_id, subject_id, value)` or carries
/// the decode error of its source. A failed row is skipped silently (logged
/// at debug level) rather than aborting the stream; upstream row sources are
/// treated as best-effort. Rows repeating the same (object, subject) cell
/// overwrite the earlier value.
///
/// Returns `(matrix, object_index, subject_index)` where the matrix has one
/// row per distinct object and one column per distinct subject, both in
/// first-occurrence order.
pub fn ingest<I, E>(rows: I) -> (Array2<f64>, IdIndex, IdIndex)
where
    I: IntoIterator<Item = Result<(i64, i64, f64), E>>,
    E: fmt::Display,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in rows {
        match row {
            Ok((object, subject, value)) => records.push(Record {
                object: Id(object),
                subject: Id(subject),
                value,
            }),
            Err(error) => {
                skipped += 1;
                debug!("skipping malformed row: {}", error);
            }
        }
    }

    if skipped > 0 {
        info!("skipped {} malformed rows during ingestion", skipped);
    }

    ingest_records(&records)
}

/// Builds the dense matrix and index maps from already-decoded records.
///
/// The matrix is assembled sparse first (only observed cells are stored)
/// and materialized dense afterwards, since the thin-SVD routine consumes
/// dense input.
pub fn ingest_records(records: &[Record]) -> (Array2<f64>, IdIndex, IdIndex) {
    let mut object_index = IdIndex::new();
    let mut subject_index = IdIndex::new();

    for record in records {
        object_index.insert(record.object);
        subject_index.insert(record.subject);
    }

    let m = object_index.len();
    let n = subject_index.len();

    // Last write wins for repeated (object, subject) cells, so collapse the
    // records before the triplet build; `TriMat` would sum duplicates.
    let mut cells: HashMap<(usize, usize), f64> = HashMap::with_capacity(records.len());
    for record in records {
        let row = object_index.position(record.object);
        let col = subject_index.position(record.subject);
        cells.insert((row, col), record.value);
    }

    let mut sparse = TriMat::new((m, n));
    for (&(row, col), &value) in &cells {
        sparse.add_triplet(row, col, value);
    }

    let compressed: sprs::CsMat<f64> = sparse.to_csr();

    let mut matrix = Array2::<f64>::zeros((m, n));
    for (&value, (row, col)) in compressed.iter() {
        matrix[[row, col]] = value;
    }

    info!(
        "ingested {} records into a {}x{} interaction matrix ({} cells observed)",
        records.len(),
        m,
        n,
        cells.len()
    );

    (matrix, object_index, subject_index)
}
