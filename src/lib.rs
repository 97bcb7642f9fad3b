// Truncated-SVD prediction over sparse object-subject interaction matrices.

#![doc = include_str!("../README.md")]

pub mod factorize;
pub mod id_index;
pub mod ingest;
pub mod model;


pub use factorize::{NdarrayLinAlgBackend, SvdBackend, SvdFactors, ThreadSafeStdError};
pub use id_index::{Id, IdIndex};
pub use ingest::{ingest, ingest_records, Record};
pub use model::{Dimensions, FactorModel, ModelError};
