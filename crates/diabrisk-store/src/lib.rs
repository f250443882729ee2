//! Storage layer: the immutable base dataset and the append-only increment file.

mod csv;
mod dataset;
mod error;

pub use dataset::DatasetStore;
pub use error::StoreError;
