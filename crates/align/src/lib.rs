//! `receipt-align`: item-level alignment of two receipt transcriptions.
//!
//! Pure engine crate: receives pre-loaded tables, returns aligned and scored
//! rows. The embedding model is an injected dependency.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod equalize;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod optimizer;
pub mod scorer;
pub mod table;

pub use config::AlignConfig;
pub use embedding::{EmbeddingModel, NoEmbeddings, WordVectors};
pub use engine::{align_group, divergence, merge};
pub use error::AlignError;
pub use model::{GroupKey, MergeOutput, MergedRow, ReceiptRow, ReceiptTable, Tier};
