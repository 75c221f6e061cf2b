//! Category-partitioned embedding store: documents are split into paragraphs,
//! embedded through an external service and searched by exact cosine scan.

pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod logging;
pub mod persist;
pub mod pipeline;
pub mod registry;
pub mod sanitize;
pub mod vector_entry;
pub mod vector_ops;
pub mod vector_store;

pub use config::{Number, Settings};
pub use embed::{Embedder, OpenAiEmbedder};
pub use error::{Result, StoreError};
pub use pipeline::{IngestReport, Pipeline};
pub use registry::CategoryRegistry;
pub use vector_entry::{Payload, VectorEntry};
pub use vector_store::{SearchResult, VectorStore};
