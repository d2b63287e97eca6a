pub mod embedder;
pub mod fallback;
pub mod memory;
pub mod native;
pub mod schema;
pub mod vector_store;

pub use memory::{AddOutcome, VectorMemory};
pub use vector_store::{create_store, InsertOutcome, StoreInitError, VectorStore};
