pub mod memory;

pub use memory::{
    collection_name, validate_metadata, validate_text, MemoryRecord, Metadata, NewMemoryRecord,
    ScoredMemory, StoreMode,
};
