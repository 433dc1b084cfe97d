//! Vector store implementations

pub mod memory;
pub mod pinecone;

pub use memory::InMemoryVectorStore;
pub use pinecone::{MetadataEncoding, PineconeClient, PineconeConfig};
