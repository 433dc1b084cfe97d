//! The three specialised research agents

pub mod live;
pub mod structured;
pub mod unstructured;

pub use live::LiveAgent;
pub use structured::StructuredAgent;
pub use unstructured::UnstructuredAgent;
