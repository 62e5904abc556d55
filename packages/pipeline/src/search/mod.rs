//! Search index implementations.

pub mod elastic;
pub mod memory;

pub use elastic::ElasticIndex;
pub use memory::MemoryIndex;
