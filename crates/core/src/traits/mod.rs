//! Core traits for routir.
//!
//! - `engine`: the batch scoring capability wrapped by processors
//! - `processor`: start/submit/stop contract stored in the registry
//! - `cache`: result cache consulted before batching

pub mod cache;
pub mod engine;
pub mod processor;

pub use cache::*;
pub use engine::*;
pub use processor::*;
