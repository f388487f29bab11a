//! Core type definitions for routir.
//!
//! Broken down into submodules: service roles, single requests and
//! responses, and the batch shapes handed to engines.

pub mod batch;
pub mod request;
pub mod role;

pub use batch::*;
pub use request::*;
pub use role::*;
