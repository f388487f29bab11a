#![deny(unused)]
//! Core types, traits, and error definitions for routir.
//!
//! This crate provides the building blocks shared by every layer of the
//! broker: the request/response model, the `Engine`, `Processor` and
//! `ResultCache` capability traits, configuration and the error type.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
