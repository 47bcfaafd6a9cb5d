//! Use cases of the manifest pipeline.
//!
//! Services take their ports as generic parameters, so tests run them
//! against in-memory fakes and the binary against real adapters.

pub mod build_service;

pub use build_service::{BuildReport, BuildRequest, BuildService};
