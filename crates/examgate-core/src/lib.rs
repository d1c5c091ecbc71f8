//! Attempt gate, scoring engine and grading core for examgate.
//!
//! This crate defines the data model, the collaborator traits, the rolling
//! attempt gate and the scoring policies that the rest of examgate builds on.

pub mod error;
pub mod gate;
pub mod grader;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod traits;
