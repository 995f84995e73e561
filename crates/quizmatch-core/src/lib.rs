//! quizmatch-core: question bank extraction, fuzzy matching, and grading.
//!
//! This crate defines the data model and the pipeline stages that reconcile a
//! quiz export, its answer key, and per-student grade records.

pub mod config;
pub mod error;
pub mod extract;
pub mod grader;
pub mod grades;
pub mod matcher;
pub mod model;
pub mod pivot;
pub mod summary;
pub mod table;
pub mod text;
