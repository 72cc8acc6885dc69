// src/db/models/mod.rs

//! Data models for the build record store

mod build_record;

pub use build_record::{BuildRecord, BuildStatus, DependencyLink};
