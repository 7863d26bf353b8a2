#![doc = "gdrive-bucket-core: core logic library for gdrive-bucket."]

//! This crate holds everything needed to mirror a Drive folder tree into a
//! bucket, expressed against two traits ([`contract::DriveApi`] and
//! [`contract::BucketStore`]). Concrete HTTP clients live in the CLI crate.
//!
//! # Usage
//! Call [`mirror::mirror`] with a [`config::MirrorConfig`], a drive handle for
//! traversal, and a factory that builds one client pair per worker.

pub mod config;
pub mod contract;
pub mod error;
pub mod lister;
pub mod mirror;
pub mod pool;
pub mod query;
pub mod queue;
pub mod resolver;
pub mod transfer;
pub mod walker;

pub use error::MirrorError;
