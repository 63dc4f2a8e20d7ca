//! core
//!
//! Core domain types, settings, and configuration documents.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName
//! - [`config`] - Settings schema and loading
//! - [`document`] - Nested YAML documents with deep merge and deep fetch
//! - [`identity`] - Plugin identity from the repository naming convention
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Parsing is pure; only the host layer performs I/O against the network

pub mod config;
pub mod document;
pub mod identity;
pub mod types;
