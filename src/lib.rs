//! pluginsync - maintenance of a fleet of plugin repositories
//!
//! Keeps maintained forks in step with their upstreams, publishes generated
//! files into repositories through the host's git object API, and derives a
//! metadata document per plugin repository from layered configuration.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, settings, documents and plugin identity
//! - [`host`] - The remote git hosting service (GitHub and an in-memory mock)
//! - [`repo`] - Per-repository operations built on a host client
//!
//! # Correctness Invariants
//!
//! 1. A conflicting ref update is retried at most once, with a freshly
//!    resolved upstream commit
//! 2. Policy checks run before any host call
//! 3. Cached results are scoped to a single repository context

pub mod core;
pub mod host;
pub mod repo;
