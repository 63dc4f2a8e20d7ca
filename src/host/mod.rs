//! host
//!
//! Abstraction for the remote git hosting service.
//!
//! # Architecture
//!
//! The `GitHost` trait defines every network operation the repository
//! components need: ref listing and updates, low-level git object creation,
//! file contents, releases and traffic. Components receive an
//! `Arc<dyn GitHost>` and never construct a client themselves.
//!
//! # Modules
//!
//! - `traits`: Core `GitHost` trait and request/response types
//! - [`github`]: GitHub REST v3 implementation
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pluginsync::core::config::Config;
//! use pluginsync::host::{github::GitHubHost, GitHost};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let host: Arc<dyn GitHost> = Arc::new(GitHubHost::from_config(&config, Some("token".into())));
//! let exists = host.repository_exists("intelsdi-x/snap-plugin-collector-cpu").await?;
//! # let _ = exists;
//! # Ok(())
//! # }
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
