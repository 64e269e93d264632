//! Vela State Management
//!
//! This crate persists the deployment state for the vela tool: which
//! resources are managed, their provider identifiers and attributes, and the
//! apply outputs. State can live in a local file or an S3 bucket, with
//! advisory locking for safe concurrent access.
//!
//! # Overview
//!
//! - **StateFile**: the main state structure containing all managed resources
//! - **StateBackend**: a trait for state storage backends (local, S3)
//! - **LockInfo**: information about state locks for concurrent access control
//!
//! # Example
//!
//! ```ignore
//! use vela_state::{create_backend, BackendConfig};
//!
//! let config = BackendConfig::local("vela.state.json");
//! let backend = create_backend(&config).await?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let state = backend.read_state().await?.unwrap_or_default();
//! // ... apply effects, record results ...
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, S3Backend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
