//! # GeoClass Cloud
//!
//! Remote geospatial compute backend for GeoClass.
//!
//! The engine talks to the backend only through the [`SessionProvider`]
//! capability, which is passed explicitly into every remote operation.
//!
//! ## Implementations
//!
//! - [`RestSession`]: blocking client for the service's JSON REST API, with
//!   per-call timeouts and retry on transient failures
//! - [`InMemorySession`]: an in-process backend that really evaluates remaps,
//!   collection maps and exports, for tests and offline use

pub mod auth;
pub mod error;
pub mod http;
pub mod memory;
pub mod naming;
pub mod payload;
pub mod rest;
pub mod session;

pub use auth::{BearerToken, CloudAuth, NoAuth};
pub use error::{CloudError, Result};
pub use memory::InMemorySession;
pub use naming::{next_string, unique_asset_id};
pub use rest::{RestSession, SessionOptions};
pub use session::{
    AssetHandle, AssetKind, ExportOptions, JobReference, JobStatus, LookupExpression, Pyramiding,
    SessionProvider,
};
