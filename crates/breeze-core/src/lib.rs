//! breeze-core: live-reload static dev server core
//!
//! Serves static files from a root directory, watches web source files for
//! changes, and exposes diagnostic counters about its own buffer usage.
//!
//! ## Modules
//! - `pool` - allocation-tracking buffer pool behind every working buffer
//! - `watch` - file-change watcher with a read-and-clear dirty flag
//! - `request` / `response` - HTTP/1.1 subset types and wire assembly
//! - `handlers` - exact-path routing with a static-file fallback
//! - `server` - listener setup, accept loop, graceful shutdown

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod handlers;
pub mod pool;
pub mod request;
pub mod response;
pub mod server;
pub mod watch;

// Re-exports
pub use error::{Error, PoolError, Result};
pub use pool::{BlockHandle, BufferPool, PoolStats, TrackedBuf};
pub use request::{Method, Request};
pub use response::{Body, Response, ResponseBuilder, StatusCode};
pub use server::{ConnectionTracker, Server, ServerConfig, ServerContext};
pub use watch::Watcher;
