//! Request handlers
//!
//! Exact-path routing, first match wins:
//! - `/reload` - change flag, read-and-clear
//! - `/live-reload.js` - the reload polling script itself
//! - `/memory-stats` - buffer pool counters
//! - anything else - static file lookup, `index.html` for the root

mod files;
mod status;

pub use files::{content_type_for, serve_file};
pub use status::{memory_stats, reload_status};

use crate::request::Request;
use crate::response::Response;
use crate::server::ServerContext;
use std::path::Path;

/// Route a parsed request to its handler.
pub async fn dispatch(ctx: &ServerContext, req: &Request) -> Response {
    match req.path.as_str() {
        "/reload" => status::reload_status(ctx),
        "/live-reload.js" => files::serve_file(ctx, Path::new("live-reload.js")).await,
        "/memory-stats" => status::memory_stats(ctx),
        _ => {
            let name = req.path.strip_prefix('/').unwrap_or(&req.path);
            let name = if name.is_empty() { "index.html" } else { name };
            files::serve_file(ctx, Path::new(name)).await
        }
    }
}
