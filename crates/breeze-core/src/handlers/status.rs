//! Reload and allocation-statistics endpoints

use crate::response::{Body, Response, ResponseBuilder, StatusCode};
use crate::server::ServerContext;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Body of `/reload`
#[derive(Debug, Serialize)]
struct ReloadStatus {
    reload: bool,
    timestamp: u64,
    memory_usage: usize,
}

/// Answer `/reload`: report the dirty flag and clear it.
///
/// Read-and-clear - the browser polling this endpoint is the single
/// logical consumer of the flag.
pub fn reload_status(ctx: &ServerContext) -> Response {
    let status = ReloadStatus {
        reload: ctx.watcher.take_dirty(),
        timestamp: unix_now(),
        memory_usage: ctx.pool.total_allocated(),
    };
    json_response(
        ctx,
        &status,
        &[
            ("Access-Control-Allow-Origin", "*"),
            ("Cache-Control", "no-cache"),
        ],
    )
}

/// Answer `/memory-stats`: pool counters, no side effects.
pub fn memory_stats(ctx: &ServerContext) -> Response {
    let stats = ctx.pool.stats();
    json_response(ctx, &stats, &[])
}

fn json_response<T: Serialize>(
    ctx: &ServerContext,
    value: &T,
    extra_headers: &[(&str, &str)],
) -> Response {
    let encoded = match serde_json::to_vec(value) {
        Ok(encoded) => encoded,
        Err(_) => return Response::internal_error(),
    };
    let mut buf = match ctx.pool.allocate(encoded.len()) {
        Ok(buf) => buf,
        Err(_) => return Response::internal_error(),
    };
    buf[..].copy_from_slice(&encoded);

    let mut builder =
        ResponseBuilder::new(StatusCode::OK).header("Content-Type", "application/json");
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::Tracked {
            len: encoded.len(),
            buf,
        })
        .build()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ServerConfig, ServerContext};
    use std::path::Path;

    fn context_with_root(root: &Path) -> ServerContext {
        let config = ServerConfig {
            root: root.to_path_buf(),
            ..ServerConfig::default()
        };
        ServerContext::new(config)
    }

    #[test]
    fn test_reload_reports_clean_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with_root(dir.path());
        let res = reload_status(&ctx);

        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("cache-control"), Some("no-cache"));

        let body: serde_json::Value = serde_json::from_slice(res.body.as_bytes()).unwrap();
        assert_eq!(body["reload"], false);
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_memory_stats_snapshot_excludes_own_body() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with_root(dir.path());
        let held = ctx.pool.allocate(256).unwrap();

        let res = memory_stats(&ctx);
        let body: serde_json::Value = serde_json::from_slice(res.body.as_bytes()).unwrap();

        // The snapshot is taken before the response body is allocated
        assert_eq!(body["total_allocated"], 256);
        assert_eq!(body["active_blocks"], 1);

        drop(held);
    }

    #[test]
    fn test_memory_stats_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with_root(dir.path());
        let before = ctx.pool.stats();
        let res = memory_stats(&ctx);
        drop(res);
        assert_eq!(ctx.pool.stats(), before);
    }
}
