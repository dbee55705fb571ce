//! Static file serving
//!
//! Resolves a name against the served root, reads the whole file into an
//! exactly-sized tracked buffer in bounded chunks, and answers in one
//! shot. A read that stops early is served as-is with the length actually
//! read.

use crate::response::{Body, Response, ResponseBuilder, StatusCode};
use crate::server::ServerContext;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Chunk size for file reads.
const READ_CHUNK: usize = 4096;

/// Serve `name` relative to the configured root.
pub async fn serve_file(ctx: &ServerContext, name: &Path) -> Response {
    let path = ctx.config.root.join(name);

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return Response::not_found(),
    };
    let size = match file.metadata().await {
        Ok(meta) => meta.len() as usize,
        Err(err) => {
            warn!(file = %path.display(), %err, "metadata lookup failed");
            return Response::internal_error();
        }
    };

    let mut buf = match ctx.pool.allocate(size) {
        Ok(buf) => buf,
        Err(err) => {
            warn!(file = %path.display(), %err, "allocation failed");
            return Response::internal_error();
        }
    };

    let mut filled = 0;
    while filled < size {
        let end = (filled + READ_CHUNK).min(size);
        match file.read(&mut buf[filled..end]).await {
            // Early stop: serve what was read
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) => {
                warn!(file = %path.display(), %err, "read failed");
                return Response::internal_error();
            }
        }
    }
    if filled == 0 {
        return Response::internal_error();
    }

    ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", content_type_for(&path))
        .header("Cache-Control", "no-cache")
        .header(
            "X-Memory-Pool",
            format!("{} bytes allocated", ctx.pool.total_allocated()),
        )
        .body(Body::Tracked { buf, len: filled })
        .build()
}

/// MIME type by exact suffix match; unknown suffixes are served as plain
/// text.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerConfig;
    use std::fs;

    fn context_with_root(root: &Path) -> ServerContext {
        let config = ServerConfig {
            root: root.to_path_buf(),
            ..ServerConfig::default()
        };
        ServerContext::new(config)
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(
            content_type_for(Path::new("app.js")),
            "application/javascript"
        );
        assert_eq!(content_type_for(Path::new("style.css")), "text/css");
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(content_type_for(Path::new("photo.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("icon.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("data.json")), "application/json");
        assert_eq!(content_type_for(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(content_type_for(Path::new("README")), "text/plain");
        assert_eq!(content_type_for(Path::new("notes.txt")), "text/plain");
    }

    #[tokio::test]
    async fn test_serves_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![7u8; 10_000];
        fs::write(dir.path().join("blob.json"), &content).unwrap();
        let ctx = context_with_root(dir.path());

        let res = serve_file(&ctx, Path::new("blob.json")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.len(), content.len());
        assert_eq!(res.body.as_bytes(), &content[..]);
    }

    #[tokio::test]
    async fn test_diagnostic_header_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let ctx = context_with_root(dir.path());

        let res = serve_file(&ctx, Path::new("index.html")).await;
        let diag = res.header("x-memory-pool").unwrap();
        assert!(diag.ends_with("bytes allocated"));
    }

    #[tokio::test]
    async fn test_empty_file_is_500() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.html"), "").unwrap();
        let ctx = context_with_root(dir.path());

        let res = serve_file(&ctx, Path::new("empty.html")).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body.as_bytes(), b"Memory allocation failed");
    }

    #[tokio::test]
    async fn test_error_paths_release_buffers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.css"), "").unwrap();
        let ctx = context_with_root(dir.path());

        let res = serve_file(&ctx, Path::new("empty.css")).await;
        drop(res);
        assert_eq!(ctx.pool.total_allocated(), 0);
    }
}
