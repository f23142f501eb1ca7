//! Static file serving.
//!
//! Files under a document root are streamed in fixed-size chunks with a MIME
//! type derived from the extension. The built-in routes
//! `GET|HEAD /static/<path:path>` and `GET|HEAD /favicon.ico` are backed by a
//! [`StaticFileHandler`] when the route table is given a [`StaticFiles`]
//! implementation.

use crate::context::RequestContext;
use crate::handler::{Handler, HandlerResult};
use crate::logging::debug;
use crate::streaming::{ByteStream, DEFAULT_CHUNK_SIZE};
use crate::Error;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// File type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// .js, .mjs
    JavaScript,
    /// .css
    Stylesheet,
    /// .png, .jpg, .jpeg, .gif, .svg, .webp, .avif, .ico, .bmp
    Image,
    /// .woff, .woff2, .ttf, .otf, .eot
    Font,
    /// .html, .htm, .shtml
    Html,
    /// .txt, .xml, .csv, .md
    Text,
    Json,
    /// .pdf, .zip, .gz and friends
    Document,
    Video,
    Audio,
    Other,
}

impl FileType {
    /// Detect file type from path extension
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("js" | "mjs") => FileType::JavaScript,
            Some("css") => FileType::Stylesheet,
            Some("png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp") => {
                FileType::Image
            }
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => FileType::Font,
            Some("html" | "htm" | "shtml") => FileType::Html,
            Some("txt" | "xml" | "csv" | "md") => FileType::Text,
            Some("json") => FileType::Json,
            Some("pdf" | "zip" | "gz" | "tar" | "swf") => FileType::Document,
            Some("mp4" | "webm" | "ogv" | "mov" | "avi") => FileType::Video,
            Some("mp3" | "wav" | "ogg" | "m4a") => FileType::Audio,
            _ => FileType::Other,
        }
    }

    /// Get MIME type for a path of this type
    pub fn mime_type(&self, path: &Path) -> &'static str {
        let ext = extension(path);
        match (self, ext.as_deref()) {
            (FileType::JavaScript, _) => "application/javascript",
            (FileType::Stylesheet, _) => "text/css",
            (FileType::Image, Some("png")) => "image/png",
            (FileType::Image, Some("jpg" | "jpeg")) => "image/jpeg",
            (FileType::Image, Some("gif")) => "image/gif",
            (FileType::Image, Some("svg")) => "image/svg+xml",
            (FileType::Image, Some("webp")) => "image/webp",
            (FileType::Image, Some("avif")) => "image/avif",
            (FileType::Image, Some("ico")) => "image/x-icon",
            (FileType::Image, Some("bmp")) => "image/bmp",
            (FileType::Font, Some("woff")) => "font/woff",
            (FileType::Font, Some("woff2")) => "font/woff2",
            (FileType::Font, Some("ttf")) => "font/ttf",
            (FileType::Font, Some("otf")) => "font/otf",
            (FileType::Font, Some("eot")) => "application/vnd.ms-fontobject",
            (FileType::Html, _) => "text/html",
            (FileType::Text, Some("xml")) => "text/xml",
            (FileType::Text, Some("csv")) => "text/csv",
            (FileType::Text, Some("md")) => "text/markdown",
            (FileType::Text, _) => "text/plain",
            (FileType::Json, _) => "application/json",
            (FileType::Document, Some("pdf")) => "application/pdf",
            (FileType::Document, Some("zip")) => "application/zip",
            (FileType::Document, Some("gz")) => "application/gzip",
            (FileType::Document, Some("tar")) => "application/x-tar",
            (FileType::Document, Some("swf")) => "application/x-shockwave-flash",
            (FileType::Video, Some("webm")) => "video/webm",
            (FileType::Video, Some("ogv")) => "video/ogg",
            (FileType::Video, Some("mov")) => "video/quicktime",
            (FileType::Video, Some("avi")) => "video/x-msvideo",
            (FileType::Video, _) => "video/mp4",
            (FileType::Audio, Some("wav")) => "audio/wav",
            (FileType::Audio, Some("ogg")) => "audio/ogg",
            (FileType::Audio, Some("m4a")) => "audio/mp4",
            (FileType::Audio, _) => "audio/mpeg",
            _ => "application/octet-stream",
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// MIME type for a path, `application/octet-stream` when unknown.
pub fn mime_type_for(path: &Path) -> &'static str {
    FileType::from_path(path).mime_type(path)
}

/// A file ready to stream.
#[derive(Debug)]
pub struct StaticFile {
    pub mime_type: String,
    pub length: Option<u64>,
    pub body: ByteStream,
}

/// Static file collaborator: `serve(relative_path)` yields the file or `None`.
#[async_trait]
pub trait StaticFiles: Send + Sync {
    async fn serve(&self, relative_path: &str) -> Result<Option<StaticFile>, Error>;
}

/// Serves files from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryStaticFiles {
    root: PathBuf,
    chunk_size: usize,
}

impl DirectoryStaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request-relative path onto the document root.
    ///
    /// Empty and absolute paths and any `..` component are refused.
    fn resolve_path(&self, relative_path: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(relative_path);
        if relative_path.is_empty() || relative_path.starts_with(['/', '\\']) {
            return Err(Error::Forbidden(
                "Access denied: invalid static path".to_string(),
            ));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::Forbidden(
                        "Access denied: path traversal attempt".to_string(),
                    ));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StaticFiles for DirectoryStaticFiles {
    async fn serve(&self, relative_path: &str) -> Result<Option<StaticFile>, Error> {
        let path = self.resolve_path(relative_path)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        debug!(path = %path.display(), size = metadata.len(), "Serving static file");

        let file = tokio::fs::File::open(&path).await?;
        Ok(Some(StaticFile {
            mime_type: mime_type_for(&path).to_string(),
            length: Some(metadata.len()),
            body: ByteStream::from_reader(file, self.chunk_size),
        }))
    }
}

/// Handler behind the built-in static routes.
pub struct StaticFileHandler {
    files: Arc<dyn StaticFiles>,
    fixed: Option<String>,
}

impl StaticFileHandler {
    /// Serve the file named by the `path` capture.
    pub fn new(files: Arc<dyn StaticFiles>) -> Self {
        Self { files, fixed: None }
    }

    /// Always serve `relative_path`, e.g. `favicon.ico`.
    pub fn fixed(files: Arc<dyn StaticFiles>, relative_path: impl Into<String>) -> Self {
        Self {
            files,
            fixed: Some(relative_path.into()),
        }
    }
}

#[async_trait]
impl Handler for StaticFileHandler {
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerResult, Error> {
        let relative = match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => ctx
                .params
                .get_str("path")
                .ok_or_else(|| Error::NotFound("static file".to_string()))?
                .to_string(),
        };

        let file = self
            .files
            .serve(&relative)
            .await?
            .ok_or_else(|| Error::NotFound(relative.clone()))?;

        ctx.response.set_content_type(file.mime_type);
        if let Some(length) = file.length {
            ctx.response.set_header("Content-Length", length.to_string());
        }
        Ok(HandlerResult::Stream(file.body))
    }
}
