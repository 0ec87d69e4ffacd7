//! Multipart form bodies for create/update with file uploads.
//!
//! Files read from disk are attached as pull-based streams, so an upload never
//! sits in memory as a whole. The transport picks the boundary and sets the
//! `multipart/form-data` content type.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Default)]
pub struct MultipartForm {
    form: Form,
    fields: Vec<String>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the parts added so far, in order.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.push(name.clone());
        self.form = self.form.text(name, value.into());
        self
    }

    /// Add a part holding `value` serialised as JSON with an
    /// `application/json` content type.
    pub fn json<S: Serialize + ?Sized>(self, name: impl Into<String>, value: &S) -> ClientResult<Self> {
        let name = name.into();
        let body = serde_json::to_vec(value).map_err(ClientError::Encode)?;
        let part = Part::bytes(body)
            .mime_str("application/json")
            .map_err(|source| ClientError::Multipart {
                field: name.clone(),
                source,
            })?;
        Ok(self.part(name, part))
    }

    /// Add an in-memory file part.
    pub fn file(
        self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime: &str,
    ) -> ClientResult<Self> {
        let name = name.into();
        let part = Part::bytes(bytes)
            .file_name(file_name.into())
            .mime_str(mime)
            .map_err(|source| ClientError::Multipart {
                field: name.clone(),
                source,
            })?;
        Ok(self.part(name, part))
    }

    /// Add a file part streamed from disk.
    pub async fn file_from_path(
        self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        mime: &str,
    ) -> ClientResult<Self> {
        let name = name.into();
        let path = path.as_ref();
        let io_err = |source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let length = file.metadata().await.map_err(io_err)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|source| ClientError::Multipart {
                field: name.clone(),
                source,
            })?;

        tracing::debug!(field = %name, path = %path.display(), bytes = length, "Attached streamed file part");
        Ok(self.part(name, part))
    }

    fn part(mut self, name: String, part: Part) -> Self {
        self.fields.push(name.clone());
        self.form = self.form.part(name, part);
        self
    }

    pub(crate) fn into_form(self) -> Form {
        self.form
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
