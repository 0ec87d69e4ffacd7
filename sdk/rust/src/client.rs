use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::{Access, TokenSource};
use crate::envelope::{Acknowledged, PagedResponse, ResponseData};
use crate::error::{ApiError, ClientError, ClientResult};
use crate::multipart::MultipartForm;
use crate::query::{export_query, params_query, ListQuery};
use crate::ResourceId;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configured transport shared by every resource handle.
///
/// Cloning is cheap; clones share the connection pool and, for the private
/// variant, the cookie jar.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    access: Access,
}

impl ApiClient {
    /// Anonymous client for public pages.
    pub fn public(base_url: &str) -> ClientResult<Self> {
        Self::with_access(base_url, Access::Public, DEFAULT_TIMEOUT)
    }

    /// Client that attaches the session's bearer token and keeps its cookies.
    pub fn private(base_url: &str, tokens: Arc<dyn TokenSource>) -> ClientResult<Self> {
        Self::with_access(base_url, Access::Private(tokens), DEFAULT_TIMEOUT)
    }

    pub fn with_access(base_url: &str, access: Access, timeout: Duration) -> ClientResult<Self> {
        Url::parse(base_url).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        let http = Client::builder()
            .timeout(timeout)
            .cookie_store(access.is_private())
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_private(&self) -> bool {
        self.access.is_private()
    }

    /// Handle for the paged resource served under `/api/<name>`.
    pub fn resource<T>(&self, name: &str) -> ResourceClient<T> {
        ResourceClient::new(self.clone(), name, true)
    }

    /// Handle for a resource without a `partialList` endpoint.
    pub fn unpaged_resource<T>(&self, name: &str) -> ResourceClient<T> {
        ResourceClient::new(self.clone(), name, false)
    }

    fn url(&self, path: &str, query: Option<&str>) -> ClientResult<Url> {
        let mut raw = format!("{}{}", self.base_url, path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            raw.push('?');
            raw.push_str(query);
        }
        Url::parse(&raw).map_err(|source| ClientError::InvalidUrl { url: raw, source })
    }

    fn prepare(&self, method: Method, path: &str, query: Option<&str>) -> ClientResult<(Url, RequestBuilder)> {
        let url = self.url(path, query)?;
        let request = self.http.request(method, url.clone());
        Ok((url, self.authorize(request)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access {
            Access::Public => request,
            Access::Private(tokens) => match tokens.access_token() {
                Some(token) => request.bearer_auth(token),
                None => {
                    tracing::warn!("No access token in session; sending request without authorization");
                    request
                }
            },
        }
    }

    /// Send once. Any non-2xx response becomes [`ClientError::Api`].
    async fn execute(&self, url: &Url, request: RequestBuilder) -> ClientResult<Response> {
        tracing::debug!(url = %url, private = self.is_private(), "Sending API request");

        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(url = %url, status = %status, error = %e, "Failed to read error body");
                String::new()
            }
        };
        let err = ApiError::from_body(status, body);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %url, "Session rejected by backend; login required");
        } else {
            tracing::warn!(url = %url, status = %status, message = %err.message(), "API request failed");
        }
        Err(ClientError::Api(err))
    }

    async fn json<R: DeserializeOwned>(&self, url: &Url, request: RequestBuilder) -> ClientResult<R> {
        let response = self.execute(url, request).await?;
        let bytes = response.bytes().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        decode(url, &bytes)
    }
}

/// Decode a success body. Blank bodies (204, empty 200) read as `{}`.
fn decode<R: DeserializeOwned>(url: &Url, bytes: &[u8]) -> ClientResult<R> {
    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        bytes
    };
    serde_json::from_slice(body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Downloaded export ("blob") with the metadata needed to save it.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Typed operations against one backend resource (`/api/<name>`).
///
/// Public and private transports yield the same handle type, so callers can
/// switch variants without code changes.
pub struct ResourceClient<T> {
    api: ApiClient,
    name: String,
    base: String,
    paged: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            name: self.name.clone(),
            base: self.base.clone(),
            paged: self.paged,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ResourceClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("name", &self.name)
            .field("paged", &self.paged)
            .field("access", &self.api.access)
            .finish()
    }
}

impl<T> ResourceClient<T> {
    fn new(api: ApiClient, name: &str, paged: bool) -> Self {
        let name = name.trim_matches('/').to_string();
        Self {
            base: format!("/api/{}", name),
            name,
            api,
            paged,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_paged(&self) -> bool {
        self.paged
    }

    fn path(&self, suffix: &str) -> String {
        let suffix = suffix.trim_matches('/');
        if suffix.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, suffix)
        }
    }
}

impl<T> ResourceClient<T>
where
    T: Serialize + DeserializeOwned,
{
    /// `GET /api/<resource>/<id>`
    pub async fn get_one(&self, id: ResourceId) -> ClientResult<ResponseData<T>> {
        let (url, request) = self.api.prepare(Method::GET, &self.path(&id.to_string()), None)?;
        self.api.json(&url, request).await
    }

    /// `GET /api/<resource>`: the whole collection, unpaged.
    pub async fn get_list(&self) -> ClientResult<ResponseData<Vec<T>>> {
        let (url, request) = self.api.prepare(Method::GET, &self.base, None)?;
        self.api.json(&url, request).await
    }

    /// `GET /api/<resource>/partialList?...`
    ///
    /// For an unpaged resource the full list is fetched and returned as a
    /// single page.
    pub async fn get_all(&self, query: &ListQuery) -> ClientResult<ResponseData<PagedResponse<T>>> {
        if !self.paged {
            let list = self.get_list().await?;
            return Ok(list.map(PagedResponse::single_page));
        }

        let query = query.to_query_string();
        let (url, request) = self
            .api
            .prepare(Method::GET, &self.path("partialList"), Some(&query))?;
        self.api.json(&url, request).await
    }

    /// `POST /api/<resource>/save`
    pub async fn create(&self, data: &T) -> ClientResult<ResponseData<T>> {
        let (url, request) = self.api.prepare(Method::POST, &self.path("save"), None)?;
        self.api.json(&url, request.json(data)).await
    }

    /// `PUT /api/<resource>/update`
    pub async fn update(&self, data: &T) -> ClientResult<ResponseData<T>> {
        let (url, request) = self.api.prepare(Method::PUT, &self.path("update"), None)?;
        self.api.json(&url, request.json(data)).await
    }

    /// `PUT /api/<resource>/<id>/<path>`: single-field transitions such as
    /// `markAsRead`.
    pub async fn update_by_id<R: DeserializeOwned>(
        &self,
        id: ResourceId,
        path: &str,
    ) -> ClientResult<ResponseData<R>> {
        let suffix = format!("{}/{}", id, path.trim_matches('/'));
        let (url, request) = self.api.prepare(Method::PUT, &self.path(&suffix), None)?;
        self.api.json(&url, request).await
    }

    /// `PUT /api/<resource>/<path>` with no body: bulk transitions.
    pub async fn put_all(&self, path: &str) -> ClientResult<Acknowledged> {
        let (url, request) = self.api.prepare(Method::PUT, &self.path(path), None)?;
        self.api.json(&url, request).await
    }

    /// `DELETE /api/<resource>/delete/<id>`
    pub async fn delete(&self, id: ResourceId) -> ClientResult<Acknowledged> {
        let (url, request) = self
            .api
            .prepare(Method::DELETE, &self.path(&format!("delete/{}", id)), None)?;
        self.api.json(&url, request).await
    }

    /// `DELETE /api/<resource>/deleteMultiple` with the ids as a JSON array.
    pub async fn delete_multiple(&self, ids: &[ResourceId]) -> ClientResult<Acknowledged> {
        let (url, request) = self
            .api
            .prepare(Method::DELETE, &self.path("deleteMultiple"), None)?;
        self.api.json(&url, request.json(ids)).await
    }

    /// `POST /api/<resource>/save` as `multipart/form-data`.
    pub async fn create_multipart(&self, form: MultipartForm) -> ClientResult<ResponseData<T>> {
        let (url, request) = self.api.prepare(Method::POST, &self.path("save"), None)?;
        self.api.json(&url, request.multipart(form.into_form())).await
    }

    /// `PUT /api/<resource>/update` as `multipart/form-data`.
    pub async fn update_multipart(&self, form: MultipartForm) -> ClientResult<ResponseData<T>> {
        let (url, request) = self.api.prepare(Method::PUT, &self.path("update"), None)?;
        self.api.json(&url, request.multipart(form.into_form())).await
    }

    /// `GET /api/<resource>/findBy?<params>`
    pub async fn get_by_params<I, K, V>(&self, params: I) -> ClientResult<ResponseData<T>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let query = params_query(params);
        let (url, request) = self
            .api
            .prepare(Method::GET, &self.path("findBy"), Some(&query))?;
        self.api.json(&url, request).await
    }

    /// `GET /api/<resource>/export?type=&scope=&ids=..`, returning raw bytes.
    pub async fn export_data(&self, kind: &str, scope: &str, ids: &[ResourceId]) -> ClientResult<ExportedFile> {
        let query = export_query(kind, scope, ids);
        let (url, request) = self
            .api
            .prepare(Method::GET, &self.path("export"), Some(&query))?;
        let request = request.header(ACCEPT, HeaderValue::from_static("application/octet-stream"));

        let response = self.api.execute(&url, request).await?;
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name);

        let bytes = response.bytes().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(resource = %self.name, bytes = bytes.len(), "Export downloaded");
        Ok(ExportedFile {
            bytes,
            content_type,
            file_name,
        })
    }
}

/// Extract the file name from a `Content-Disposition` header value.
pub fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("filename") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
        .filter(|name| !name.is_empty())
}
