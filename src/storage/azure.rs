// mongo-blob-backup/src/storage/azure.rs
//! Azure Blob Storage over its REST API, authorised with Shared Key.
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use futures::StreamExt;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Body, Method, Response, StatusCode};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use super::{BlobEntry, BlobStore};
use crate::config::Credentials;
use crate::errors::{AppError, Result};

const API_VERSION: &str = "2021-08-06";
const OCTET_STREAM: &str = "application/octet-stream";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

static BLOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Blob>(.*?)</Blob>").expect("static regex is valid"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Name>([^<]*)</Name>").expect("static regex is valid"));
static LENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<Content-Length>(\d+)</Content-Length>").expect("static regex is valid")
});
static NEXT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<NextMarker>([^<]+)</NextMarker>").expect("static regex is valid"));
static ERROR_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Code>([^<]+)</Code>").expect("static regex is valid"));

pub struct AzureBlobStore {
    client: reqwest::Client,
    credentials: Credentials,
    endpoint: Option<String>,
}

/// One request ready to be signed: the `x-ms-*` headers go into the signature.
struct SignedRequest {
    method: Method,
    url: Url,
    ms_headers: Vec<(String, String)>,
    content_length: u64,
    content_type: Option<&'static str>,
    body: Option<Body>,
}

impl AzureBlobStore {
    pub fn new(credentials: Credentials, endpoint: Option<String>) -> Self {
        AzureBlobStore {
            client: reqwest::Client::new(),
            credentials,
            endpoint,
        }
    }

    fn account_url(&self, account: &str) -> Result<Url> {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.blob.core.windows.net", account),
        };
        Url::parse(&base)
            .map_err(|e| AppError::Config(format!("Invalid blob endpoint '{}': {}", base, e)))
    }

    /// URL of a container, or of a blob inside it, with `query` appended.
    fn resource_url(
        &self,
        account: &str,
        container: &str,
        blob: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Url> {
        let mut url = self.account_url(account)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AppError::Config(format!("Blob endpoint for {} cannot carry a path", account))
            })?;
            segments.pop_if_empty().push(container);
            if let Some(blob) = blob {
                segments.push(blob);
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    async fn send(&self, request: SignedRequest) -> Result<Response> {
        let (account, key) = self.credentials.require()?;
        let key = STANDARD
            .decode(key.trim())
            .map_err(|e| AppError::Config(format!("Storage account key is not valid base64: {}", e)))?;

        let mut ms_headers = request.ms_headers;
        ms_headers.push(("x-ms-date".to_string(), rfc1123_now()));
        ms_headers.push(("x-ms-version".to_string(), API_VERSION.to_string()));

        let to_sign = string_to_sign(
            request.method.as_str(),
            request.content_length,
            request.content_type.unwrap_or(""),
            &ms_headers,
            account,
            &request.url,
        );
        let signature = sign(&key, &to_sign)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &ms_headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("SharedKey {}:{}", account, signature))?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(request.content_length));
        if let Some(content_type) = request.content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        debug!("{} {}", request.method, request.url);
        let mut builder = self
            .client
            .request(request.method, request.url.clone())
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder.send().await.map_err(|e| {
            AppError::Storage(format!("Request to {} failed: {}", request.url.path(), e))
        })
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AppError::Storage(format!("Invalid header name {}: {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Storage(format!("Invalid header value: {}", e)))
}

fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Turns a non-success response into a storage error carrying the service's message.
async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Storage(format!(
        "{} returned {}: {}",
        operation,
        status,
        body.trim()
    )))
}

/// The service error code of a failed response: the `x-ms-error-code` header,
/// falling back to the `<Code>` element of the error body.
pub(crate) fn error_code(headers: &HeaderMap, body: &str) -> Option<String> {
    headers
        .get(ERROR_CODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            ERROR_CODE_RE
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Builds the Shared Key string-to-sign for a blob service request.
pub(crate) fn string_to_sign(
    method: &str,
    content_length: u64,
    content_type: &str,
    ms_headers: &[(String, String)],
    account: &str,
    url: &Url,
) -> String {
    // Content-Length is signed as an empty string when zero.
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let standard: [&str; 12] = [
        method,
        "",      // Content-Encoding
        "",      // Content-Language
        length.as_str(), // Content-Length
        "",      // Content-MD5
        content_type,
        "", // Date
        "", // If-Modified-Since
        "", // If-Match
        "", // If-None-Match
        "", // If-Unmodified-Since
        "", // Range
    ];
    let mut out = standard.join("\n");
    out.push('\n');

    let canonical_headers: BTreeMap<String, &str> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    for (name, value) in canonical_headers {
        out.push_str(&format!("{}:{}\n", name, value));
    }

    out.push_str(&canonical_resource(account, url));
    out
}

fn canonical_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{}:{}", name, values.join(",")));
    }
    resource
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| AppError::Config(format!("Unusable storage account key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Pulls the blob entries and the continuation marker out of a List Blobs page.
pub(crate) fn parse_list_page(xml: &str) -> (Vec<BlobEntry>, Option<String>) {
    let entries = BLOB_RE
        .captures_iter(xml)
        .filter_map(|blob| {
            let inner = blob.get(1)?.as_str();
            let name = NAME_RE.captures(inner)?.get(1)?.as_str();
            let size = LENGTH_RE
                .captures(inner)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok());
            Some(BlobEntry {
                name: unescape_xml(name),
                size,
            })
        })
        .collect();
    let next_marker = NEXT_MARKER_RE
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()));
    (entries, next_marker)
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn ensure_container(&self, container: &str, public_read: bool) -> Result<()> {
        let (account, _) = self.credentials.require()?;
        let url = self.resource_url(account, container, None, &[("restype", "container")])?;
        let mut ms_headers = Vec::new();
        if public_read {
            ms_headers.push(("x-ms-blob-public-access".to_string(), "container".to_string()));
        }

        let response = self
            .send(SignedRequest {
                method: Method::PUT,
                url,
                ms_headers,
                content_length: 0,
                content_type: None,
                body: None,
            })
            .await?;

        // 409 also covers PublicAccessNotPermitted and ContainerBeingDeleted.
        if response.status() == StatusCode::CONFLICT {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            let code = error_code(&headers, &body);
            if code.as_deref() == Some(CONTAINER_ALREADY_EXISTS) {
                debug!("Container {} already exists", container);
                return Ok(());
            }
            return Err(AppError::Storage(format!(
                "Create container {} returned {} ({}): {}",
                container,
                StatusCode::CONFLICT,
                code.as_deref().unwrap_or("no error code"),
                body.trim()
            )));
        }
        check_status(response, &format!("Create container {}", container)).await?;
        info!(
            "Created container {} (public read: {})",
            container, public_read
        );
        Ok(())
    }

    async fn upload(&self, container: &str, blob_name: &str, source: &Path) -> Result<()> {
        let (account, _) = self.credentials.require()?;
        let url = self.resource_url(account, container, Some(blob_name), &[])?;

        let file = File::open(source).await?;
        let length = file.metadata().await?.len();
        info!(
            "Uploading {} ({} bytes) to {}/{}",
            source.display(),
            length,
            container,
            blob_name
        );

        let response = self
            .send(SignedRequest {
                method: Method::PUT,
                url,
                ms_headers: vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())],
                content_length: length,
                content_type: Some(OCTET_STREAM),
                body: Some(Body::wrap_stream(ReaderStream::new(file))),
            })
            .await?;
        check_status(response, &format!("Upload {}/{}", container, blob_name)).await?;
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<BlobEntry>> {
        let (account, _) = self.credentials.require()?;
        let mut entries = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("restype", "container"), ("comp", "list")];
            if let Some(marker) = marker.as_deref() {
                query.push(("marker", marker));
            }
            let url = self.resource_url(account, container, None, &query)?;
            let response = self
                .send(SignedRequest {
                    method: Method::GET,
                    url,
                    ms_headers: Vec::new(),
                    content_length: 0,
                    content_type: None,
                    body: None,
                })
                .await?;
            let response = check_status(response, &format!("List container {}", container)).await?;
            let xml = response
                .text()
                .await
                .map_err(|e| AppError::Storage(format!("Failed to read blob listing: {}", e)))?;

            let (page, next_marker) = parse_list_page(&xml);
            entries.extend(page);
            match next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!("Listed {} blobs in {}", entries.len(), container);
        Ok(entries)
    }

    async fn download(&self, container: &str, blob_name: &str, destination: &Path) -> Result<()> {
        let (account, _) = self.credentials.require()?;
        let url = self.resource_url(account, container, Some(blob_name), &[])?;

        let response = self
            .send(SignedRequest {
                method: Method::GET,
                url,
                ms_headers: Vec::new(),
                content_length: 0,
                content_type: None,
                body: None,
            })
            .await?;
        let response = check_status(response, &format!("Download {}/{}", container, blob_name)).await?;

        let mut output_file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut total_bytes = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::Storage(format!("Failed while downloading {}: {}", blob_name, e))
            })?;
            output_file.write_all(&chunk).await?;
            total_bytes += chunk.len();
        }
        output_file.flush().await?;

        debug!(
            "Downloaded {} bytes from {}/{} to {}",
            total_bytes,
            container,
            blob_name,
            destination.display()
        );
        Ok(())
    }
}
