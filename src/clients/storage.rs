//! S3-compatible object storage client.
//!
//! Talks plain HTTP to any SigV4-speaking endpoint (AWS S3, MinIO, …)
//! using path-style addressing. The service only ever needs three calls,
//! so the surface is a narrow trait that the rest of the code — and the
//! tests — depend on instead of the concrete client.

use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use crate::config::StorageConfig;
use crate::security::redact::redact;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage request failed: {0}")]
    Transport(String),

    #[error("object storage rejected the request with status {0}")]
    Rejected(u16),

    #[error("object storage is misconfigured: {0}")]
    Config(String),
}

/// The contract the service consumes. Keys are generated by the caller;
/// the original filename never becomes a storage key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores an object and returns its public URL.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Cheap reachability probe used by the health endpoint.
    async fn head_bucket(&self) -> bool;
}

pub struct S3Client {
    http: Client,
    endpoint: Url,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
}

impl S3Client {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Config(format!("invalid endpoint: {e}")))?;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let path = format!("/{}/{}", self.bucket, key);
        self.endpoint
            .join(&path)
            .map_err(|e| StorageError::Config(format!("invalid object key '{key}': {e}")))
    }

    fn bucket_url(&self) -> Result<Url, StorageError> {
        self.endpoint
            .join(&format!("/{}", self.bucket))
            .map_err(|e| StorageError::Config(format!("invalid bucket name: {e}")))
    }

    async fn send_signed(
        &self,
        method: reqwest::Method,
        url: Url,
        body: Option<(Bytes, &str)>,
    ) -> Result<reqwest::Response, StorageError> {
        let now = chrono::Utc::now();
        let payload = body.as_ref().map_or(&[][..], |(bytes, _)| bytes.as_ref());

        let signed = sign_request(&SigningInput {
            method: method.as_str(),
            url: &url,
            region: &self.region,
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            payload,
            timestamp: &now,
        });

        let mut request = self
            .http
            .request(method, url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("authorization", &signed.authorization);

        if let Some((bytes, content_type)) = body {
            request = request
                .header("content-type", content_type)
                .body(bytes);
        }

        request.send().await.map_err(|e| {
            // Transport errors can echo the request URL, so scrub them
            StorageError::Transport(redact(&e.to_string()))
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Client {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = self.object_url(key)?;
        let public_url = url.to_string();

        let response = self
            .send_signed(reqwest::Method::PUT, url, Some((body, content_type)))
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Rejected(response.status().as_u16()));
        }

        Ok(public_url)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(key)?;
        let response = self
            .send_signed(reqwest::Method::DELETE, url, None)
            .await?;

        // S3 answers 204 for deletes, including of absent keys
        if !response.status().is_success() {
            return Err(StorageError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }

    async fn head_bucket(&self) -> bool {
        let Ok(url) = self.bucket_url() else {
            return false;
        };

        match self.send_signed(reqwest::Method::HEAD, url, None).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

struct SigningInput<'a> {
    method: &'a str,
    url: &'a Url,
    region: &'a str,
    access_key: &'a str,
    secret_key: &'a str,
    payload: &'a [u8],
    timestamp: &'a chrono::DateTime<chrono::Utc>,
}

struct SignedRequest {
    amz_date: String,
    payload_hash: String,
    authorization: String,
}

fn sign_request(input: &SigningInput<'_>) -> SignedRequest {
    let amz_date = input.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let date = input.timestamp.format("%Y%m%d").to_string();
    let payload_hash = hex_sha256(input.payload);

    let host = host_header(input.url);
    let canonical_uri = canonical_uri(input.url);
    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method, canonical_uri, "", canonical_headers, signed_headers, payload_hash
    );

    let scope = format!("{date}/{}/s3/aws4_request", input.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(input.secret_key, &date, input.region);
    let signature = hex_encode(&hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        input.access_key
    );

    SignedRequest {
        amz_date,
        payload_hash,
        authorization,
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    // Non-default ports are part of the Host header and must be signed
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(uri_encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// AWS-style URI encoding: unreserved characters stay, everything else
/// becomes uppercase percent escapes.
fn uri_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn derive_signing_key(secret_key: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_sha256(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut acc, byte| {
            use std::fmt::Write;
            let _ = write!(acc, "{byte:02x}");
            acc
        },
    )
}
