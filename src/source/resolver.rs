//! Source resolution: turns a tool's document source into raw PDF bytes

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use base64::Engine;
use futures_util::StreamExt;
use schemars::JsonSchema;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

const URL_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a document comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum DocumentSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download PDF from
    Url {
        /// URL of the PDF file
        url: String,
    },
    /// Reference to a document decoded by an earlier call
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for DocumentSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let value = serde_json::Value::deserialize(deserializer)?;
        let Some(obj) = value.as_object() else {
            return Err(D::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", \"url\", or \"cache_key\", but got {}",
                json_kind(&value)
            )));
        };

        let field = |name: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(name) {
                None => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(D::Error::custom(format!("\"{}\" must be a string", name))),
            }
        };

        if let Some(path) = field("path")? {
            return Ok(DocumentSource::Path { path });
        }
        if let Some(base64) = field("base64")? {
            return Ok(DocumentSource::Base64 { base64 });
        }
        if let Some(url) = field("url")? {
            return Ok(DocumentSource::Url { url });
        }
        if let Some(cache_key) = field("cache_key")? {
            return Ok(DocumentSource::CacheRef { cache_key });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(D::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", \"url\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Null => "null",
        serde_json::Value::Object(_) => "an object",
    }
}

impl DocumentSource {
    /// Display name used in tool results; never echoes base64 payloads
    pub fn display_name(&self) -> String {
        match self {
            DocumentSource::Path { path } => path.clone(),
            DocumentSource::Base64 { .. } => "<base64>".to_string(),
            DocumentSource::Url { url } => url.clone(),
            DocumentSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }
}

/// Raw bytes of a resolved document
#[derive(Debug)]
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

fn ensure_pdf_header(data: &[u8], what: &str) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: format!("{} is not a valid PDF file", what),
        });
    }
    Ok(())
}

/// Fetches document bytes under the server's sandbox and download policy
#[derive(Debug, Clone)]
pub struct SourceResolver {
    resource_dirs: Vec<String>,
    allow_private_urls: bool,
    max_download_bytes: u64,
}

impl SourceResolver {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            resource_dirs: config.resource_dirs.clone(),
            allow_private_urls: config.allow_private_urls,
            max_download_bytes: config.max_download_bytes,
        }
    }

    /// Resolve a byte-carrying source. Cache references are handled by the
    /// caller and are rejected here.
    pub async fn resolve(&self, source: &DocumentSource) -> Result<ResolvedPdf> {
        match source {
            DocumentSource::Path { path } => self.resolve_path(path),
            DocumentSource::Base64 { base64 } => resolve_base64(base64),
            DocumentSource::Url { url } => self.resolve_url(url).await,
            DocumentSource::CacheRef { cache_key } => Err(Error::SourceResolution {
                reason: format!("cache reference {} has no raw bytes", cache_key),
            }),
        }
    }

    /// Check that `path` lies inside a configured resource directory.
    /// With no resource directories configured every path is allowed.
    pub fn check_path_access(&self, path: &str) -> Result<PathBuf> {
        if self.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        let allowed = self.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|dir| canonical.starts_with(dir))
                .unwrap_or(false)
        });
        if allowed {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    fn resolve_path(&self, path: &str) -> Result<ResolvedPdf> {
        let checked = self.check_path_access(path)?;
        let file: &Path = checked.as_ref();

        if !file.exists() {
            return Err(Error::PdfNotFound {
                path: path.to_string(),
            });
        }

        let data = std::fs::read(file)?;
        ensure_pdf_header(&data, "File")?;

        Ok(ResolvedPdf {
            data,
            source_name: path.to_string(),
        })
    }

    async fn resolve_url(&self, url: &str) -> Result<ResolvedPdf> {
        // Redirects would bypass the host check, so they surface as errors
        let mut builder = reqwest::Client::builder()
            .timeout(URL_FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none());
        if !self.allow_private_urls {
            // Connect only to the addresses that passed the check
            let (host, addrs) = public_host_addrs(url).await?;
            builder = builder.resolve_to_addrs(&host, &addrs);
        }

        let client = builder.build()?;
        let response = client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::SourceResolution {
                reason: format!("HTTP request failed with status: {}", response.status()),
            });
        }

        let limit = self.max_download_bytes;
        let too_large = |size: u64| Error::DownloadTooLarge {
            size,
            max_size: limit,
        };
        if let Some(declared) = response.content_length().filter(|&len| len > limit) {
            return Err(too_large(declared));
        }

        // Count bytes as they arrive; Content-Length may be absent or wrong
        let mut data = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
            if data.len() as u64 > limit {
                return Err(too_large(data.len() as u64));
            }
        }

        ensure_pdf_header(&data, "Downloaded data")?;
        tracing::debug!(bytes = data.len(), "document downloaded");

        Ok(ResolvedPdf {
            data,
            source_name: url.to_string(),
        })
    }
}

/// Decode base64 PDF data
pub fn resolve_base64(encoded: &str) -> Result<ResolvedPdf> {
    let data = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    ensure_pdf_header(&data, "Decoded data")?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}

/// Loopback, private, link-local, CGNAT and other non-routable addresses
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00
                || (first & 0xFFC0) == 0xFE80
        }
    }
}

/// Resolve the URL's host and refuse it if any address is non-public.
/// Returns the host with the vetted addresses.
async fn public_host_addrs(url: &str) -> Result<(String, Vec<SocketAddr>)> {
    let parsed = url::Url::parse(url).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;
    let port = parsed.port_or_known_default().unwrap_or(443);

    let (host, addrs) = match parsed.host() {
        Some(url::Host::Domain(domain)) => {
            let addrs = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| Error::SourceResolution {
                    reason: format!("DNS resolution failed for {}: {}", domain, e),
                })?
                .collect();
            (domain.to_string(), addrs)
        }
        Some(url::Host::Ipv4(ip)) => (ip.to_string(), vec![SocketAddr::new(ip.into(), port)]),
        Some(url::Host::Ipv6(ip)) => (ip.to_string(), vec![SocketAddr::new(ip.into(), port)]),
        None => {
            return Err(Error::SourceResolution {
                reason: "URL has no host".to_string(),
            })
        }
    };

    if addrs.is_empty() || addrs.iter().any(|addr| is_private_ip(&addr.ip())) {
        return Err(Error::SsrfBlocked {
            url: url.to_string(),
        });
    }
    Ok((host, addrs))
}
