//! HTTP transport for release metadata and archive downloads.
//!
//! Provides a trait-based abstraction over the two network operations the
//! runtime pipeline performs, so retry and verification logic can be tested
//! without network access.

use std::path::Path;
use std::time::Duration;

/// Per-attempt timeout for release-metadata requests.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for each stage of an archive download before the body streams.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(180);

/// Ceiling on streaming one archive body, so slow links still finish.
pub const DOWNLOAD_BODY_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Upper bound on a release-metadata response body.
const METADATA_BODY_LIMIT: u64 = 64 * 1024 * 1024;

/// `Accept` header sent with metadata requests.
pub const METADATA_ACCEPT: &str = "application/vnd.github+json";

/// `User-Agent` header sent with every request.
pub const USER_AGENT: &str = "astrbot-desktop-tauri";

/// Trait for performing release HTTP requests.
///
/// # Examples
///
/// ```
/// use desktop_packager::runtime::transport::UreqTransport;
///
/// let transport = UreqTransport::new();
/// // Use transport.get_metadata(url, token) in production
/// ```
pub trait ReleaseTransport {
    /// Fetch a release-metadata document as text.
    ///
    /// When `token` is present it is sent as a bearer `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, timeout, or a non-2xx status.
    fn get_metadata(&self, url: &str, token: Option<&str>) -> Result<String, TransportError>;

    /// Stream the body at `url` into the file at `dest`.
    ///
    /// The body is never held in memory as a whole.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, timeout, a non-2xx status, or a
    /// failed write.
    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError>;
}

/// Errors arising from a single HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request failed before a status was received, or the body could
    /// not be read.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// Writing the downloaded body failed.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP transport using `ureq`, with separate per-attempt timeouts for
/// metadata and archive requests.
pub struct UreqTransport {
    metadata_agent: ureq::Agent,
    download_agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with the default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(METADATA_TIMEOUT, DOWNLOAD_TIMEOUT)
    }

    /// Create a transport with explicit timeouts.
    ///
    /// `metadata` bounds every stage of a metadata request, body included.
    /// `download` bounds connecting, sending and awaiting the response
    /// headers of a download; the body itself gets [`DOWNLOAD_BODY_TIMEOUT`].
    #[must_use]
    pub fn with_timeouts(metadata: Duration, download: Duration) -> Self {
        Self {
            metadata_agent: agent_with(StageTimeouts::uniform(metadata)),
            download_agent: agent_with(StageTimeouts::streaming(download, DOWNLOAD_BODY_TIMEOUT)),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseTransport for UreqTransport {
    fn get_metadata(&self, url: &str, token: Option<&str>) -> Result<String, TransportError> {
        let mut request = self
            .metadata_agent
            .get(url)
            .header("Accept", METADATA_ACCEPT)
            .header("User-Agent", USER_AGENT);
        if let Some(value) = token {
            request = request.header("Authorization", format!("Bearer {value}"));
        }
        let mut response = request.call().map_err(|e| map_ureq_error(url, &e))?;
        response
            .body_mut()
            .with_config()
            .limit(METADATA_BODY_LIMIT)
            .read_to_string()
            .map_err(|e| TransportError::Http {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError> {
        let response = self
            .download_agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(|e| {
            TransportError::Http {
                url: url.to_owned(),
                reason: e.to_string(),
            }
        })?;
        file.sync_all()?;
        Ok(())
    }
}

/// Per-stage request timeouts; there is no whole-request cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StageTimeouts {
    connect: Duration,
    response: Duration,
    body: Duration,
}

impl StageTimeouts {
    const fn uniform(timeout: Duration) -> Self {
        Self::streaming(timeout, timeout)
    }

    const fn streaming(timeout: Duration, body: Duration) -> Self {
        Self {
            connect: timeout,
            response: timeout,
            body,
        }
    }
}

fn agent_with(timeouts: StageTimeouts) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(timeouts.connect))
        .timeout_send_request(Some(timeouts.response))
        .timeout_recv_response(Some(timeouts.response))
        .timeout_recv_body(Some(timeouts.body))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Map a ureq error to a [`TransportError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(status) => TransportError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => TransportError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(404)]
    #[case::server_error(502)]
    fn map_ureq_error_keeps_status(#[case] status: u16) {
        let err = ureq::Error::StatusCode(status);
        let mapped = map_ureq_error("https://example.test/asset", &err);
        assert!(
            matches!(mapped, TransportError::Status { status: s, .. } if s == status),
            "unexpected mapping: {mapped:?}"
        );
    }

    #[test]
    fn map_ureq_error_maps_other_errors_to_http() {
        let err = ureq::Error::HostNotFound;
        let mapped = map_ureq_error("https://example.test/asset", &err);
        assert!(matches!(mapped, TransportError::Http { .. }));
    }

    #[test]
    fn download_body_outlasts_the_stage_timeout() {
        let timeouts = StageTimeouts::streaming(DOWNLOAD_TIMEOUT, DOWNLOAD_BODY_TIMEOUT);
        assert_eq!(timeouts.connect, DOWNLOAD_TIMEOUT);
        assert_eq!(timeouts.response, DOWNLOAD_TIMEOUT);
        assert!(timeouts.body > DOWNLOAD_TIMEOUT);
    }

    #[test]
    fn metadata_stages_share_one_timeout() {
        let timeouts = StageTimeouts::uniform(METADATA_TIMEOUT);
        assert_eq!(
            timeouts,
            StageTimeouts {
                connect: METADATA_TIMEOUT,
                response: METADATA_TIMEOUT,
                body: METADATA_TIMEOUT,
            }
        );
    }

    #[test]
    fn status_error_names_url_and_code() {
        let err = TransportError::Status {
            url: "https://example.test/a".to_owned(),
            status: 503,
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.test/a"));
        assert!(msg.contains("503"));
    }
}
