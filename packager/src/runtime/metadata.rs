//! Trusted digest resolution from release metadata.
//!
//! The release API record is the trust anchor for the runtime archive: its
//! `assets[].digest` field is fetched independently of the archive bytes and
//! is the only digest the verifier accepts. Malformed metadata is never
//! retried, since retrying cannot repair a trust failure.

use super::asset::ReleaseAsset;
use super::digest::{DigestRecord, InvalidDigest};
use super::transport::{ReleaseTransport, TransportError};
use crate::retry::{RetryPolicy, Sleeper};
use serde_json::Value;

/// Errors arising from digest resolution.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Every attempt to fetch the metadata failed.
    #[error("failed to fetch release metadata from {url} after {attempts} attempt(s)")]
    FetchFailed {
        /// The metadata URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: TransportError,
    },

    /// The response was not valid JSON.
    #[error("release metadata is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The response has no `assets` list.
    #[error("invalid release metadata: missing assets list")]
    MissingAssets,

    /// No asset descriptor carries the requested name.
    #[error("release {release} has no asset named {asset}")]
    AssetNotFound {
        /// The release that was queried.
        release: String,
        /// The requested asset name.
        asset: String,
    },

    /// The asset has no usable `sha256:` digest.
    #[error("release metadata does not provide a sha256 digest for asset {asset}")]
    DigestUnavailable {
        /// The asset whose digest is missing.
        asset: String,
    },

    /// The asset declares a sha256 digest that is not valid hex.
    #[error("release metadata digest for asset {asset} is malformed: {source}")]
    MalformedDigest {
        /// The asset whose digest is malformed.
        asset: String,
        /// The validation failure.
        #[source]
        source: InvalidDigest,
    },
}

/// Resolves the trusted digest for a release asset.
pub struct DigestResolver<'a> {
    transport: &'a dyn ReleaseTransport,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
    token: Option<&'a str>,
}

impl<'a> DigestResolver<'a> {
    /// Create a resolver using the default retry policy and no token.
    #[must_use]
    pub fn new(transport: &'a dyn ReleaseTransport, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::default(),
            token: None,
        }
    }

    /// Use `policy` for metadata requests.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Authenticate metadata requests with a bearer `token`.
    #[must_use]
    pub const fn with_token(mut self, token: Option<&'a str>) -> Self {
        self.token = token;
        self
    }

    /// Fetch the release metadata and return the digest published for `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::FetchFailed`] once the retry budget is spent,
    /// or a format error when the metadata cannot supply a sha256 digest.
    pub fn resolve(&self, asset: &ReleaseAsset) -> Result<DigestRecord, MetadataError> {
        let url = asset.metadata_url();
        log::debug!("resolving digest for {asset} from {url}");
        let body = self
            .policy
            .run(self.sleeper, |_| self.transport.get_metadata(&url, self.token))
            .map_err(|exhausted| MetadataError::FetchFailed {
                url: url.clone(),
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })?;
        select_digest(&body, asset.release(), asset.name())
    }
}

/// Extract the digest for `asset_name` from a release-metadata document.
///
/// # Errors
///
/// Returns a [`MetadataError`] describing why the document cannot supply a
/// trusted sha256 digest for the asset.
///
/// # Examples
///
/// ```
/// use desktop_packager::runtime::metadata::select_digest;
///
/// let hex = "ab".repeat(32);
/// let body = format!(r#"{{"assets": [{{"name": "a.tar.gz", "digest": "sha256:{hex}"}}]}}"#);
/// let record = select_digest(&body, "20250918", "a.tar.gz").expect("digest present");
/// assert_eq!(record.digest().as_str(), hex);
/// ```
pub fn select_digest(
    body: &str,
    release: &str,
    asset_name: &str,
) -> Result<DigestRecord, MetadataError> {
    let document: Value = serde_json::from_str(body)?;
    let assets = document
        .get("assets")
        .and_then(Value::as_array)
        .ok_or(MetadataError::MissingAssets)?;

    let descriptor = assets
        .iter()
        .filter_map(Value::as_object)
        .find(|item| item.get("name").and_then(Value::as_str) == Some(asset_name))
        .ok_or_else(|| MetadataError::AssetNotFound {
            release: release.to_owned(),
            asset: asset_name.to_owned(),
        })?;

    let unavailable = || MetadataError::DigestUnavailable {
        asset: asset_name.to_owned(),
    };
    let raw = descriptor
        .get("digest")
        .and_then(Value::as_str)
        .ok_or_else(unavailable)?;
    DigestRecord::from_prefixed(raw)
        .ok_or_else(unavailable)?
        .map_err(|source| MetadataError::MalformedDigest {
            asset: asset_name.to_owned(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingSleeper, Scripted, ScriptedTransport, release_metadata_json};
    use rstest::{fixture, rstest};
    use std::time::Duration;

    const ASSET: &str = "cpython-3.12.11+20250918-x86_64-unknown-linux-gnu-install_only_stripped.tar.gz";

    #[fixture]
    fn asset() -> ReleaseAsset {
        ReleaseAsset::runtime("20250918", "3.12.11", "x86_64-unknown-linux-gnu")
    }

    #[test]
    fn select_digest_lowercases_hex() {
        let body = release_metadata_json(ASSET, &format!("sha256:{}", "AB".repeat(32)));
        let record = select_digest(&body, "20250918", ASSET).expect("digest");
        assert_eq!(record.digest().as_str(), "ab".repeat(32));
    }

    #[rstest]
    #[case::not_json("not json")]
    #[case::no_assets(r#"{"tag_name": "x"}"#)]
    #[case::assets_not_list(r#"{"assets": {"name": "x"}}"#)]
    fn select_digest_rejects_malformed_documents(#[case] body: &str) {
        let result = select_digest(body, "20250918", ASSET);
        assert!(
            matches!(
                result,
                Err(MetadataError::InvalidJson(_) | MetadataError::MissingAssets)
            ),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn select_digest_requires_exact_name() {
        let body = release_metadata_json(&format!("{ASSET}.sha256"), "sha256:00");
        let result = select_digest(&body, "20250918", ASSET);
        assert!(matches!(result, Err(MetadataError::AssetNotFound { .. })));
    }

    #[test]
    fn select_digest_skips_non_object_entries() {
        let hex = "1".repeat(64);
        let body = format!(r#"{{"assets": [42, "x", {{"name": "{ASSET}", "digest": "sha256:{hex}"}}]}}"#);
        let record = select_digest(&body, "20250918", ASSET).expect("digest");
        assert_eq!(record.digest().as_str(), hex);
    }

    #[rstest]
    #[case::missing(r#"{"assets": [{"name": "NAME"}]}"#)]
    #[case::null(r#"{"assets": [{"name": "NAME", "digest": null}]}"#)]
    #[case::wrong_algorithm(r#"{"assets": [{"name": "NAME", "digest": "md5:abc"}]}"#)]
    fn select_digest_requires_sha256_prefix(#[case] template: &str) {
        let body = template.replace("NAME", ASSET);
        let result = select_digest(&body, "20250918", ASSET);
        assert!(matches!(result, Err(MetadataError::DigestUnavailable { .. })));
    }

    #[test]
    fn select_digest_rejects_malformed_hex() {
        let body = release_metadata_json(ASSET, "sha256:xyz");
        let result = select_digest(&body, "20250918", ASSET);
        assert!(matches!(result, Err(MetadataError::MalformedDigest { .. })));
    }

    #[rstest]
    fn resolve_retries_then_succeeds(asset: ReleaseAsset) {
        let hex = "e".repeat(64);
        let transport = ScriptedTransport::new()
            .with_metadata(Scripted::Unreachable)
            .with_metadata(Scripted::Status(502))
            .with_metadata(Scripted::Ok(release_metadata_json(
                ASSET,
                &format!("sha256:{hex}"),
            )));
        let sleeper = RecordingSleeper::default();

        let record = DigestResolver::new(&transport, &sleeper)
            .with_token(Some("secret"))
            .resolve(&asset)
            .expect("third attempt succeeds");

        assert_eq!(record.digest().as_str(), hex);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|(url, token)| {
            url.ends_with("/releases/tags/20250918") && token.as_deref() == Some("secret")
        }));
    }

    #[rstest]
    fn resolve_gives_up_after_budget(asset: ReleaseAsset) {
        let transport = ScriptedTransport::new()
            .with_metadata(Scripted::Status(500))
            .with_metadata(Scripted::Status(500))
            .with_metadata(Scripted::Status(500))
            .with_metadata(Scripted::Ok(release_metadata_json(ASSET, "sha256:00")));
        let sleeper = RecordingSleeper::default();

        let result = DigestResolver::new(&transport, &sleeper).resolve(&asset);

        assert!(matches!(
            result,
            Err(MetadataError::FetchFailed { attempts: 3, .. })
        ));
        assert_eq!(transport.requests().len(), 3);
    }

    #[rstest]
    fn resolve_does_not_retry_format_errors(asset: ReleaseAsset) {
        let transport = ScriptedTransport::new()
            .with_metadata(Scripted::Ok(r#"{"assets": []}"#.to_owned()))
            .with_metadata(Scripted::Ok(release_metadata_json(ASSET, "sha256:00")));
        let sleeper = RecordingSleeper::default();

        let result = DigestResolver::new(&transport, &sleeper).resolve(&asset);

        assert!(matches!(result, Err(MetadataError::AssetNotFound { .. })));
        assert_eq!(transport.requests().len(), 1);
        assert!(sleeper.delays().is_empty());
    }
}
