//! Object-storage remote strategy
//!
//! Uploads a completed local archive to an S3-style bucket. The
//! configuration payload carries the bucket identifier, access credentials
//! (the secret component arrives wrapped in an encrypted-value envelope and
//! is decrypted through the secret store immediately before use), an
//! optional path prefix within the bucket, an optional region, and a map of
//! tags to attach to the uploaded object. The upload key is the prefix
//! joined with the archive's filename.
//!
//! The AWS SDK is asynchronous; each upload drives it to completion on a
//! private current-thread runtime, so the surrounding invocation stays a
//! single synchronous process run.

use std::collections::BTreeMap;
use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::Deserialize;
use tracing::info;
use zeroize::Zeroizing;

use crate::backup::archive::BackupArchive;
use crate::error::{VaultError, VaultResult};
use crate::remote::RemoteStrategy;
use crate::secrets::SecretStore;

/// Configuration payload for the S3 strategy
#[derive(Debug, Deserialize)]
struct S3Configuration {
    /// Target bucket
    bucket_name: String,
    /// Access key id
    access_key: String,
    /// Secret access key, wrapped in an encrypted-value envelope
    secret_key: String,
    /// Path prefix within the bucket; empty means the bucket root
    #[serde(default)]
    bucket_path: String,
    /// Bucket region; falls back to the ambient AWS environment when unset
    #[serde(default)]
    region: Option<String>,
    /// Tags attached to the uploaded object
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Remote strategy uploading archives to an S3-style bucket
pub struct S3Strategy {
    configuration: S3Configuration,
    secret_key: Zeroizing<String>,
}

impl S3Strategy {
    /// Build the strategy from a spec's configuration payload.
    ///
    /// The encrypted secret key is decrypted here, immediately before use.
    pub fn from_configuration(
        configuration: &serde_yaml::Mapping,
        secrets: &dyn SecretStore,
    ) -> VaultResult<Box<dyn RemoteStrategy>> {
        let configuration: S3Configuration =
            serde_yaml::from_value(serde_yaml::Value::Mapping(configuration.clone()))
                .map_err(|e| VaultError::RemoteUpload(format!("Invalid S3 configuration: {}", e)))?;

        let secret_key = secrets.decrypt(&configuration.secret_key).map_err(|e| {
            VaultError::RemoteUpload(format!("Could not decrypt secret_key: {}", e))
        })?;

        Ok(Box::new(Self {
            configuration,
            secret_key,
        }))
    }

    fn object_key(&self, file_name: &str) -> String {
        let prefix = self.configuration.bucket_path.trim_end_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }

    async fn put_object(&self, archive_path: &Path, key: &str) -> VaultResult<()> {
        let credentials = Credentials::new(
            self.configuration.access_key.clone(),
            self.secret_key.to_string(),
            None,
            None,
            "appvault",
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
        if let Some(region) = &self.configuration.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        let body = ByteStream::from_path(archive_path).await.map_err(|e| {
            VaultError::RemoteUpload(format!(
                "Failed to read archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;

        let mut request = client
            .put_object()
            .bucket(&self.configuration.bucket_name)
            .key(key)
            .body(body);
        if !self.configuration.tags.is_empty() {
            request = request.tagging(encode_tags(&self.configuration.tags));
        }

        request.send().await.map_err(|e| {
            VaultError::RemoteUpload(format!(
                "Failed to upload to bucket {}: {}",
                self.configuration.bucket_name, e
            ))
        })?;

        Ok(())
    }
}

impl RemoteStrategy for S3Strategy {
    fn upload(&self, archive: &BackupArchive) -> VaultResult<String> {
        let key = self.object_key(&archive.file_name());

        info!(
            "Uploading {} to bucket [{}] as [{}]",
            archive.path.display(),
            self.configuration.bucket_name,
            key
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VaultError::RemoteUpload(format!("Failed to start runtime: {}", e)))?;

        runtime.block_on(self.put_object(&archive.path, &key))?;

        Ok(format!("s3://{}/{}", self.configuration.bucket_name, key))
    }
}

/// Encode a tag map as an URL-encoded `key=value&key=value` string.
fn encode_tags(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn url_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
