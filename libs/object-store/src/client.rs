//! Builds the S3-compatible object store client from configuration.

use std::sync::Arc;

use core_config::object_store::ObjectStoreConfig;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;

use crate::error::{ReaderError, ReaderResult};

/// Build an `Arc<dyn ObjectStore>` for `config`.
///
/// Works against AWS S3 itself as well as MinIO-style S3-compatible
/// endpoints (`config.endpoint` + `config.allow_http`), since both speak the
/// same API and `object_store::aws` only needs the endpoint overridden.
pub fn build_store(config: &ObjectStoreConfig) -> ReaderResult<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_allow_http(config.allow_http);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if let Some(access_key_id) = &config.access_key_id {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = &config.secret_access_key {
        builder = builder.with_secret_access_key(secret_access_key);
    }

    let store = builder
        .build()
        .map_err(|err| ReaderError::Config(err.to_string()))?;

    Ok(Arc::new(store))
}

/// True when an object-store error's message looks like a credential
/// rejection rather than a transient network fault, so the caller can
/// classify it as `ReaderError::Auth` instead of retrying. Takes the
/// rendered error message rather than a concrete error type since both
/// `object_store::Error` and the `parquet::errors::ParquetError` it gets
/// wrapped in by the async Parquet reader need the same check.
pub fn is_auth_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("403")
        || message.contains("401")
        || message.contains("invalidaccesskeyid")
        || message.contains("signaturedoesnotmatch")
        || message.contains("accessdenied")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_store_requires_a_bucket_name() {
        let config = ObjectStoreConfig {
            endpoint: None,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
            max_retries: 3,
        };

        assert!(build_store(&config).is_err());
    }

    #[test]
    fn build_store_succeeds_for_minio_style_endpoint() {
        let config = ObjectStoreConfig {
            endpoint: Some("http://minio.local:9000".to_string()),
            bucket: "usage-data".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: Some("minioadmin".to_string()),
            secret_access_key: Some("minioadmin".to_string()),
            allow_http: true,
            max_retries: 3,
        };

        assert!(build_store(&config).is_ok());
    }

    #[test]
    fn is_auth_error_recognizes_common_rejection_messages() {
        assert!(is_auth_error("403 Forbidden"));
        assert!(is_auth_error("request failed: AccessDenied"));
        assert!(is_auth_error("SignatureDoesNotMatch"));
        assert!(!is_auth_error("connection reset by peer"));
        assert!(!is_auth_error("timed out waiting for response"));
    }
}
