//! Configuration for the S3-compatible object store partitioned input data
//! is read from.

use crate::{env_or_default, env_required, ConfigError, FromEnv};

/// Connection details for the bucket holding partitioned input tables.
///
/// `allow_http` exists for MinIO-style or in-cluster S3-compatible
/// endpoints that are not fronted by TLS; it is never set for AWS S3
/// itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
    /// Transient I/O faults are retried up to this many times with
    /// exponential backoff (spec §4.1) before surfacing as a fatal
    /// `ReaderError::Io`.
    pub max_retries: u32,
}

impl FromEnv for ObjectStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let endpoint = std::env::var("OBJECT_STORE_ENDPOINT").ok();
        let bucket = env_required("OBJECT_STORE_BUCKET")?;
        let region = env_or_default("OBJECT_STORE_REGION", "us-east-1");
        let access_key_id = std::env::var("OBJECT_STORE_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("OBJECT_STORE_SECRET_ACCESS_KEY").ok();

        let allow_http = env_or_default("OBJECT_STORE_ALLOW_HTTP", "false")
            .parse::<bool>()
            .map_err(|e| ConfigError::ParseError {
                key: "OBJECT_STORE_ALLOW_HTTP".to_string(),
                details: e.to_string(),
            })?;

        let max_retries = env_or_default("OBJECT_STORE_MAX_RETRIES", "3")
            .parse::<u32>()
            .map_err(|e| ConfigError::ParseError {
                key: "OBJECT_STORE_MAX_RETRIES".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            endpoint,
            bucket,
            region,
            access_key_id,
            secret_access_key,
            allow_http,
            max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults_region_and_allow_http() {
        temp_env::with_vars(
            [
                ("OBJECT_STORE_ENDPOINT", None),
                ("OBJECT_STORE_BUCKET", Some("usage-data")),
                ("OBJECT_STORE_REGION", None),
                ("OBJECT_STORE_ALLOW_HTTP", None),
            ],
            || {
                let cfg = ObjectStoreConfig::from_env().unwrap();
                assert_eq!(cfg.bucket, "usage-data");
                assert_eq!(cfg.region, "us-east-1");
                assert!(!cfg.allow_http);
                assert!(cfg.endpoint.is_none());
                assert_eq!(cfg.max_retries, 3);
            },
        );
    }

    #[test]
    fn from_env_reads_custom_max_retries() {
        temp_env::with_vars(
            [
                ("OBJECT_STORE_BUCKET", Some("usage-data")),
                ("OBJECT_STORE_MAX_RETRIES", Some("5")),
            ],
            || {
                let cfg = ObjectStoreConfig::from_env().unwrap();
                assert_eq!(cfg.max_retries, 5);
            },
        );
    }

    #[test]
    fn from_env_reads_minio_style_endpoint() {
        temp_env::with_vars(
            [
                ("OBJECT_STORE_ENDPOINT", Some("http://minio.local:9000")),
                ("OBJECT_STORE_BUCKET", Some("usage-data")),
                ("OBJECT_STORE_ALLOW_HTTP", Some("true")),
            ],
            || {
                let cfg = ObjectStoreConfig::from_env().unwrap();
                assert_eq!(cfg.endpoint.as_deref(), Some("http://minio.local:9000"));
                assert!(cfg.allow_http);
            },
        );
    }

    #[test]
    fn from_env_missing_bucket_errors() {
        temp_env::with_var_unset("OBJECT_STORE_BUCKET", || {
            assert!(matches!(
                ObjectStoreConfig::from_env(),
                Err(ConfigError::MissingEnvVar(_))
            ));
        });
    }
}
