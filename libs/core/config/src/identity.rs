//! Identity of a single aggregation run: which source, and which billing
//! period, the run covers. This is the scope every partition path, output
//! row, and truncate-before-write operates within.

use uuid::Uuid;

use crate::{env_required, ConfigError, FromEnv};

/// Identifies the source system, cluster, and billing period a run
/// produces output rows for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunIdentity {
    pub source_uuid: Uuid,
    pub cluster_id: String,
    pub cluster_alias: Option<String>,
    pub org_id: String,
    pub year: i32,
    pub month: u32,
}

impl FromEnv for RunIdentity {
    fn from_env() -> Result<Self, ConfigError> {
        let source_uuid =
            env_required("SOURCE_UUID")?
                .parse::<Uuid>()
                .map_err(|e| ConfigError::ParseError {
                    key: "SOURCE_UUID".to_string(),
                    details: e.to_string(),
                })?;

        let cluster_id = env_required("CLUSTER_ID")?;
        let cluster_alias = std::env::var("CLUSTER_ALIAS").ok();
        let org_id = env_required("ORG_ID")?;

        let year = env_required("REPORT_YEAR")?
            .parse::<i32>()
            .map_err(|e| ConfigError::ParseError {
                key: "REPORT_YEAR".to_string(),
                details: e.to_string(),
            })?;

        let month = env_required("REPORT_MONTH")?
            .parse::<u32>()
            .map_err(|e| ConfigError::ParseError {
                key: "REPORT_MONTH".to_string(),
                details: e.to_string(),
            })?;

        if !(1..=12).contains(&month) {
            return Err(ConfigError::ParseError {
                key: "REPORT_MONTH".to_string(),
                details: format!("must be in 1..=12, got {month}"),
            });
        }

        Ok(Self {
            source_uuid,
            cluster_id,
            cluster_alias,
            org_id,
            year,
            month,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_parses_required_and_optional_fields() {
        temp_env::with_vars(
            [
                ("SOURCE_UUID", Some("123e4567-e89b-12d3-a456-426614174000")),
                ("CLUSTER_ID", Some("cluster-1")),
                ("CLUSTER_ALIAS", Some("my-cluster")),
                ("ORG_ID", Some("org-1")),
                ("REPORT_YEAR", Some("2026")),
                ("REPORT_MONTH", Some("7")),
            ],
            || {
                let identity = RunIdentity::from_env().unwrap();
                assert_eq!(identity.cluster_id, "cluster-1");
                assert_eq!(identity.cluster_alias.as_deref(), Some("my-cluster"));
                assert_eq!(identity.year, 2026);
                assert_eq!(identity.month, 7);
            },
        );
    }

    #[test]
    fn from_env_rejects_month_out_of_range() {
        temp_env::with_vars(
            [
                ("SOURCE_UUID", Some("123e4567-e89b-12d3-a456-426614174000")),
                ("CLUSTER_ID", Some("cluster-1")),
                ("CLUSTER_ALIAS", None),
                ("ORG_ID", Some("org-1")),
                ("REPORT_YEAR", Some("2026")),
                ("REPORT_MONTH", Some("13")),
            ],
            || {
                assert!(RunIdentity::from_env().is_err());
            },
        );
    }

    #[test]
    fn from_env_missing_required_var_errors() {
        temp_env::with_var_unset("SOURCE_UUID", || {
            assert!(matches!(
                RunIdentity::from_env(),
                Err(ConfigError::MissingEnvVar(_))
            ));
        });
    }
}
