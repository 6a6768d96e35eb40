use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PROJECT_NAME: &str = "s3-metadata-indexer";
pub const DEFAULT_REGION: &str = "eu-central-1";
/// Region in which S3 rejects an explicit location constraint.
pub const PROVIDER_DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ARTIFACT_PATH: &str = "dist/metadata_indexer.zip";

pub const TABLE_NAME_ENV: &str = "TABLE_NAME";
pub const PROJECT_NAME_ENV: &str = "INDEXER_PROJECT_NAME";
pub const REGION_ENV: &str = "INDEXER_REGION";
pub const ROLE_SETTLE_SECS_ENV: &str = "INDEXER_ROLE_SETTLE_SECS";
pub const PERMISSION_SETTLE_SECS_ENV: &str = "INDEXER_PERMISSION_SETTLE_SECS";
pub const ARTIFACT_PATH_ENV: &str = "INDEXER_ARTIFACT_PATH";

const MAX_BUCKET_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid project name `{name}`: {reason}")]
    InvalidProjectName { name: String, reason: &'static str },
    #[error("region must not be empty")]
    EmptyRegion,
    #[error("{key} must be a whole number of seconds, got `{value}`")]
    InvalidSeconds { key: &'static str, value: String },
    #[error("{0} must be configured")]
    Missing(&'static str),
}

/// Wait discipline for an eventually-consistent grant.
///
/// `settle_delay` is slept once right after the grant is first made. The
/// dependent call is then retried every `retry_interval` for as long as the
/// service keeps reporting the grant as not yet visible, up to
/// `retry_timeout` of accumulated waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPolicy {
    pub settle_delay: Duration,
    pub retry_interval: Duration,
    pub retry_timeout: Duration,
}

impl PropagationPolicy {
    pub fn role_default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            retry_interval: Duration::from_secs(3),
            retry_timeout: Duration::from_secs(60),
        }
    }

    pub fn permission_default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            retry_interval: Duration::from_secs(2),
            retry_timeout: Duration::from_secs(30),
        }
    }

    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            retry_interval: Duration::ZERO,
            retry_timeout: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for TablePollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSettings {
    pub runtime: String,
    pub handler: String,
    pub timeout_secs: i32,
    pub memory_mb: i32,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            runtime: "provided.al2023".to_string(),
            handler: "bootstrap".to_string(),
            timeout_secs: 15,
            memory_mb: 128,
        }
    }
}

/// Immutable description of the one pipeline this tool manages.
///
/// Every resource name is derived from the project name, so provisioning and
/// cleanup always agree on what they are operating on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub project: String,
    pub region: String,
    pub bucket_name: String,
    pub table_name: String,
    pub function_name: String,
    pub role_name: String,
    pub partition_key: String,
    pub artifact_path: PathBuf,
    pub role_propagation: PropagationPolicy,
    pub permission_propagation: PropagationPolicy,
    pub table_poll: TablePollPolicy,
    pub function: FunctionSettings,
}

impl PipelineConfig {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Result<Self, ConfigError> {
        let project = project.into();
        let region = region.into();
        validate_project_name(&project)?;
        if region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }

        Ok(Self {
            bucket_name: format!("{project}-bucket-v2"),
            table_name: format!("{project}-table"),
            function_name: format!("{project}-func"),
            role_name: format!("{project}-role"),
            partition_key: "file_name".to_string(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            role_propagation: PropagationPolicy::role_default(),
            permission_propagation: PropagationPolicy::permission_default(),
            table_poll: TablePollPolicy::default(),
            function: FunctionSettings::default(),
            project,
            region,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults overlaid with whatever `lookup`
    /// returns for the `INDEXER_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let project = lookup(PROJECT_NAME_ENV).unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        let region = lookup(REGION_ENV).unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut config = Self::new(project, region)?;

        if let Some(value) = lookup(ROLE_SETTLE_SECS_ENV) {
            config.role_propagation.settle_delay = parse_seconds(ROLE_SETTLE_SECS_ENV, &value)?;
        }
        if let Some(value) = lookup(PERMISSION_SETTLE_SECS_ENV) {
            config.permission_propagation.settle_delay =
                parse_seconds(PERMISSION_SETTLE_SECS_ENV, &value)?;
        }
        if let Some(value) = lookup(ARTIFACT_PATH_ENV) {
            config.artifact_path = PathBuf::from(value);
        }

        Ok(config)
    }

    pub fn with_role_propagation(mut self, policy: PropagationPolicy) -> Self {
        self.role_propagation = policy;
        self
    }

    pub fn with_permission_propagation(mut self, policy: PropagationPolicy) -> Self {
        self.permission_propagation = policy;
        self
    }

    pub fn with_table_poll(mut self, policy: TablePollPolicy) -> Self {
        self.table_poll = policy;
        self
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket_name)
    }

    pub fn trigger_statement_id(&self) -> String {
        format!("s3-trigger-permission-{}", self.bucket_name)
    }

    pub fn location_constraint(&self) -> Option<&str> {
        location_constraint_for(&self.region)
    }
}

/// S3 requires a location constraint everywhere except the provider default
/// region, where supplying one is rejected.
pub fn location_constraint_for(region: &str) -> Option<&str> {
    if region == PROVIDER_DEFAULT_REGION {
        None
    } else {
        Some(region)
    }
}

/// Settings the indexer function reads once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSettings {
    pub table_name: String,
}

impl IndexerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let table_name = lookup(TABLE_NAME_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(TABLE_NAME_ENV))?;
        Ok(Self { table_name })
    }
}

fn validate_project_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidProjectName {
        name: name.to_string(),
        reason,
    };

    if name.len() < 3 {
        return Err(invalid("must be at least 3 characters"));
    }
    if name.len() + "-bucket-v2".len() > MAX_BUCKET_NAME_LEN {
        return Err(invalid("derived bucket name would exceed 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "only lowercase letters, digits and hyphens are allowed",
        ));
    }
    if name.starts_with('-') {
        return Err(invalid("must start with a letter or digit"));
    }
    Ok(())
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidSeconds {
            key,
            value: value.to_string(),
        })
}
