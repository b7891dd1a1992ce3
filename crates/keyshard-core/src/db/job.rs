use crate::{
    db::{filter::FilterFactorySpec, predicate::FilterSpec},
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Sampling stride used when a job does not set `batch_size`.
pub const DEFAULT_BATCH_SIZE: usize = 50;

///
/// JobSpecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum JobSpecError {
    #[error("job shard_count must be at least 1")]
    ZeroShardCount,

    #[error("job batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("job spec could not be parsed: {0}")]
    Parse(String),
}

impl JobSpecError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::ZeroShardCount | Self::ZeroBatchSize => ErrorClass::Unsupported,
            Self::Parse(_) => ErrorClass::Corruption,
        }
    }
}

impl From<JobSpecError> for InternalError {
    fn from(err: JobSpecError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Config,
            err.to_string(),
            ErrorDetail::Job(err),
        )
    }
}

///
/// JobSpec
///
/// Input-reader parameters handed over by the orchestrator: which entity
/// kind to split, how many shards are wanted, the sampling stride, native
/// filters and an optional pre-map predicate filter.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JobSpec {
    pub entity_kind: String,
    pub shard_count: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_factory_spec: Option<FilterFactorySpec>,
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl JobSpec {
    #[must_use]
    pub fn new(entity_kind: impl Into<String>, shard_count: usize) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            shard_count,
            batch_size: DEFAULT_BATCH_SIZE,
            filters: Vec::new(),
            filter_factory_spec: None,
        }
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_filter_factory(mut self, spec: FilterFactorySpec) -> Self {
        self.filter_factory_spec = Some(spec);
        self
    }

    /// Parse and validate a TOML job file.
    pub fn from_toml_str(raw: &str) -> Result<Self, InternalError> {
        let spec: Self =
            toml::from_str(raw).map_err(|err| JobSpecError::Parse(err.to_string()))?;
        spec.validate()?;

        Ok(spec)
    }

    /// Parse and validate a JSON job document.
    pub fn from_json_str(raw: &str) -> Result<Self, InternalError> {
        let spec: Self =
            serde_json::from_str(raw).map_err(|err| JobSpecError::Parse(err.to_string()))?;
        spec.validate()?;

        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), InternalError> {
        if self.shard_count == 0 {
            return Err(JobSpecError::ZeroShardCount.into());
        }
        if self.batch_size == 0 {
            return Err(JobSpecError::ZeroBatchSize.into());
        }

        Ok(())
    }
}
