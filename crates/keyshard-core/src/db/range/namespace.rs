use crate::{db::range::KeyRangeError, error::InternalError};
use serde::{Deserialize, Serialize};

///
/// NamespaceRange
///
/// Inclusive, lexicographic interval over partition names.
/// The empty string names the default partition and sorts first; an absent
/// end means every partition from `namespace_start` onward.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NamespaceRange {
    #[serde(default)]
    namespace_start: String,
    #[serde(default)]
    namespace_end: Option<String>,
}

impl NamespaceRange {
    pub fn new(
        namespace_start: impl Into<String>,
        namespace_end: Option<String>,
    ) -> Result<Self, InternalError> {
        let range = Self {
            namespace_start: namespace_start.into(),
            namespace_end,
        };
        range.validate()?;

        Ok(range)
    }

    /// Range covering every partition, including the default one.
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn namespace_start(&self) -> &str {
        &self.namespace_start
    }

    #[must_use]
    pub fn namespace_end(&self) -> Option<&str> {
        self.namespace_end.as_deref()
    }

    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        namespace >= self.namespace_start.as_str()
            && self
                .namespace_end
                .as_deref()
                .is_none_or(|end| namespace <= end)
    }

    /// Remaining range strictly after `namespace`, or `None` once the end
    /// has been passed.
    #[must_use]
    pub fn advance_past(&self, namespace: &str) -> Option<Self> {
        // "\0" is the smallest suffix, so this is the immediate successor.
        let next = format!("{namespace}\0");
        if self.namespace_end.as_deref().is_some_and(|end| next.as_str() > end) {
            return None;
        }

        Some(Self {
            namespace_start: next,
            namespace_end: self.namespace_end.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, InternalError> {
        serde_json::to_string(self).map_err(|err| {
            InternalError::serialize_internal(format!("namespace range encode failed: {err}"))
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, InternalError> {
        let range: Self = serde_json::from_str(raw)
            .map_err(|err| KeyRangeError::invalid(format!("malformed namespace range: {err}")))?;
        range.validate()?;

        Ok(range)
    }

    pub(crate) fn validate(&self) -> Result<(), KeyRangeError> {
        if let Some(end) = &self.namespace_end
            && self.namespace_start.as_str() > end.as_str()
        {
            return Err(KeyRangeError::invalid(format!(
                "namespace start '{}' is after namespace end '{end}'",
                self.namespace_start
            )));
        }

        Ok(())
    }
}
