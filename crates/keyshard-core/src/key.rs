use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;
use ulid::Ulid;

///
/// Key
///
/// Ordered primary key of one record.
/// Ordering is by variant first (declaration order), then by payload, so a
/// collection with mixed key variants still has one total order.
///
/// The canonical text form is `<tag>:<payload>` (`int:-5`, `uint:7`,
/// `text:abc`, `ulid:01ARZ3NDEKTSV4RRFFQ69G5FAV`). It is the form used on
/// the wire and for reference values passed as strings in filter specs.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Key {
    Int(i64),
    Uint(u64),
    Text(String),
    Ulid(Ulid),
}

impl Key {
    const TAG_INT: &'static str = "int";
    const TAG_UINT: &'static str = "uint";
    const TAG_TEXT: &'static str = "text";
    const TAG_ULID: &'static str = "ulid";

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Int(_) => Self::TAG_INT,
            Self::Uint(_) => Self::TAG_UINT,
            Self::Text(_) => Self::TAG_TEXT,
            Self::Ulid(_) => Self::TAG_ULID,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}:{v}", Self::TAG_INT),
            Self::Uint(v) => write!(f, "{}:{v}", Self::TAG_UINT),
            Self::Text(v) => write!(f, "{}:{v}", Self::TAG_TEXT),
            Self::Ulid(v) => write!(f, "{}:{v}", Self::TAG_ULID),
        }
    }
}

///
/// KeyParseError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum KeyParseError {
    #[error("key '{0}' is missing a '<tag>:' prefix")]
    MissingTag(String),

    #[error("key '{input}' has unknown tag '{tag}'")]
    UnknownTag { input: String, tag: String },

    #[error("key '{input}' has an invalid {tag} payload")]
    InvalidPayload { input: String, tag: &'static str },
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((tag, payload)) = input.split_once(':') else {
            return Err(KeyParseError::MissingTag(input.to_string()));
        };

        let invalid = |tag: &'static str| KeyParseError::InvalidPayload {
            input: input.to_string(),
            tag,
        };

        match tag {
            Self::TAG_INT => payload
                .parse()
                .map(Self::Int)
                .map_err(|_| invalid(Self::TAG_INT)),
            Self::TAG_UINT => payload
                .parse()
                .map(Self::Uint)
                .map_err(|_| invalid(Self::TAG_UINT)),
            Self::TAG_TEXT => Ok(Self::Text(payload.to_string())),
            Self::TAG_ULID => Ulid::from_string(payload)
                .map(Self::Ulid)
                .map_err(|_| invalid(Self::TAG_ULID)),
            _ => Err(KeyParseError::UnknownTag {
                input: input.to_string(),
                tag: tag.to_string(),
            }),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<Ulid> for Key {
    fn from(value: Ulid) -> Self {
        Self::Ulid(value)
    }
}
