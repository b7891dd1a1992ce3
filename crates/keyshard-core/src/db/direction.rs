use serde::{Deserialize, Serialize};

///
/// Direction
///
/// Canonical traversal direction shared by key ranges, order terms and
/// store scans. Serialized as `ASC` / `DESC`.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn is_asc(self) -> bool {
        matches!(self, Self::Asc)
    }
}
