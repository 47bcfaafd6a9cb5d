//! Area: a room, floor or zone of the canonical area forest.

use serde::{Deserialize, Serialize};

use crate::id::AreaId;

/// A node of the area forest.
///
/// Parents are referenced by id, never by ownership, so the forest can be
/// stored flat and checked for cycles without chasing pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    /// Identifier assigned by the automation platform.
    pub platform_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AreaId>,
}

impl Area {
    /// Create an area whose id is derived from its platform id.
    #[must_use]
    pub fn new(platform_id: impl Into<String>, name: impl Into<String>) -> Self {
        let platform_id = platform_id.into();
        Self {
            id: AreaId::for_area(&platform_id),
            platform_id,
            name: name.into(),
            parent_id: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: AreaId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Whether the area sits at the root of the forest.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
