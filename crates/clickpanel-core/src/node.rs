use serde::Serialize;

use crate::id::{IdError, NodeKey, NodeKind, WorkspaceId};
use crate::wire::{IdRepr, RawFolder, RawList, RawSpace, RawTeam};

/// Immutable node of the space → folder → list hierarchy.
///
/// A changed remote state produces a new value; nodes are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    key: NodeKey,
    parent: Option<NodeKey>,
    name: String,
    color: Option<String>,
}

impl HierarchyNode {
    /// Build a node. Prefer the `from_raw_*` constructors for wire payloads.
    #[must_use]
    pub const fn new(
        key: NodeKey,
        parent: Option<NodeKey>,
        name: String,
        color: Option<String>,
    ) -> Self {
        Self {
            key,
            parent,
            name,
            color,
        }
    }

    /// Space node from a wire entry. Entries without id or name are skipped.
    #[must_use]
    pub fn from_raw_space(raw: RawSpace) -> Option<Self> {
        let key = named_key(NodeKind::Space, raw.id.map(IdRepr::into_string), raw.name.as_deref())?;
        Some(Self::new(key, None, raw.name.unwrap_or_default(), raw.color))
    }

    /// Folder node attached to `space`.
    #[must_use]
    pub fn from_raw_folder(raw: RawFolder, space: &NodeKey) -> Option<Self> {
        let key = named_key(NodeKind::Folder, raw.id.map(IdRepr::into_string), raw.name.as_deref())?;
        Some(Self::new(key, Some(space.clone()), raw.name.unwrap_or_default(), None))
    }

    /// List node attached to a folder or, for folder-less lists, a space.
    #[must_use]
    pub fn from_raw_list(raw: RawList, parent: &NodeKey) -> Option<Self> {
        let key = named_key(NodeKind::List, raw.id.map(IdRepr::into_string), raw.name.as_deref())?;
        Some(Self::new(key, Some(parent.clone()), raw.name.unwrap_or_default(), None))
    }

    /// Identity of the node.
    #[must_use]
    pub const fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Node kind.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.key.kind()
    }

    /// Raw remote id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// Parent node, absent for spaces.
    #[must_use]
    pub const fn parent(&self) -> Option<&NodeKey> {
        self.parent.as_ref()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accent colour, set for spaces only.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }
}

fn named_key(kind: NodeKind, id: Option<String>, name: Option<&str>) -> Option<NodeKey> {
    name.filter(|name| !name.trim().is_empty())?;
    NodeKey::new(kind, id?).ok()
}

/// Workspace visible to the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    /// Workspace id.
    pub id: WorkspaceId,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar: Option<String>,
}

impl TryFrom<RawTeam> for Team {
    type Error = IdError;

    fn try_from(raw: RawTeam) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(IdError::Empty)?.into_string();
        Ok(Self {
            id: WorkspaceId::new(id)?,
            name: raw.name.unwrap_or_default(),
            avatar: raw.avatar,
        })
    }
}
