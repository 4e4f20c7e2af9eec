use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Error returned when an identifier string cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty or whitespace only.
    #[error("identifier must not be empty")]
    Empty,
    /// A node key string did not have the `kind:id` shape.
    #[error("invalid node key: {0}")]
    InvalidKey(String),
}

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier issued by the remote service.
            ///
            /// # Errors
            /// Returns [`IdError::Empty`] for blank input.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(raw))
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                s.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(d: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                // The remote service sends some ids as JSON numbers.
                let raw = crate::wire::IdRepr::deserialize(d)?.into_string();
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

remote_id!(
    /// Identifier of a workspace ("team" on the remote side).
    WorkspaceId
);
remote_id!(
    /// Identifier of a task.
    TaskId
);
remote_id!(
    /// Identifier of a list.
    ListId
);

/// Kind of a node in the browsable hierarchy.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Top-level grouping inside a workspace.
    Space,
    /// Optional grouping of lists inside a space.
    Folder,
    /// Collection of tasks.
    List,
}

impl NodeKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Space => "space",
            Self::Folder => "folder",
            Self::List => "list",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space" => Ok(Self::Space),
            "folder" => Ok(Self::Folder),
            "list" => Ok(Self::List),
            other => Err(IdError::InvalidKey(other.to_owned())),
        }
    }
}

/// Identity of a hierarchy node.
///
/// Folder and list ids are not guaranteed to be disjoint, so the kind is part
/// of the key.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct NodeKey {
    kind: NodeKind,
    id: String,
}

impl NodeKey {
    /// Build a key from its parts.
    ///
    /// # Errors
    /// Returns [`IdError::Empty`] for a blank id.
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self { kind, id })
    }

    /// Node kind.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Raw remote id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for NodeKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| IdError::InvalidKey(s.to_owned()))?;
        Self::new(kind.parse()?, id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert_eq!(TaskId::new("  "), Err(IdError::Empty));
        assert!(NodeKey::new(NodeKind::Folder, "").is_err());
    }

    #[test]
    fn node_keys_with_same_id_differ_by_kind() {
        let folder = NodeKey::new(NodeKind::Folder, "42").expect("must build folder key");
        let list = NodeKey::new(NodeKind::List, "42").expect("must build list key");
        assert_ne!(folder, list);
        assert_eq!(folder.to_string(), "folder:42");
    }

    #[test]
    fn node_key_parses_display_form() {
        let key: NodeKey = "space:901".parse().expect("must parse node key");
        assert_eq!(key.kind(), NodeKind::Space);
        assert_eq!(key.id(), "901");
        assert!("nothing".parse::<NodeKey>().is_err());
        assert!("team:1".parse::<NodeKey>().is_err());
    }

    #[test]
    fn ids_accept_numeric_json() {
        let id: WorkspaceId = serde_json::from_str("9012345").expect("must decode numeric id");
        assert_eq!(id.as_str(), "9012345");
        let id: ListId = serde_json::from_str("\"abc\"").expect("must decode string id");
        assert_eq!(id.as_str(), "abc");
    }
}
