//! Raw payload shapes exchanged with the backend proxy.
//!
//! Everything here is deliberately lenient: collections may be missing or
//! `null`, and ids may arrive as strings or numbers. Normalization into the
//! domain model happens in the owning modules.

use serde::Deserialize;
use serde_json::{Map, Value};

/// An identifier that may be encoded as a JSON string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdRepr {
    /// String form.
    Text(String),
    /// Numeric form.
    Number(serde_json::Number),
}

impl IdRepr {
    /// Render the id as a string.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Issued access token, absent when the exchange was rejected.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Everything else the backend sent (error payloads end up here).
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Response of `GET /api/team`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TeamsResponse {
    /// Workspaces visible to the token.
    #[serde(default)]
    pub teams: Option<Vec<RawTeam>>,
}

/// Workspace entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTeam {
    /// Workspace id.
    pub id: Option<IdRepr>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Response of `GET /api/spaces`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpacesResponse {
    /// Spaces of the workspace.
    #[serde(default)]
    pub spaces: Option<Vec<RawSpace>>,
}

/// Space entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSpace {
    /// Space id.
    pub id: Option<IdRepr>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Accent colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// Response of `GET /api/folders`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FoldersResponse {
    /// Folders of the space.
    #[serde(default)]
    pub folders: Option<Vec<RawFolder>>,
}

/// Folder entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFolder {
    /// Folder id.
    pub id: Option<IdRepr>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Response of `GET /api/lists`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListsResponse {
    /// Lists of the folder or space.
    #[serde(default)]
    pub lists: Option<Vec<RawList>>,
}

/// List entry, also the body of `GET /api/lists/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawList {
    /// List id.
    pub id: Option<IdRepr>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Status catalog of the list.
    #[serde(default)]
    pub statuses: Option<Vec<RawStatus>>,
}

/// Status entry as embedded in tasks and lists.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStatus {
    /// Status label.
    #[serde(default)]
    pub status: Option<String>,
    /// Hex colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// Response of `GET /api/lists/:id/tasks`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TasksResponse {
    /// Tasks of the list.
    #[serde(default)]
    pub tasks: Option<Vec<RawTask>>,
}

/// Task object, the body of `GET /api/tasks/details/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    /// Task id. The only mandatory field.
    pub id: IdRepr,
    /// Task name.
    #[serde(default)]
    pub name: Option<String>,
    /// Current status.
    #[serde(default)]
    pub status: Option<RawStatus>,
    /// Start date in epoch milliseconds.
    #[serde(default)]
    pub start_date: Option<Value>,
    /// Due date in epoch milliseconds.
    #[serde(default)]
    pub due_date: Option<Value>,
    /// Markdown/plain description.
    #[serde(default)]
    pub description: Option<String>,
    /// Assigned users.
    #[serde(default)]
    pub assignees: Option<Vec<RawUser>>,
    /// Attached tags.
    #[serde(default)]
    pub tags: Option<Vec<RawTag>>,
    /// Custom field values.
    #[serde(default)]
    pub custom_fields: Option<Vec<RawCustomField>>,
}

/// User entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawUser {
    /// User id.
    #[serde(default)]
    pub id: Option<IdRepr>,
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Two-letter initials.
    #[serde(default)]
    pub initials: Option<String>,
}

/// Tag entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTag {
    /// Tag name.
    #[serde(default)]
    pub name: Option<String>,
    /// Foreground colour.
    #[serde(default)]
    pub tag_fg: Option<String>,
    /// Background colour.
    #[serde(default)]
    pub tag_bg: Option<String>,
}

/// Custom field entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCustomField {
    /// Field id.
    #[serde(default)]
    pub id: Option<IdRepr>,
    /// Field name.
    #[serde(default)]
    pub name: Option<String>,
    /// Field type discriminator.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Current value; shape depends on the type.
    #[serde(default)]
    pub value: Option<Value>,
    /// Type configuration (drop-down and label options live here).
    #[serde(default)]
    pub type_config: Option<Value>,
}
