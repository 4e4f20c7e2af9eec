//! HTTP client for the clickpanel backend proxy.
//!
//! The proxy fronts both the OAuth token exchange and the resource API. Every
//! authenticated request goes through [`HttpBackend::sign`].

use std::fmt;
use std::time::Duration;

use clickpanel_core::wire::{
    FoldersResponse, ListsResponse, RawList, RawTask, SpacesResponse, TasksResponse, TeamsResponse,
    TokenResponse,
};
use clickpanel_core::{
    AccessToken, HierarchyNode, ListId, NodeKey, StatusOption, Task, TaskId, TaskSummary, Team,
    WorkspaceId,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

mod error;

pub use error::HttpError;

/// Request timeout applied to every call.
const REQUEST_TIMEOUT_SECS: u64 = 20;
/// Upper bound for response bodies carried inside errors.
const ERROR_BODY_LIMIT: usize = 512;

/// Client for the backend proxy.
#[derive(Clone)]
pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Build a client for the proxy at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { base, client })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, HttpError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Attach credentials to a request.
    fn sign(request: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        request.bearer_auth(token.secret())
    }

    /// Signed GET for `route`, ready to send.
    fn authorized_get(
        &self,
        token: &AccessToken,
        route: &Route<'_>,
    ) -> Result<RequestBuilder, HttpError> {
        let url = self.endpoint(&route.path())?;
        debug!(%url, "backend request");
        Ok(Self::sign(self.client.get(url), token).query(&route.query()))
    }

    fn exchange_request(&self, code: &str) -> Result<RequestBuilder, HttpError> {
        let url = self.endpoint("auth/token")?;
        debug!(%url, "exchanging authorization code");
        Ok(self
            .client
            .post(url)
            .json(&serde_json::json!({ "code": code })))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, HttpError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)?;
        decode(&body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        route: Route<'_>,
    ) -> Result<T, HttpError> {
        Self::send_json(self.authorized_get(token, &route)?).await
    }

    /// Exchange an authorization code for a token.
    ///
    /// A response without `access_token` is returned as is so the caller can
    /// report the upstream payload.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, HttpError> {
        Self::send_json(self.exchange_request(code)?).await
    }

    /// Workspaces visible to the token, in remote order.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn teams(&self, token: &AccessToken) -> Result<Vec<Team>, HttpError> {
        let response: TeamsResponse = self.get_json(token, Route::Teams).await?;
        Ok(response
            .teams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match Team::try_from(raw) {
                Ok(team) => Some(team),
                Err(err) => {
                    warn!(error = %err, "skipping team without id");
                    None
                }
            })
            .collect())
    }

    /// Spaces of a workspace.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn spaces(
        &self,
        token: &AccessToken,
        workspace: &WorkspaceId,
    ) -> Result<Vec<HierarchyNode>, HttpError> {
        let response: SpacesResponse = self.get_json(token, Route::Spaces(workspace)).await?;
        Ok(response
            .spaces
            .unwrap_or_default()
            .into_iter()
            .filter_map(HierarchyNode::from_raw_space)
            .collect())
    }

    /// Folders of a space.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn folders(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, HttpError> {
        let response: FoldersResponse = self.get_json(token, Route::Folders(space)).await?;
        Ok(response
            .folders
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| HierarchyNode::from_raw_folder(raw, space))
            .collect())
    }

    /// Lists inside a folder.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn folder_lists(
        &self,
        token: &AccessToken,
        folder: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, HttpError> {
        let response: ListsResponse = self.get_json(token, Route::FolderLists(folder)).await?;
        Ok(lists_under(response, folder))
    }

    /// Lists placed directly in a space.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn folderless_lists(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, HttpError> {
        let response: ListsResponse = self.get_json(token, Route::FolderlessLists(space)).await?;
        Ok(lists_under(response, space))
    }

    /// Task listing of a list.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn tasks(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> Result<Vec<TaskSummary>, HttpError> {
        let response: TasksResponse = self.get_json(token, Route::Tasks(list)).await?;
        Ok(response
            .tasks
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| TaskSummary::from_wire(raw).ok())
            .collect())
    }

    /// Full detail of one task.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn task(&self, token: &AccessToken, task: &TaskId) -> Result<Task, HttpError> {
        let raw: RawTask = self.get_json(token, Route::Task(task)).await?;
        Task::from_wire(raw).map_err(|err| HttpError::Decode(err.to_string()))
    }

    /// Status catalog embedded in a list.
    ///
    /// # Errors
    /// Returns an error on transport, status or decode failure.
    pub async fn list_statuses(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> Result<Vec<StatusOption>, HttpError> {
        let raw: RawList = self.get_json(token, Route::List(list)).await?;
        Ok(StatusOption::catalog_of(raw))
    }
}

/// Authenticated resource endpoints of the proxy.
#[derive(Debug, Clone, Copy)]
enum Route<'a> {
    Teams,
    Spaces(&'a WorkspaceId),
    Folders(&'a NodeKey),
    FolderLists(&'a NodeKey),
    FolderlessLists(&'a NodeKey),
    Tasks(&'a ListId),
    Task(&'a TaskId),
    List(&'a ListId),
}

impl<'a> Route<'a> {
    fn path(&self) -> String {
        match self {
            Self::Teams => "api/team".to_owned(),
            Self::Spaces(_) => "api/spaces".to_owned(),
            Self::Folders(_) => "api/folders".to_owned(),
            Self::FolderLists(_) | Self::FolderlessLists(_) => "api/lists".to_owned(),
            Self::Tasks(list) => format!("api/lists/{list}/tasks"),
            Self::Task(task) => format!("api/tasks/details/{task}"),
            Self::List(list) => format!("api/lists/{list}"),
        }
    }

    fn query(&self) -> Vec<(&'static str, &'a str)> {
        match *self {
            Self::Spaces(workspace) => vec![("team_id", workspace.as_str())],
            Self::Folders(space) | Self::FolderlessLists(space) => vec![("space_id", space.id())],
            Self::FolderLists(folder) => vec![("folder_id", folder.id())],
            Self::Teams | Self::Tasks(_) | Self::Task(_) | Self::List(_) => Vec::new(),
        }
    }
}

fn lists_under(response: ListsResponse, parent: &NodeKey) -> Vec<HierarchyNode> {
    response
        .lists
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| HierarchyNode::from_raw_list(raw, parent))
        .collect()
}

/// Map a response status to an error, keeping a bounded slice of the body.
fn check_status(status: StatusCode, body: &str) -> Result<(), HttpError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(HttpError::Unauthorized);
    }
    if !status.is_success() {
        return Err(HttpError::Status {
            status: status.as_u16(),
            body: truncate_for_error(body),
        });
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, HttpError> {
    // Some proxies answer an empty 200 for empty collections.
    let body = if body.trim().is_empty() { "{}" } else { body };
    Ok(serde_json::from_str(body)?)
}

fn truncate_for_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_owned();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}
