//! Backend abstractions consumed by the session and cache components.

use std::future::Future;

use clickpanel_core::wire::TokenResponse;
use clickpanel_core::{
    AccessToken, HierarchyNode, ListId, NodeKey, StatusOption, Task, TaskId, TaskSummary, Team,
    WorkspaceId,
};
use clickpanel_http::HttpBackend;

use crate::error::FetchError;

/// OAuth side of the backend proxy.
pub trait OAuthBackend: Send + Sync + 'static {
    /// Trade an authorization code for a token response.
    ///
    /// # Errors
    /// Returns a fetch error on transport or status failure.
    fn exchange_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<TokenResponse, FetchError>> + Send;

    /// Workspaces visible to `token`.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn teams(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Vec<Team>, FetchError>> + Send;
}

/// Resource side of the backend proxy.
pub trait ResourceBackend: Send + Sync + 'static {
    /// Spaces of a workspace.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn spaces(
        &self,
        token: &AccessToken,
        workspace: &WorkspaceId,
    ) -> impl Future<Output = Result<Vec<HierarchyNode>, FetchError>> + Send;

    /// Folders of a space.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn folders(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> impl Future<Output = Result<Vec<HierarchyNode>, FetchError>> + Send;

    /// Lists of a folder.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn folder_lists(
        &self,
        token: &AccessToken,
        folder: &NodeKey,
    ) -> impl Future<Output = Result<Vec<HierarchyNode>, FetchError>> + Send;

    /// Lists placed directly in a space.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn folderless_lists(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> impl Future<Output = Result<Vec<HierarchyNode>, FetchError>> + Send;

    /// Task listing of a list.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn tasks(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> impl Future<Output = Result<Vec<TaskSummary>, FetchError>> + Send;

    /// Full detail of a task.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn task(
        &self,
        token: &AccessToken,
        task: &TaskId,
    ) -> impl Future<Output = Result<Task, FetchError>> + Send;

    /// Status catalog of a list.
    ///
    /// # Errors
    /// Returns a fetch error on transport, status or decode failure.
    fn list_statuses(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> impl Future<Output = Result<Vec<StatusOption>, FetchError>> + Send;
}

impl OAuthBackend for HttpBackend {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, FetchError> {
        Ok(Self::exchange_code(self, code).await?)
    }

    async fn teams(&self, token: &AccessToken) -> Result<Vec<Team>, FetchError> {
        Ok(Self::teams(self, token).await?)
    }
}

impl ResourceBackend for HttpBackend {
    async fn spaces(
        &self,
        token: &AccessToken,
        workspace: &WorkspaceId,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        Ok(Self::spaces(self, token, workspace).await?)
    }

    async fn folders(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        Ok(Self::folders(self, token, space).await?)
    }

    async fn folder_lists(
        &self,
        token: &AccessToken,
        folder: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        Ok(Self::folder_lists(self, token, folder).await?)
    }

    async fn folderless_lists(
        &self,
        token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        Ok(Self::folderless_lists(self, token, space).await?)
    }

    async fn tasks(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> Result<Vec<TaskSummary>, FetchError> {
        Ok(Self::tasks(self, token, list).await?)
    }

    async fn task(&self, token: &AccessToken, task: &TaskId) -> Result<Task, FetchError> {
        Ok(Self::task(self, token, task).await?)
    }

    async fn list_statuses(
        &self,
        token: &AccessToken,
        list: &ListId,
    ) -> Result<Vec<StatusOption>, FetchError> {
        Ok(Self::list_statuses(self, token, list).await?)
    }
}
