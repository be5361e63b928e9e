// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::artifact::Artifact;
use crate::client::RemoteClient;
use crate::error::Result;
use crate::flow::{Flow, FlowArgs};
use crate::results::FlowResult;

/// Byte chunks of a flow's collected-files archive
pub type ArchiveStream = BoxStream<'static, Result<Bytes>>;

/// An authenticated connection to the remote forensic service.
///
/// Every call is a round trip; implementations must be shareable across
/// tasks.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Endpoints matching a client id or hostname
    async fn search_clients(&self, query: &str) -> Result<Vec<RemoteClient>>;

    async fn get_client(&self, client_id: &str) -> Result<RemoteClient>;

    /// Fails with `AccessForbidden` when no approval is held
    async fn verify_access(&self, client_id: &str) -> Result<()>;

    /// File an approval request and return its id
    async fn request_approval(
        &self,
        client_id: &str,
        reason: &str,
        approvers: &[String],
    ) -> Result<String>;

    /// Block until the approval is granted
    async fn wait_approval(&self, client_id: &str, approval_id: &str) -> Result<()>;

    async fn create_flow(&self, client_id: &str, args: FlowArgs) -> Result<Flow>;

    async fn get_flow(&self, client_id: &str, flow_id: &str) -> Result<Flow>;

    /// Every flow launched on the endpoint, by anyone
    async fn list_flows(&self, client_id: &str) -> Result<Vec<Flow>>;

    /// Block until the flow is terminal; fails with `FlowFailed` on ERROR
    async fn wait_until_done(&self, client_id: &str, flow_id: &str) -> Result<Flow>;

    async fn list_results(&self, client_id: &str, flow_id: &str) -> Result<Vec<FlowResult>>;

    async fn files_archive(&self, client_id: &str, flow_id: &str) -> Result<ArchiveStream>;

    /// Body-file text collected by a timeline flow
    async fn timeline_body(&self, client_id: &str, flow_id: &str) -> Result<Bytes>;

    async fn list_artifacts(&self) -> Result<Vec<Artifact>>;
}
