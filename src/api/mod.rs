pub mod client;
pub mod model;

use std::path::Path;

use async_trait::async_trait;

use crate::api::model::{
    Analytics, ChatReply, FolderGroup, GenerateRequest, Health, QuizResult, UploadReceipt,
};
use crate::content::{ContentKind, GenerationResponse};
use crate::poll::ArtifactProbe;

/// Every backend call the client makes.
#[async_trait]
pub trait TeachingApi: ArtifactProbe {
    async fn health(&self) -> anyhow::Result<Health>;
    async fn list_files(&self) -> anyhow::Result<Vec<FolderGroup>>;
    async fn upload(&self, path: &Path) -> anyhow::Result<UploadReceipt>;
    async fn generate(
        &self,
        kind: ContentKind,
        request: &GenerateRequest,
    ) -> anyhow::Result<GenerationResponse>;
    /// Saves `/download/{filename}` to `out`; returns the bytes written.
    async fn download(&self, filename: &str, out: &Path, force: bool) -> anyhow::Result<u64>;
    /// Reads a JSON artifact written by a deferred job.
    async fn fetch_artifact_json(&self, filename: &str) -> anyhow::Result<serde_json::Value>;
    async fn submit_quiz(&self, result: &QuizResult) -> anyhow::Result<()>;
    async fn analytics(&self) -> anyhow::Result<Analytics>;
    async fn chat(&self, message: &str) -> anyhow::Result<ChatReply>;
    /// Absolute link for a backend-relative `file_url`.
    fn link(&self, file_url: &str) -> String;
}
