//! In-memory backend for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::TeachingApi;
use crate::api::model::{
    Analytics, ChatReply, DocumentRecord, FolderGroup, GenerateRequest, Health, QuizResult,
    SourceRef, UploadReceipt,
};
use crate::content::{ContentKind, GenerationResponse};
use crate::poll::{ArtifactProbe, ProbeReport};

#[derive(Default)]
pub(crate) struct FakeApi {
    pub library: Mutex<Vec<FolderGroup>>,
    pub upload_json_file: Option<String>,
    pub fail_upload: bool,
    pub generate_responses: Mutex<VecDeque<anyhow::Result<GenerationResponse>>>,
    pub generate_calls: Mutex<Vec<(ContentKind, GenerateRequest)>>,
    pub probes: Mutex<VecDeque<ProbeReport>>,
    pub artifact_json: Option<serde_json::Value>,
    pub submitted: Mutex<Vec<QuizResult>>,
    pub chat_messages: Mutex<Vec<String>>,
    /// Chat requests whose text contains this fail like an unreachable backend.
    pub fail_chat_containing: Option<String>,
}

#[async_trait]
impl ArtifactProbe for FakeApi {
    async fn probe(&self, _filename: &str) -> anyhow::Result<ProbeReport> {
        self.probes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("backend error (404 Not Found): not found"))
    }
}

#[async_trait]
impl TeachingApi for FakeApi {
    async fn health(&self) -> anyhow::Result<Health> {
        Ok(Health {
            status: "System Online".to_owned(),
            message: String::new(),
        })
    }

    async fn list_files(&self) -> anyhow::Result<Vec<FolderGroup>> {
        Ok(self.library.lock().unwrap().clone())
    }

    async fn upload(&self, path: &Path) -> anyhow::Result<UploadReceipt> {
        if self.fail_upload {
            anyhow::bail!("backend error (500 Internal Server Error): Processing failed");
        }
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("doc");
        let mut library = self.library.lock().unwrap();
        if library.is_empty() {
            library.push(FolderGroup {
                folder: "custom".to_owned(),
                files: Vec::new(),
            });
        }
        library[0]
            .files
            .push(doc(&format!("custom/{name}.json"), &["Integers"]));
        Ok(UploadReceipt {
            status: "success".to_owned(),
            message: Some("File processed".to_owned()),
            json_file: self.upload_json_file.clone(),
        })
    }

    async fn generate(
        &self,
        kind: ContentKind,
        request: &GenerateRequest,
    ) -> anyhow::Result<GenerationResponse> {
        self.generate_calls
            .lock()
            .unwrap()
            .push((kind, request.clone()));
        self.generate_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
    }

    async fn download(&self, filename: &str, _out: &Path, _force: bool) -> anyhow::Result<u64> {
        anyhow::bail!("download of {filename} is not scripted")
    }

    async fn fetch_artifact_json(&self, _filename: &str) -> anyhow::Result<serde_json::Value> {
        self.artifact_json
            .clone()
            .ok_or_else(|| anyhow::anyhow!("missing artifact"))
    }

    async fn submit_quiz(&self, result: &QuizResult) -> anyhow::Result<()> {
        self.submitted.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn analytics(&self) -> anyhow::Result<Analytics> {
        Ok(Analytics::default())
    }

    async fn chat(&self, message: &str) -> anyhow::Result<ChatReply> {
        self.chat_messages.lock().unwrap().push(message.to_owned());
        if let Some(needle) = &self.fail_chat_containing
            && message.contains(needle.as_str())
        {
            anyhow::bail!("POST http://backend.test/chat: connection refused");
        }
        Ok(ChatReply {
            answer: format!("echo: {message}"),
            sources: vec![SourceRef {
                topic: "Fractions".to_owned(),
            }],
            chapter: None,
            relevance: None,
        })
    }

    fn link(&self, file_url: &str) -> String {
        format!("http://backend.test{file_url}")
    }
}

pub(crate) fn doc(filename: &str, topics: &[&str]) -> DocumentRecord {
    DocumentRecord {
        filename: filename.to_owned(),
        display_name: topics.first().map(|t| (*t).to_owned()),
        topics: topics.iter().map(|t| (*t).to_owned()).collect(),
        topic_count: topics.len(),
    }
}

/// A library holding one document with topics `Fractions` and `Geometry`.
pub(crate) fn fake() -> FakeApi {
    FakeApi {
        library: Mutex::new(vec![FolderGroup {
            folder: "class7".to_owned(),
            files: vec![doc(
                "class7/json_output/ch1.json",
                &["Fractions", "Geometry"],
            )],
        }]),
        ..FakeApi::default()
    }
}
