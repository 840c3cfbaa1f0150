use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::api::TeachingApi;
use crate::api::model::{Analytics, DocumentRecord, FolderGroup, GenerateRequest, QuizResult};
use crate::content::{self, ContentKind, GenerationResponse, GenerationResult};
use crate::poll::{JobPoller, PollPolicy};

/// Top-level screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Landing,
    Dashboard,
    DashboardAnalytics,
    Generating,
    Results,
}

/// View-state machine of the client: selection, phase, and the data each
/// screen renders. Nothing here survives a restart.
pub struct App {
    api: Arc<dyn TeachingApi>,
    poll_policy: PollPolicy,
    phase: Phase,
    library: Vec<FolderGroup>,
    selected_file: Option<DocumentRecord>,
    selected_topic: usize,
    selected_kind: ContentKind,
    result: Option<GenerationResult>,
    analytics: Option<Analytics>,
    /// Cancelled whenever the user navigates away or the app goes away.
    navigation: CancellationToken,
}

impl App {
    pub fn new(api: Arc<dyn TeachingApi>, poll_policy: PollPolicy) -> Self {
        Self {
            api,
            poll_policy,
            phase: Phase::Landing,
            library: Vec::new(),
            selected_file: None,
            selected_topic: 0,
            selected_kind: ContentKind::Plan,
            result: None,
            analytics: None,
            navigation: CancellationToken::new(),
        }
    }

    pub fn api(&self) -> &dyn TeachingApi {
        self.api.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn library(&self) -> &[FolderGroup] {
        &self.library
    }

    pub fn selected_file(&self) -> Option<&DocumentRecord> {
        self.selected_file.as_ref()
    }

    pub fn selected_topic(&self) -> usize {
        self.selected_topic
    }

    pub fn selected_topic_name(&self) -> Option<&str> {
        self.selected_file
            .as_ref()
            .and_then(|doc| doc.topics.get(self.selected_topic))
            .map(String::as_str)
    }

    pub fn selected_kind(&self) -> ContentKind {
        self.selected_kind
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn analytics(&self) -> Option<&Analytics> {
        self.analytics.as_ref()
    }

    /// Handle that stops the next generation wait (e.g. on Ctrl-C).
    pub fn cancel_handle(&mut self) -> CancellationToken {
        if self.navigation.is_cancelled() {
            self.navigation = CancellationToken::new();
        }
        self.navigation.clone()
    }

    fn set_phase(&mut self, next: Phase) {
        if self.phase != next {
            tracing::debug!(from = ?self.phase, to = ?next, "phase");
        }
        self.phase = next;
    }

    fn navigate_away(&mut self) {
        self.navigation.cancel();
        self.navigation = CancellationToken::new();
        self.result = None;
        self.analytics = None;
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.library.iter().flat_map(|group| group.files.iter())
    }

    pub async fn load_library(&mut self) -> anyhow::Result<()> {
        let library = self.api.list_files().await.context("load document library")?;
        tracing::debug!(
            folders = library.len(),
            documents = library.iter().map(|g| g.files.len()).sum::<usize>(),
            "library loaded"
        );
        self.library = library;

        // Keep the selection pointing at fresh data.
        if let Some(current) = self.selected_file.as_ref().map(|doc| doc.filename.clone()) {
            let refreshed = self.documents().find(|doc| doc.filename == current).cloned();
            self.selected_file = refreshed;
            if self
                .selected_file
                .as_ref()
                .is_none_or(|doc| self.selected_topic >= doc.topics.len())
            {
                self.selected_topic = 0;
            }
        }
        Ok(())
    }

    pub fn open_dashboard(&mut self) {
        self.set_phase(Phase::Dashboard);
    }

    /// Uploads `path`, then lands on the dashboard with that document selected.
    pub async fn upload(&mut self, path: &Path) -> anyhow::Result<&DocumentRecord> {
        let receipt = self
            .api
            .upload(path)
            .await
            .with_context(|| format!("upload {}", path.display()))?;
        tracing::info!(status = %receipt.status, json_file = ?receipt.json_file, "upload accepted");
        self.load_library().await?;

        let uploaded = receipt.json_file.as_deref().and_then(|json_file| {
            self.documents()
                .find(|doc| doc.filename == json_file || doc.basename() == json_file)
        });
        let selected = uploaded
            .or_else(|| self.documents().next())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("upload finished but the library is empty"))?;

        self.navigate_away();
        self.selected_file = Some(selected);
        self.selected_topic = 0;
        self.set_phase(Phase::Dashboard);
        self.selected_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no document selected"))
    }

    /// Selects a document by its path, file name, or display name.
    pub fn select_file(&mut self, query: &str) -> anyhow::Result<&DocumentRecord> {
        let query = query.trim();
        let found = self
            .documents()
            .find(|doc| doc.filename == query)
            .or_else(|| self.documents().find(|doc| doc.basename() == query))
            .or_else(|| {
                self.documents().find(|doc| {
                    doc.display_name
                        .as_deref()
                        .is_some_and(|name| name.eq_ignore_ascii_case(query))
                })
            })
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no document named {query:?}"))?;

        self.result = None;
        self.selected_file = Some(found);
        self.selected_topic = 0;
        self.set_phase(Phase::Dashboard);
        self.selected_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no document selected"))
    }

    pub fn select_topic(&mut self, index: usize) -> anyhow::Result<&str> {
        let doc = self
            .selected_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("select a document first"))?;
        let Some(topic) = doc.topics.get(index) else {
            anyhow::bail!(
                "topic {index} is out of range ({} has {} topic(s))",
                doc.label(),
                doc.topics.len()
            );
        };
        self.selected_topic = index;
        Ok(topic)
    }

    pub fn select_kind(&mut self, kind: ContentKind) {
        self.selected_kind = kind;
    }

    /// Requests content for the current selection.
    ///
    /// Always leaves the app in `Results` on success or `Dashboard` on failure.
    pub async fn generate(&mut self) -> anyhow::Result<&GenerationResult> {
        let doc = self
            .selected_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("select a document first"))?;
        if self.selected_topic >= doc.topics.len() {
            anyhow::bail!(
                "topic {} is out of range ({} has {} topic(s))",
                self.selected_topic,
                doc.label(),
                doc.topics.len()
            );
        }
        let request = GenerateRequest {
            filename: doc.filename.clone(),
            topic_index: self.selected_topic,
        };
        let kind = self.selected_kind;

        self.result = None;
        if self.navigation.is_cancelled() {
            self.navigation = CancellationToken::new();
        }
        self.set_phase(Phase::Generating);
        let cancel = self.navigation.child_token();
        match self.run_generation(kind, &request, &cancel).await {
            Ok(result) => {
                self.result = Some(result);
                self.set_phase(Phase::Results);
                self.result
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("generation produced no result"))
            }
            Err(err) => {
                tracing::warn!(kind = %kind, ?err, "generation failed");
                self.set_phase(Phase::Dashboard);
                Err(err)
            }
        }
    }

    async fn run_generation(
        &self,
        kind: ContentKind,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<GenerationResult> {
        let response = self
            .api
            .generate(kind, request)
            .await
            .with_context(|| format!("generate {kind}"))?;

        let filename = match response {
            GenerationResponse::Ready(result) => return Ok(result),
            GenerationResponse::Deferred { filename } => filename,
        };

        let poller = JobPoller::new(self.api.as_ref(), self.poll_policy.clone());
        poller
            .wait_for(&filename, kind, cancel)
            .await
            .into_result(&filename)?;

        if kind.is_file() {
            return GenerationResult::from_ready_file(kind, &filename);
        }
        let body = self
            .api
            .fetch_artifact_json(&filename)
            .await
            .with_context(|| format!("fetch {filename}"))?;
        content::parse_payload(kind, &body).with_context(|| format!("interpret {filename}"))
    }

    pub async fn show_analytics(&mut self) -> anyhow::Result<&Analytics> {
        let analytics = self.api.analytics().await.context("load analytics")?;
        self.analytics = Some(analytics);
        self.set_phase(Phase::DashboardAnalytics);
        self.analytics
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("analytics missing"))
    }

    pub async fn submit_quiz(&self, result: &QuizResult) -> anyhow::Result<()> {
        tracing::info!(
            topic = %result.topic,
            score = result.score,
            total = result.total_questions,
            "submit quiz result"
        );
        self.api.submit_quiz(result).await.context("submit quiz result")
    }

    /// Goes one screen back, dropping whatever the current screen showed.
    pub fn back(&mut self) -> Phase {
        let previous = match self.phase {
            Phase::Landing => Phase::Landing,
            Phase::Dashboard => Phase::Landing,
            Phase::DashboardAnalytics | Phase::Generating | Phase::Results => Phase::Dashboard,
        };
        self.navigate_away();
        self.set_phase(previous);
        previous
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.navigation.cancel();
    }
}
