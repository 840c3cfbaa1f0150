use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt as _;
use url::Url;

use crate::api::TeachingApi;
use crate::api::model::{
    Analytics, ChatReply, ChatRequest, FolderGroup, GenerateRequest, Health, QuizResult,
    UploadReceipt,
};
use crate::config::Settings;
use crate::content::{self, ContentKind, GenerationResponse};
use crate::poll::{ArtifactProbe, ProbeReport};

/// HTTP client for the teaching assistant backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    generate_timeout: Duration,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = Url::parse(&settings.normalized_base_url())
            .with_context(|| format!("parse base url: {}", settings.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("base url cannot carry paths: {base_url}");
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.request_timeout())
            .user_agent(concat!("teachassist/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url,
            generate_timeout: settings.generate_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint from its path segments, escaping each one.
    pub fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("base url cannot carry paths: {}", self.base_url))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Absolute link for a backend-relative `file_url` such as `/download/x.pdf`.
    pub fn absolute_url(&self, file_url: &str) -> String {
        if file_url.starts_with("http://") || file_url.starts_with("https://") {
            return file_url.to_owned();
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = file_url.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub fn download_url(&self, filename: &str) -> anyhow::Result<Url> {
        self.endpoint(&["download", filename])
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> anyhow::Result<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        decode_json(response, &url).await
    }

    async fn post_json<B, T>(
        &self,
        segments: &[&str],
        body: &B,
        timeout: Option<Duration>,
    ) -> anyhow::Result<T>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST");
        let mut request = self.client.post(url.clone()).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        decode_json(response, &url).await
    }
}

#[async_trait]
impl ArtifactProbe for HttpClient {
    async fn probe(&self, filename: &str) -> anyhow::Result<ProbeReport> {
        let url = self.download_url(filename)?;
        // Headers are enough; the body is dropped unread.
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Ok(ProbeReport {
            status: response.status().as_u16(),
            content_length: response.content_length(),
        })
    }
}

#[async_trait]
impl TeachingApi for HttpClient {
    async fn health(&self) -> anyhow::Result<Health> {
        self.get_json(&[]).await
    }

    async fn list_files(&self) -> anyhow::Result<Vec<FolderGroup>> {
        self.get_json(&["files"]).await
    }

    async fn upload(&self, path: &Path) -> anyhow::Result<UploadReceipt> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("upload path has no file name: {}", path.display()))?
            .to_owned();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read upload: {}", path.display()))?;
        let mime = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
            Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
            Some(ext) if ext.eq_ignore_ascii_case("txt") => "text/plain",
            _ => "application/octet-stream",
        };
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime)
            .context("build multipart part")?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&["upload"])?;
        tracing::info!(%url, file = %file_name, size, "upload");
        let response = self
            .client
            .post(url.clone())
            .timeout(self.generate_timeout)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        decode_json(response, &url).await
    }

    async fn generate(
        &self,
        kind: ContentKind,
        request: &GenerateRequest,
    ) -> anyhow::Result<GenerationResponse> {
        tracing::info!(
            kind = %kind,
            filename = %request.filename,
            topic_index = request.topic_index,
            "generate"
        );
        let body: serde_json::Value = self
            .post_json(
                &["generate", kind.slug()],
                request,
                Some(self.generate_timeout),
            )
            .await?;
        content::parse_generation_response(kind, &body)
            .with_context(|| format!("interpret /generate/{kind} response"))
    }

    async fn download(&self, filename: &str, out: &Path, force: bool) -> anyhow::Result<u64> {
        if out.exists() && !force {
            anyhow::bail!("output already exists: {} (use --force)", out.display());
        }
        let url = self.download_url(filename)?;
        tracing::info!(%url, out = %out.display(), "download");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let mut response = ensure_success(response).await?;

        // A missing file still comes back as 200 with a small JSON error body.
        let mut head = Vec::new();
        if is_json(&response) {
            while let Some(chunk) = response.chunk().await.context("read download body")? {
                head.extend_from_slice(&chunk);
            }
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&head)
                && let Some(err) = embedded_error(&value)
            {
                return Err(err).with_context(|| format!("GET {url}"));
            }
        }

        let parent = out
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;

        let tmp_path = out.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        let saved = async {
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .with_context(|| format!("create tmp: {}", tmp_path.display()))?;
            let written = write_body(&mut file, &head, &mut response)
                .await
                .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
            drop(file);
            tokio::fs::rename(&tmp_path, out)
                .await
                .with_context(|| format!("rename tmp to final: {}", out.display()))?;
            anyhow::Ok(written)
        }
        .await;

        if saved.is_err()
            && let Err(err) = tokio::fs::remove_file(&tmp_path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(tmp = %tmp_path.display(), ?err, "failed to remove partial download");
        }
        saved
    }

    async fn fetch_artifact_json(&self, filename: &str) -> anyhow::Result<serde_json::Value> {
        self.get_json(&["download", filename]).await
    }

    async fn submit_quiz(&self, result: &QuizResult) -> anyhow::Result<()> {
        let _: serde_json::Value = self.post_json(&["quiz", "submit"], result, None).await?;
        Ok(())
    }

    async fn analytics(&self) -> anyhow::Result<Analytics> {
        self.get_json(&["dashboard", "analytics"]).await
    }

    async fn chat(&self, message: &str) -> anyhow::Result<ChatReply> {
        let request = ChatRequest {
            message: message.to_owned(),
        };
        self.post_json(&["chat"], &request, Some(self.generate_timeout))
            .await
    }

    fn link(&self, file_url: &str) -> String {
        self.absolute_url(file_url)
    }
}

async fn ensure_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let message = parse_error_message(&raw).unwrap_or_else(|| raw.trim().to_owned());
    if status == StatusCode::NOT_FOUND && message.is_empty() {
        anyhow::bail!("backend error ({status}): not found");
    }
    anyhow::bail!("backend error ({status}): {message}");
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response, url: &Url) -> anyhow::Result<T> {
    let response = ensure_success(response).await?;
    let raw = response
        .text()
        .await
        .with_context(|| format!("read response body: {url}"))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse response json: {url}"))?;
    if let Some(err) = embedded_error(&value) {
        return Err(err);
    }
    serde_json::from_value(value).with_context(|| format!("parse response json: {url}"))
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// The backend sometimes returns its error object with status 200:
/// `{"status_code": 404, "detail": "File not found", "headers": null}`.
fn embedded_error(value: &serde_json::Value) -> Option<anyhow::Error> {
    let code = value.get("status_code")?.as_u64()?;
    let status = u16::try_from(code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())?;
    if !(status.is_client_error() || status.is_server_error()) {
        return None;
    }
    let detail = value
        .get("detail")
        .and_then(|v| v.as_str())
        .unwrap_or("request failed");
    Some(anyhow::anyhow!("backend error ({status}): {detail}"))
}

async fn write_body(
    file: &mut tokio::fs::File,
    head: &[u8],
    response: &mut reqwest::Response,
) -> anyhow::Result<u64> {
    file.write_all(head).await?;
    let mut written = head.len() as u64;
    while let Some(chunk) = response.chunk().await.context("read download body")? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Pulls the message out of FastAPI style `{detail}` or `{error}` bodies.
fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value
        .get("detail")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())?;
    Some(message.to_owned())
}
