use anyhow::{anyhow, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Compile-time default; can be overridden via config file or `--backend`.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Deserialize)]
struct BackendResponse {
    html: String,
    model: Option<String>,
}

/// A settled generate or refine exchange.
#[derive(Debug, Clone)]
pub struct Generation {
    pub html: String,
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a sketch image and return the generated HTML document.
    pub async fn generate(&self, image: &Path) -> Result<Generation> {
        let bytes = fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sketch.png".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(guess_mime(image))?;
        let form = Form::new().part("file", part);

        self.exchange("generate", form).await
    }

    /// Send the current document plus an instruction, returning the updated HTML.
    pub async fn refine(&self, code: &str, instruction: &str) -> Result<Generation> {
        let form = Form::new()
            .text("code", code.to_string())
            .text("instruction", instruction.to_string());

        self.exchange("refine", form).await
    }

    async fn exchange(&self, endpoint: &str, form: Form) -> Result<Generation> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self.client.post(&url).multipart(form).send().await?;

        // Error bodies are opaque to the client; only the status matters.
        if !response.status().is_success() {
            return Err(anyhow!(
                "{} request failed with status: {}",
                endpoint,
                response.status()
            ));
        }

        let body: BackendResponse = response.json().await?;
        Ok(Generation {
            html: body.html,
            model: body.model,
        })
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
