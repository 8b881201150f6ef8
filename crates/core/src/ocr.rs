use crate::error::ExtractError;
use crate::extractor::PageRaster;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, raster: &PageRaster, language: &str) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest<'a> {
    image_base64: String,
    mime_type: &'static str,
    page: u32,
    width: u32,
    height: u32,
    language: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    text: Option<String>,
}

pub struct HttpOcrEngine {
    client: Client,
    config: OcrEndpointConfig,
}

impl HttpOcrEngine {
    pub fn new(config: OcrEndpointConfig) -> Result<Self, ExtractError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &OcrEndpointConfig {
        &self.config
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(
        &self,
        raster: &PageRaster,
        language: &str,
    ) -> Result<String, ExtractError> {
        let payload = OcrRequest {
            image_base64: STANDARD.encode(&raster.png_bytes),
            mime_type: "image/png",
            page: raster.page_number,
            width: raster.width,
            height: raster.height,
            language,
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ExtractError::OcrFailed {
                page: raster.page_number,
                details: format!(
                    "request to {} returned {}",
                    self.config.endpoint,
                    response.status()
                ),
            });
        }

        let payload: OcrResponse = response.json().await?;
        response_text(&payload, raster.page_number)
    }
}

fn response_text(payload: &OcrResponse, page: u32) -> Result<String, ExtractError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|entry| entry.text.as_ref().map(|text| text.trim()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed.join("\n"));
        }
    }

    if let Some(raw_text) = &payload.text {
        return Ok(raw_text.trim().to_string());
    }

    if payload.pages.is_some() {
        return Ok(String::new());
    }

    Err(ExtractError::OcrFailed {
        page,
        details: "response carried neither pages nor text".to_string(),
    })
}
