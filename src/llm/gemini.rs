use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ImageModel, LlmError, TextModel};
use crate::config::LlmConfig;

/// Client for the Generative Language REST API (Gemini text, Imagen images).
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
}

/// A model as listed by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

impl GeminiClient {
    pub fn new(cfg: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model: cfg.text_model.clone(),
            image_model: cfg.image_model.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    /// All models visible to this API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let resp = self
            .client
            .get(format!("{}/v1beta/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        let list: ModelList = check(resp).await?.json().await?;
        Ok(list.models)
    }
}

async fn check(resp: Response) -> Result<Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TextModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.text_model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let resp = self
            .client
            .post(self.model_url(&self.text_model, "generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;
        let body: GenerateResponse = check(resp).await?.json().await?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or(LlmError::MissingContent("candidates"))?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.is_empty() {
            return Err(LlmError::MissingContent("text"));
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.image_model
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, LlmError> {
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 }
        });
        let resp = self
            .client
            .post(self.model_url(&self.image_model, "predict"))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;
        let body: PredictResponse = check(resp).await?.json().await?;

        let encoded = body
            .predictions
            .into_iter()
            .next()
            .and_then(|p| p.bytes_base64_encoded)
            .ok_or(LlmError::MissingContent("image data"))?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GeminiClient {
        let cfg = LlmConfig {
            base_url: server.base_url(),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        GeminiClient::new(&cfg, "test-key".into()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_joins_parts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.0-flash:generateContent")
                    .query_param("key", "test-key")
                    .body_contains("Analyze the sentiment");
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": " POSITIVE" }, { "text": "\n" }] }
                    }]
                }));
            })
            .await;

        let reply = client(&server)
            .generate("Analyze the sentiment of: sunny day")
            .await
            .unwrap();
        assert_eq!(reply, "POSITIVE");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_without_candidates_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({ "candidates": [] }));
            })
            .await;

        let err = client(&server).generate("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingContent("candidates")));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(403).body("API key not valid");
            })
            .await;

        let err = client(&server).generate("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_generate_image_decodes_payload() {
        let server = MockServer::start_async().await;
        let png = vec![0x89u8, b'P', b'N', b'G'];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/imagen-3.0-generate-002:predict")
                    .body_contains("sampleCount");
                then.status(200).json_body(serde_json::json!({
                    "predictions": [{ "bytesBase64Encoded": encoded, "mimeType": "image/png" }]
                }));
            })
            .await;

        let bytes = client(&server).generate_image("a street").await.unwrap();
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1beta/models");
                then.status(200).json_body(serde_json::json!({
                    "models": [
                        { "name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                        { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] }
                    ]
                }));
            })
            .await;

        let models = client(&server).list_models().await.unwrap();
        let usable: Vec<_> = models.iter().filter(|m| m.supports_generate_content()).collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "models/gemini-2.0-flash");
    }
}
