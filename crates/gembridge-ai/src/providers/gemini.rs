use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{GeminiConfig, VIDEO_MODEL};
use crate::error::ProviderError;
use crate::traits::GenerativeBackend;
use crate::types::{
    ChatReply, ChatRequest, GeneratedImage, ImageBatchRequest, ImageBatchResponse, VideoOperation,
    VideoPoll, VideoRequest,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiBackend {
    config: GeminiConfig,
    client: Client,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/v1beta/{}",
            self.config.base_url.trim_end_matches('/'),
            operation.trim_start_matches('/')
        )
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, ProviderError> {
        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(payload)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }
        Ok(res.json().await?)
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.chat_model.clone());
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.role.as_wire(),
                    "parts": [{"text": turn.text}]
                })
            })
            .collect();
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{"text": request.prompt}]
        }));

        let mut body = serde_json::json!({"contents": contents});
        if let Some(instruction) = &request.system_instruction {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": instruction}]
            });
        }

        debug!(model = %model, turns = request.history.len(), "gemini chat request");
        let parsed = self
            .post_json(&self.model_url(&model, "generateContent"), &body)
            .await?;

        let parts = parsed
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.pointer("/content/parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no candidates in chat response".to_string())
            })?;

        let mut text = String::new();
        for part in parts {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
        }
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "chat response contained no text parts".to_string(),
            ));
        }

        Ok(ChatReply { text, model })
    }

    async fn generate_images(
        &self,
        request: ImageBatchRequest,
    ) -> Result<ImageBatchResponse, ProviderError> {
        let payload = serde_json::to_value(ImagenPredictRequest {
            instances: vec![ImagenInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: u32::from(request.count),
                aspect_ratio: request.aspect.as_wire().to_string(),
            },
        })?;

        debug!(model = %request.model, count = request.count, "imagen predict request");
        let parsed: ImagenPredictResponse = serde_json::from_value(
            self.post_json(&self.model_url(&request.model, "predict"), &payload)
                .await?,
        )?;

        if parsed.predictions.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "image request returned no predictions".to_string(),
            ));
        }

        let images = parsed
            .predictions
            .into_iter()
            .map(|p| GeneratedImage {
                data: p.bytes_base64_encoded,
                mime_type: p.mime_type.unwrap_or_else(|| "image/png".to_string()),
            })
            .collect();

        Ok(ImageBatchResponse {
            images,
            model: request.model,
        })
    }

    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, ProviderError> {
        let mut instance = serde_json::json!({"prompt": request.prompt});
        if let Some((data, mime)) = &request.first_frame {
            instance["image"] = serde_json::json!({
                "bytesBase64Encoded": data,
                "mimeType": mime
            });
        }
        let payload = serde_json::json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": request.aspect.as_wire(),
                "resolution": request.resolution.as_wire()
            }
        });

        debug!(model = VIDEO_MODEL, "veo start request");
        let parsed = self
            .post_json(&self.model_url(VIDEO_MODEL, "predictLongRunning"), &payload)
            .await?;

        let name = parsed
            .get("name")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("video start returned no operation name".to_string())
            })?;

        Ok(VideoOperation {
            name: name.to_string(),
        })
    }

    async fn poll_video(&self, operation: &str) -> Result<VideoPoll, ProviderError> {
        let res = self
            .client
            .get(self.operation_url(operation))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }
        let parsed: Value = res.json().await?;

        if let Some(err) = parsed.get("error") {
            return Err(ProviderError::InvalidResponse(format!(
                "video operation failed: {err}"
            )));
        }
        if !parsed.get("done").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(VideoPoll::Processing);
        }

        let uri = parsed
            .pointer("/response/generateVideoResponse/generatedSamples")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(|s| s.pointer("/video/uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "completed video operation carried no sample uri".to_string(),
                )
            })?;

        debug!(uri = %uri, "downloading completed video");
        let download = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        if !download.status().is_success() {
            let status = download.status().as_u16();
            let body = download.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }
        let mime_type = download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let data = download.bytes().await?.to_vec();

        Ok(VideoPoll::Complete { data, mime_type })
    }
}

#[derive(Debug, Serialize)]
struct ImagenPredictRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct ImagenPredictResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    bytes_base64_encoded: String,
    mime_type: Option<String>,
}
