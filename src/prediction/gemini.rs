use super::{is_affirmative, parse_prediction, HbPredictor, PredictionError, PredictionResult};
use crate::{blob::ImageBlob, config::GeminiConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

pub const VALIDATION_PROMPT: &str =
    "Is this a clear, close-up image of a human finger's nailbed? Answer only with 'yes' or 'no'.";

pub const PREDICTION_PROMPT: &str = "Analyze the provided image of a human nailbed. \
Based on the color, pallor, and other visual indicators, estimate the hemoglobin (Hb) level in g/dL.

Provide your response in JSON format. The JSON object should have three fields:
1. \"hbValue\": A floating-point number representing the estimated Hb level.
2. \"confidence\": A number between 0 and 1 indicating your confidence in the estimation.
3. \"analysis\": A brief, one or two-sentence analysis explaining the reasoning based on the nailbed's appearance.

This is a simulation for an AI demonstration. Do not include any medical disclaimers in your JSON response. Only return the JSON object.";

const LOGGED_BODY_CHARS: usize = 500;

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Part<'a> {
    InlineData { mime_type: &'static str, data: String },
    Text(&'a str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, with all of its text parts joined.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn prediction_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "hbValue": { "type": "NUMBER", "description": "Estimated Hemoglobin value in g/dL" },
            "confidence": { "type": "NUMBER", "description": "Confidence score from 0.0 to 1.0" },
            "analysis": { "type": "STRING", "description": "Brief analysis of the nailbed image" }
        },
        "required": ["hbValue", "confidence", "analysis"]
    })
}

fn build_request<'a>(
    image: &ImageBlob,
    prompt: &'a str,
    generation_config: Option<GenerationConfig>,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    mime_type: image.mime().as_str(),
                    data: image.to_base64(),
                },
                Part::Text(prompt),
            ],
        }],
        generation_config,
    }
}

/// [`HbPredictor`] backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiPredictor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiPredictor {
    pub fn new(config: &GeminiConfig) -> Result<Self, PredictionError> {
        if config.api_key.trim().is_empty() {
            return Err(PredictionError::Configuration(
                "Gemini API key is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.get_endpoint(),
            api_key: config.api_key.clone(),
        })
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<String, PredictionError> {
        tracing::debug!(endpoint = %self.endpoint, "Sending request to Gemini");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let preview: String = body.chars().take(LOGGED_BODY_CHARS).collect();
        tracing::debug!(status = status.as_u16(), body = %preview, "Gemini response");

        if !status.is_success() {
            return Err(PredictionError::Api {
                status: status.as_u16(),
                body: preview,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;

        parsed.text().ok_or(PredictionError::EmptyResponse)
    }
}

#[async_trait]
impl HbPredictor for GeminiPredictor {
    /// Fails closed: any error talking to the model yields `Ok(false)`.
    #[instrument(skip(self, image), fields(mime = %image.mime(), bytes = image.len()))]
    async fn validate(&self, image: &ImageBlob) -> Result<bool, PredictionError> {
        let request = build_request(image, VALIDATION_PROMPT, None);

        match self.generate_content(&request).await {
            Ok(answer) => {
                let valid = is_affirmative(&answer);
                tracing::info!(valid, "Image validation answered");
                Ok(valid)
            }
            Err(e) => {
                tracing::error!("Error validating image, rejecting it: {}", e);
                Ok(false)
            }
        }
    }

    #[instrument(skip(self, image), fields(mime = %image.mime(), bytes = image.len()))]
    async fn predict(&self, image: &ImageBlob) -> Result<PredictionResult, PredictionError> {
        let request = build_request(
            image,
            PREDICTION_PROMPT,
            Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prediction_schema(),
            }),
        );

        let text = self.generate_content(&request).await?;
        let result = parse_prediction(&text)?;
        tracing::info!(
            hb_value = result.hb_value,
            confidence = result.confidence,
            "Hb prediction received"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{fixtures::JPEG, ImageMime};

    fn image() -> ImageBlob {
        ImageBlob::new(JPEG.to_vec(), ImageMime::Jpeg).unwrap()
    }

    #[test]
    fn test_validation_request_body() {
        let request = build_request(&image(), VALIDATION_PROMPT, None);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        { "inline_data": { "mime_type": "image/jpeg", "data": "/9j/4AAQSkZJRg==" } },
                        { "text": VALIDATION_PROMPT }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_prediction_request_carries_schema() {
        let request = build_request(
            &image(),
            PREDICTION_PROMPT,
            Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prediction_schema(),
            }),
        );
        let body = serde_json::to_value(&request).unwrap();

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(
            config["responseSchema"]["required"],
            json!(["hbValue", "confidence", "analysis"])
        );
        assert_eq!(
            config["responseSchema"]["properties"]["analysis"]["type"],
            "STRING"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"hbValue\": 13.2," }, { "text": " \"confidence\": 0.8}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();

        assert_eq!(
            response.text().as_deref(),
            Some("{\"hbValue\": 13.2, \"confidence\": 0.8}")
        );
    }

    #[test]
    fn test_response_without_text() {
        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert_eq!(blocked.text(), None);

        let no_parts: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert_eq!(no_parts.text(), None);
    }

    #[test]
    fn test_rejects_empty_api_key() {
        let config = GeminiConfig {
            api_base: "http://127.0.0.1:1".into(),
            model: "gemini-2.5-flash".into(),
            api_key: "  ".into(),
            request_timeout_secs: 5,
        };
        assert!(matches!(
            GeminiPredictor::new(&config),
            Err(PredictionError::Configuration(_))
        ));
    }
}
