use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::process::Command;
use tracing::debug;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use super::{OcrFuture, OcrRequest, OcrService};
use crate::pdf::command_exists;

const TOKEN_ENV_VARS: &[&str] = &["DOCUMENTAI_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

#[derive(Debug, Clone, Default)]
pub struct DocumentAiConfig {
    pub project: String,
    pub location: String,
    pub processor: String,
    /// Overrides the regional endpoint host, e.g. for a proxy.
    pub endpoint: Option<String>,
    pub access_token: String,
}

/// Google Document AI OCR processor over REST.
#[derive(Debug, Clone)]
pub struct DocumentAi {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl DocumentAi {
    pub fn new(config: DocumentAiConfig) -> Result<Self> {
        for (name, value) in [
            ("project", &config.project),
            ("location", &config.location),
            ("processor", &config.processor),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("Document AI {} is not configured", name));
            }
        }
        if config.access_token.trim().is_empty() {
            return Err(anyhow!("Document AI access token is empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url: process_url(&config),
            token: config.access_token.trim().to_string(),
        })
    }
}

fn process_url(config: &DocumentAiConfig) -> String {
    let location = config.location.trim();
    let base = config
        .endpoint
        .as_deref()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", location));
    format!(
        "{}/v1/projects/{}/locations/{}/processors/{}:process",
        base,
        config.project.trim(),
        location,
        config.processor.trim()
    )
}

// `imagelessMode` keeps the page images out of the response.
fn request_body(request: &OcrRequest<'_>) -> Value {
    json!({
        "imagelessMode": true,
        "processOptions": {
            "ocrConfig": {
                "enableImageQualityScores": true,
                "enableSymbol": request.enable_symbols,
                "hints": { "languageHints": [request.language] },
                "premiumFeatures": { "computeStyleInfo": request.style_info }
            }
        },
        "rawDocument": {
            "content": BASE64.encode(request.bytes),
            "mimeType": request.mime
        }
    })
}

impl OcrService for DocumentAi {
    fn recognize<'a>(&'a self, request: OcrRequest<'a>) -> OcrFuture<'a> {
        Box::pin(async move {
            let body = request_body(&request);
            let mut attempt = 0usize;
            let mut delay = RATE_LIMIT_BASE_DELAY;
            loop {
                attempt += 1;
                let response = self
                    .client
                    .post(&self.url)
                    .bearer_auth(&self.token)
                    .json(&body)
                    .send()
                    .await
                    .with_context(|| "failed to reach Document AI")?;

                let status = response.status();
                let retry_after = retry_after(response.headers());
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    return extract_document(&text);
                }
                if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                    delay = wait_with_backoff("Document AI", attempt, delay, retry_after).await;
                    continue;
                }
                return Err(anyhow!(
                    "Document AI error ({}): {}",
                    status,
                    extract_error(&text).unwrap_or(text)
                ));
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: Option<Value>,
}

/// The response `document` with page images removed, or `None` when the
/// service returned no document.
pub(crate) fn extract_document(text: &str) -> Result<Option<Value>> {
    let payload: ProcessResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Document AI response JSON: {}", err))?;
    let Some(mut document) = payload.document.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    if let Some(pages) = document.get_mut("pages").and_then(Value::as_array_mut) {
        for page in pages {
            if let Some(page) = page.as_object_mut() {
                page.remove("image");
            }
        }
    }
    Ok(Some(document))
}

fn extract_error(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    let error = value.get("error")?;
    let message = error.get("message")?.as_str()?;
    match error.get("status").and_then(Value::as_str) {
        Some(status) => Some(format!("{}: {}", status, message)),
        None => Some(message.to_string()),
    }
}

/// Token from `explicit`, the environment, or `gcloud auth print-access-token`.
pub fn resolve_access_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(token.to_string());
    }
    for name in TOKEN_ENV_VARS {
        if let Ok(value) = std::env::var(name)
            && !value.trim().is_empty()
        {
            debug!("using access token from {}", name);
            return Ok(value.trim().to_string());
        }
    }
    if command_exists("gcloud") {
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .with_context(|| "failed to run gcloud")?;
        if output.status.success() {
            let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !token.is_empty() {
                return Ok(token);
            }
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("gcloud auth print-access-token failed: {}", stderr.trim()));
    }
    Err(anyhow!(
        "no Document AI access token (checked --token, {}, gcloud)",
        TOKEN_ENV_VARS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrDocument, OcrMode};

    #[test]
    fn extracts_document_without_page_images() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/documentai_response.json"
        ));
        let document = extract_document(payload).unwrap().unwrap();
        assert!(document["pages"][0].get("image").is_none());

        let parsed = OcrDocument::from_value(document).unwrap();
        assert_eq!(parsed.full_text(), "Invoice 2024\nTotal due\n");
        let tokens = parsed.first_page().unwrap().elements(OcrMode::Tokens).unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(tokens[0].style().unwrap().bold);
    }

    #[test]
    fn missing_document_is_not_an_error() {
        assert!(extract_document(r#"{"humanReviewStatus":{}}"#).unwrap().is_none());
        assert!(extract_document("not json").is_err());
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            extract_error(body).as_deref(),
            Some("PERMISSION_DENIED: Permission denied")
        );
    }

    #[test]
    fn request_asks_for_symbols_and_style_when_wanted() {
        let request = OcrRequest {
            bytes: b"png",
            mime: "image/png",
            language: "de",
            enable_symbols: true,
            style_info: false,
        };
        let body = request_body(&request);
        insta::assert_json_snapshot!(body, @r###"
        {
          "imagelessMode": true,
          "processOptions": {
            "ocrConfig": {
              "enableImageQualityScores": true,
              "enableSymbol": true,
              "hints": {
                "languageHints": [
                  "de"
                ]
              },
              "premiumFeatures": {
                "computeStyleInfo": false
              }
            }
          },
          "rawDocument": {
            "content": "cG5n",
            "mimeType": "image/png"
          }
        }
        "###);
    }

    #[test]
    fn url_targets_regional_endpoint() {
        let config = DocumentAiConfig {
            project: "demo".to_string(),
            location: "eu".to_string(),
            processor: "abc123".to_string(),
            endpoint: None,
            access_token: "t".to_string(),
        };
        assert_eq!(
            process_url(&config),
            "https://eu-documentai.googleapis.com/v1/projects/demo/locations/eu/processors/abc123:process"
        );
        assert!(
            DocumentAi::new(DocumentAiConfig {
                processor: String::new(),
                ..config
            })
            .is_err()
        );
    }
}
