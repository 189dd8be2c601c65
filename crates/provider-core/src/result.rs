//! Terminal values of a non-streaming generation.

use serde::Serialize;

use crate::attachment::FileInfo;
use crate::error::ProviderError;
use crate::request::GenerateRequest;

/// A successful non-streaming generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// The model that actually answered.
    pub model: String,
    pub temperature: f32,
    pub attached_files: Vec<FileInfo>,
}

impl Completion {
    /// A completion for `request`, answered by `model`.
    pub fn for_request(request: &GenerateRequest, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            temperature: request.temperature,
            attached_files: request.file_infos(),
        }
    }
}

/// Outcome of one branch, as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_files: Option<Vec<FileInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResult {
    /// Build from a successful completion.
    pub fn succeeded(completion: Completion) -> Self {
        let attached_files = if completion.attached_files.is_empty() {
            None
        } else {
            Some(completion.attached_files)
        };

        Self {
            success: true,
            response: Some(completion.text),
            model: completion.model,
            temperature: completion.temperature,
            attached_files,
            error: None,
        }
    }

    /// Build from a failure. The request's own model, temperature and
    /// attachments are echoed back.
    pub fn failed(request: &GenerateRequest, default_model: &str, error: &ProviderError) -> Self {
        let files = request.file_infos();
        Self {
            success: false,
            response: None,
            model: request.model_or(default_model).to_string(),
            temperature: request.temperature,
            attached_files: if files.is_empty() { None } else { Some(files) },
            error: Some(error.to_string()),
        }
    }

    /// Build from either outcome.
    pub fn from_outcome(
        request: &GenerateRequest,
        default_model: &str,
        outcome: Result<Completion, ProviderError>,
    ) -> Self {
        match outcome {
            Ok(completion) => Self::succeeded(completion),
            Err(err) => Self::failed(request, default_model, &err),
        }
    }

    /// The text shown in place of the response: the answer, or the error.
    pub fn display_text(&self) -> &str {
        self.response
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;

    #[test]
    fn test_succeeded_result() {
        let request = GenerateRequest::new("hi", "claude-3-5-haiku-latest").with_temperature(0.3);
        let completion = Completion::for_request(&request, "claude-3-5-haiku-latest", "hola");
        let result = ProviderResult::succeeded(completion);

        assert!(result.success);
        assert_eq!(result.display_text(), "hola");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["model"], "claude-3-5-haiku-latest");
        assert!(json.get("attachedFiles").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_result_echoes_request() {
        let request = GenerateRequest::new("hi", "")
            .with_attachments(vec![Attachment::document("1", "a.pdf", "x", 1)]);
        let err = ProviderError::RateLimited;
        let result = ProviderResult::from_outcome(&request, "grok-3-mini-fast", Err(err));

        assert!(!result.success);
        assert_eq!(result.model, "grok-3-mini-fast");
        assert_eq!(result.display_text(), "Límite de uso de API excedido");
        assert_eq!(result.attached_files.as_ref().map(Vec::len), Some(1));
    }
}
