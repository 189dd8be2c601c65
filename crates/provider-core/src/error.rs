//! Error types for provider operations.

use serde::Deserialize;
use thiserror::Error;

/// Errors a provider adapter can report for one branch.
///
/// The `Display` output of every variant is the message shown to the user
/// in place of the failed response, so it is phrased for end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider credential is absent or still set to its placeholder.
    #[error("API Key de {label} no configurada. Por favor, configure {env_var} en el archivo .env")]
    CredentialMissing { label: String, env_var: String },

    /// The upstream rejected the credential (HTTP 401).
    #[error("API Key de {label} inválida")]
    Unauthorized { label: String },

    /// The upstream rate-limited the request (HTTP 429).
    #[error("Límite de uso de API excedido")]
    RateLimited,

    /// Any other upstream failure, carrying the vendor message verbatim.
    #[error("{0}")]
    Upstream(String),

    /// The request never reached the upstream or the connection dropped.
    #[error("{0}")]
    Network(String),

    /// The upstream answered with a body we could not understand.
    #[error("Respuesta inválida del proveedor: {0}")]
    InvalidResponse(String),

    /// The adapter could not build its request.
    #[error("Configuración inválida: {0}")]
    Configuration(String),
}

/// Vendor error envelope. OpenAI, xAI, Anthropic and Gemini all wrap
/// their errors as `{"error": {"message": ..., ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ProviderError {
    /// Credential missing for the provider `label`, configured through `env_var`.
    pub fn credential_missing(label: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self::CredentialMissing {
            label: label.into(),
            env_var: env_var.into(),
        }
    }

    /// Map a non-success HTTP response into a branch error.
    ///
    /// 401 and 429 get their dedicated messages. Gemini reports bad keys
    /// and exhausted quota as 400/403 with a reason marker in the body, so
    /// those markers are recognised as well. Everything else keeps the
    /// vendor's own message, or `HTTP error! status: N` if there is none.
    pub fn from_response_body(label: &str, status: u16, body: &str) -> Self {
        if status == 401 || body.contains("API_KEY_INVALID") {
            return Self::Unauthorized {
                label: label.to_string(),
            };
        }

        if status == 429 || body.contains("QUOTA_EXCEEDED") || body.contains("RESOURCE_EXHAUSTED") {
            return Self::RateLimited;
        }

        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.error.message.is_empty() => {
                Self::Upstream(envelope.error.message)
            }
            _ => Self::Upstream(format!("HTTP error! status: {}", status)),
        }
    }

    /// Whether this is a credential problem on our side.
    pub fn is_credential_missing(&self) -> bool {
        matches!(self, Self::CredentialMissing { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_missing_message() {
        let err = ProviderError::credential_missing("OpenAI", "OPENAI_API_KEY");
        assert_eq!(
            err.to_string(),
            "API Key de OpenAI no configurada. Por favor, configure OPENAI_API_KEY en el archivo .env"
        );
        assert!(err.is_credential_missing());
    }

    #[test]
    fn test_status_401_maps_to_unauthorized() {
        let err = ProviderError::from_response_body("Anthropic", 401, "{}");
        assert_eq!(err.to_string(), "API Key de Anthropic inválida");
    }

    #[test]
    fn test_status_429_maps_to_rate_limit() {
        let err = ProviderError::from_response_body("xAI", 429, "");
        assert_eq!(err, ProviderError::RateLimited);
        assert_eq!(err.to_string(), "Límite de uso de API excedido");
    }

    #[test]
    fn test_gemini_markers() {
        let bad_key = r#"{"error":{"code":400,"message":"API key not valid","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(
            ProviderError::from_response_body("Gemini", 400, bad_key),
            ProviderError::Unauthorized { .. }
        ));

        let quota = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","message":"quota"}}"#;
        assert_eq!(
            ProviderError::from_response_body("Gemini", 403, quota),
            ProviderError::RateLimited
        );
    }

    #[test]
    fn test_other_status_keeps_vendor_message() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        let err = ProviderError::from_response_body("OpenAI", 404, body);
        assert_eq!(err.to_string(), "model not found");
    }

    #[test]
    fn test_other_status_without_body() {
        let err = ProviderError::from_response_body("OpenAI", 502, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "HTTP error! status: 502");
    }
}
