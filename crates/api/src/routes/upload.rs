//! Attachment registration and the capability probe.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use fanout::AttachmentStore;
use indexmap::IndexMap;
use provider_core::{can_process, parse_data_url, Admission, Attachment, AttachmentKind, PDF_MEDIA_TYPE};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::routes::{done, Envelope};
use crate::state::AppState;

const MB: u64 = 1024 * 1024;

/// Body of `POST /api/upload/check-capabilities`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityQuery {
    pub models: Option<Vec<String>>,
    pub file_types: Option<Vec<String>>,
}

/// Representative size used when probing a file type.
fn probe_size(file_type: &str) -> u64 {
    if file_type == "pdf" {
        5 * MB
    } else {
        2 * MB
    }
}

/// Admission matrix: model, then file type.
pub async fn check_capabilities(
    payload: std::result::Result<Json<CapabilityQuery>, JsonRejection>,
) -> Result<Json<Envelope<IndexMap<String, IndexMap<String, Admission>>>>> {
    let Json(query) = payload?;
    let (Some(models), Some(file_types)) = (query.models, query.file_types) else {
        return Err(ApiError::BadRequest("Faltan parámetros requeridos".to_string()));
    };

    let matrix = models
        .into_iter()
        .map(|model| {
            let row = file_types
                .iter()
                .map(|file_type| {
                    let admission = can_process(&model, file_type, probe_size(file_type));
                    (file_type.clone(), admission)
                })
                .collect();
            (model, row)
        })
        .collect();

    Ok(Envelope::ok(matrix))
}

/// Body of `POST /api/upload/file`: an upload that was already reduced to
/// a base64 payload and/or extracted text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFile {
    pub name: String,
    pub mime_type: String,
    /// Raw base64 or a full data URL.
    pub base64: Option<String>,
    pub text: Option<String>,
    /// Size of the original file in bytes, when the client knows it.
    pub size: Option<u64>,
}

/// Summary of a stored attachment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FileSummary {
    fn new(attachment: &Attachment) -> Self {
        let mime_type = match attachment.kind {
            AttachmentKind::Document => PDF_MEDIA_TYPE.to_string(),
            AttachmentKind::Image => attachment.media_type().unwrap_or("image").to_string(),
        };

        Self {
            id: attachment.id.clone(),
            name: attachment.display_name.clone(),
            kind: attachment.kind,
            size: attachment.size_bytes,
            mime_type,
            base64: None,
            text: None,
        }
    }

    fn with_payload(attachment: &Attachment) -> Self {
        Self {
            base64: attachment.inline_base64.clone(),
            text: attachment.extracted_text.clone(),
            ..Self::new(attachment)
        }
    }
}

/// Decoded length of a base64 payload.
fn decoded_len(data: &str) -> u64 {
    let padding = data.bytes().rev().take_while(|b| *b == b'=').count();
    ((data.len() / 4) * 3).saturating_sub(padding) as u64
}

/// Turn a registration body into an attachment with a fresh id.
fn build_attachment(body: RegisterFile) -> Result<Attachment> {
    let mime_type = body.mime_type.trim().to_ascii_lowercase();

    let data_url = match body.base64.filter(|b| !b.trim().is_empty()) {
        Some(b) if b.starts_with("data:") => Some(b),
        Some(b) => Some(format!("data:{};base64,{}", mime_type, b.trim())),
        None => None,
    };
    let payload_size = match &data_url {
        Some(url) => {
            let parsed = parse_data_url(url)
                .ok_or_else(|| ApiError::BadRequest("Datos base64 inválidos".to_string()))?;
            Some(decoded_len(parsed.data))
        }
        None => None,
    };
    let text = body.text.filter(|t| !t.trim().is_empty());

    let id = AttachmentStore::new_id();

    if mime_type.starts_with("image/") {
        let (Some(url), Some(size)) = (data_url, payload_size) else {
            return Err(ApiError::BadRequest("Faltan parámetros requeridos".to_string()));
        };
        return Ok(Attachment::image(id, body.name, url, body.size.unwrap_or(size)));
    }

    if mime_type == PDF_MEDIA_TYPE {
        let attachment = match (text, data_url) {
            (None, None) => {
                return Err(ApiError::BadRequest("Faltan parámetros requeridos".to_string()));
            }
            (Some(text), preview) => {
                // A base64 payload next to extracted text is only a preview.
                let size = body.size.unwrap_or(text.len() as u64);
                let attachment = Attachment::document(id, body.name, text, size);
                match preview {
                    Some(url) => attachment.with_preview(url),
                    None => attachment,
                }
            }
            (None, Some(url)) => Attachment {
                id,
                display_name: body.name,
                kind: AttachmentKind::Document,
                size_bytes: body.size.or(payload_size).unwrap_or_default(),
                inline_base64: Some(url),
                extracted_text: None,
            },
        };
        return Ok(attachment);
    }

    Err(ApiError::BadRequest(format!(
        "Tipo de archivo no soportado: {}",
        mime_type
    )))
}

/// Register an attachment for later use by id.
pub async fn register_file(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterFile>, JsonRejection>,
) -> Result<Json<Envelope<FileSummary>>> {
    let Json(body) = payload?;
    let attachment = build_attachment(body)?;
    let summary = FileSummary::new(&attachment);

    info!(
        id = %summary.id,
        name = %summary.name,
        kind = %summary.kind,
        size = summary.size,
        "Registered attachment"
    );
    state.attachments.insert(attachment).await;

    Ok(Envelope::ok(summary))
}

/// Fetch a stored attachment with its payload.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<FileSummary>>> {
    let attachment = state
        .attachments
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound("Archivo no encontrado".to_string()))?;

    Ok(Envelope::ok(FileSummary::with_payload(&attachment)))
}

/// Delete a stored attachment.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.attachments.remove(&id).await {
        return Err(ApiError::NotFound("Archivo no encontrado".to_string()));
    }
    Ok(done("Archivo eliminado correctamente"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{app, call_json, state};

    #[test]
    fn test_decoded_len() {
        assert_eq!(decoded_len("AAAA"), 3);
        assert_eq!(decoded_len("AAA="), 2);
        assert_eq!(decoded_len("AA=="), 1);
        assert_eq!(decoded_len(""), 0);
    }

    #[test]
    fn test_build_attachment() {
        let image = build_attachment(RegisterFile {
            name: "foto.png".into(),
            mime_type: "image/png".into(),
            base64: Some("AAAA".into()),
            text: None,
            size: None,
        })
        .unwrap();
        assert_eq!(image.kind, AttachmentKind::Image);
        assert_eq!(image.inline_base64.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(image.size_bytes, 3);
        assert!(image.is_embeddable());

        let pdf = build_attachment(RegisterFile {
            name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            base64: None,
            text: Some("hola mundo".into()),
            size: None,
        })
        .unwrap();
        assert_eq!(pdf.kind, AttachmentKind::Document);
        assert_eq!(pdf.size_bytes, 10);

        let with_preview = build_attachment(RegisterFile {
            name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            base64: Some("data:image/png;base64,AAAAAAAAAAAA".into()),
            text: Some("hola mundo".into()),
            size: None,
        })
        .unwrap();
        assert_eq!(with_preview.size_bytes, 10);
        assert_eq!(with_preview.inline_base64.as_deref(), Some("data:image/png;base64,AAAAAAAAAAAA"));

        let declared = build_attachment(RegisterFile {
            name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            base64: Some("AAAA".into()),
            text: Some("hola mundo".into()),
            size: Some(40 * MB),
        })
        .unwrap();
        assert_eq!(declared.size_bytes, 40 * MB);

        let missing = build_attachment(RegisterFile {
            name: "foto.png".into(),
            mime_type: "image/png".into(),
            base64: None,
            text: None,
            size: None,
        });
        assert!(matches!(missing, Err(ApiError::BadRequest(_))));

        let unsupported = build_attachment(RegisterFile {
            name: "a.zip".into(),
            mime_type: "application/zip".into(),
            base64: Some("AAAA".into()),
            text: None,
            size: None,
        });
        assert!(matches!(unsupported, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_register_fetch_delete() {
        let app = app(state().await);

        let body = json!({ "name": "foto.png", "mimeType": "image/png", "base64": "AAAA" });
        let (status, json) = call_json(&app, "POST", "/api/upload/file", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "foto.png");
        assert_eq!(json["data"]["type"], "image");
        assert_eq!(json["data"]["size"], 3);
        assert_eq!(json["data"]["mimeType"], "image/png");
        assert!(json["data"].get("base64").is_none());

        let id = json["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/upload/file/{}", id);

        let (status, json) = call_json(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["base64"], "data:image/png;base64,AAAA");

        let (status, _) = call_json(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = call_json(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, json!({ "success": false, "error": "Archivo no encontrado" }));

        let (status, _) = call_json(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_capabilities() {
        let app = app(state().await);

        let body = json!({ "models": ["gpt-4o-mini-2024-07-18", "claude-3-5-haiku-latest"], "fileTypes": ["png", "pdf"] });
        let (status, json) = call_json(&app, "POST", "/api/upload/check-capabilities", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["gpt-4o-mini-2024-07-18"]["png"], json!({ "canProcess": true }));
        assert_eq!(json["data"]["gpt-4o-mini-2024-07-18"]["pdf"]["canProcess"], false);
        assert_eq!(json["data"]["claude-3-5-haiku-latest"]["pdf"], json!({ "canProcess": true }));

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/upload/check-capabilities",
            Some(json!({ "models": ["gpt-4o-mini-2024-07-18"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Faltan parámetros requeridos");

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/upload/check-capabilities",
            Some(json!({ "models": "gpt-4o-mini-2024-07-18", "fileTypes": ["png"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "success": false, "error": "Cuerpo de la solicitud inválido" }));
    }

    #[tokio::test]
    async fn test_register_malformed_body() {
        let app = app(state().await);

        let body = json!({ "mimeType": "image/png", "base64": "AAAA" });
        let (status, json) = call_json(&app, "POST", "/api/upload/file", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "success": false, "error": "Cuerpo de la solicitud inválido" }));
    }
}
