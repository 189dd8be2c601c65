//! Per-model attachment capabilities and the admission check built on them.
//!
//! The table is static data; [`can_process`] is a pure function over it
//! and can be called from any task without synchronization.

use serde::Serialize;

use crate::attachment::{GENERIC_IMAGE, PDF};

const MB: u64 = 1024 * 1024;

/// Image formats the vision-capable models accept.
pub const IMAGE_FORMATS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// What a model can do with attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub supports_vision: bool,
    pub supports_pdf: bool,
    /// Maximum image size in MB, if limited.
    pub max_image_mb: Option<u64>,
    /// Maximum PDF size in MB, if limited.
    pub max_pdf_mb: Option<u64>,
    /// Accepted image formats; `None` accepts any format.
    pub image_formats: Option<&'static [&'static str]>,
}

impl ModelCapabilities {
    /// Capabilities of a model we know nothing about.
    pub const NONE: ModelCapabilities = ModelCapabilities {
        supports_vision: false,
        supports_pdf: false,
        max_image_mb: None,
        max_pdf_mb: None,
        image_formats: None,
    };
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::NONE
    }
}

static CAPABILITIES: &[(&str, ModelCapabilities)] = &[
    // OpenAI
    (
        "gpt-4o-mini-2024-07-18",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: false,
            max_image_mb: Some(20),
            max_pdf_mb: None,
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
    ("gpt-3.5-turbo-0125", ModelCapabilities::NONE),
    // Gemini
    (
        "gemini-2.0-flash-lite",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: true,
            max_image_mb: Some(10),
            max_pdf_mb: Some(20),
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
    (
        "gemini-2.0-flash",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: true,
            max_image_mb: Some(15),
            max_pdf_mb: Some(30),
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
    // Anthropic
    (
        "claude-3-5-haiku-latest",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: true,
            max_image_mb: Some(5),
            max_pdf_mb: Some(10),
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
    (
        "claude-3-5-sonnet-20240620",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: true,
            max_image_mb: Some(5),
            max_pdf_mb: Some(10),
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
    // Grok
    (
        "grok-3-mini-fast",
        ModelCapabilities {
            supports_vision: false,
            supports_pdf: true,
            max_image_mb: None,
            max_pdf_mb: Some(25),
            image_formats: Some(&[]),
        },
    ),
    (
        "grok-2-vision-1212",
        ModelCapabilities {
            supports_vision: true,
            supports_pdf: true,
            max_image_mb: Some(20),
            max_pdf_mb: Some(25),
            image_formats: Some(IMAGE_FORMATS),
        },
    ),
];

/// Look up a model's capabilities. Unknown models support nothing.
pub fn lookup(model: &str) -> ModelCapabilities {
    CAPABILITIES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, caps)| *caps)
        .unwrap_or(ModelCapabilities::NONE)
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub can_process: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Admission {
    fn allowed() -> Self {
        Self {
            can_process: true,
            reason: None,
        }
    }

    fn denied(reason: String) -> Self {
        Self {
            can_process: false,
            reason: Some(reason),
        }
    }

    /// Whether the attachment may be sent.
    pub fn is_allowed(&self) -> bool {
        self.can_process
    }
}

/// Decide whether `model` can take an attachment of `file_type` and size.
///
/// `file_type` is either the generic `image` kind, a concrete image format
/// (`png`, `jpeg`, ...), or `pdf`. The generic kind means the format was
/// validated at ingestion, so it skips the per-format allow-list.
pub fn can_process(model: &str, file_type: &str, size_bytes: u64) -> Admission {
    let caps = lookup(model);
    let file_type = file_type.to_ascii_lowercase();

    let is_generic_image = file_type == GENERIC_IMAGE;
    let is_image = is_generic_image || IMAGE_FORMATS.contains(&file_type.as_str());

    if is_image {
        if !caps.supports_vision {
            return Admission::denied(format!(
                "El modelo {} no soporta análisis de imágenes",
                model
            ));
        }

        if let Some(max) = caps.max_image_mb {
            if size_bytes > max * MB {
                return Admission::denied(format!(
                    "La imagen excede el tamaño máximo de {}MB para {}",
                    max, model
                ));
            }
        }

        if !is_generic_image {
            if let Some(formats) = caps.image_formats {
                if !formats.contains(&file_type.as_str()) {
                    return Admission::denied(format!(
                        "El modelo {} no soporta el formato {}",
                        model, file_type
                    ));
                }
            }
        }

        return Admission::allowed();
    }

    if file_type == PDF {
        if !caps.supports_pdf {
            return Admission::denied(format!("El modelo {} no soporta análisis de PDFs", model));
        }

        if let Some(max) = caps.max_pdf_mb {
            if size_bytes > max * MB {
                return Admission::denied(format!(
                    "El PDF excede el tamaño máximo de {}MB para {}",
                    max, model
                ));
            }
        }

        return Admission::allowed();
    }

    Admission::denied(format!("Tipo de archivo {} no soportado", file_type))
}
