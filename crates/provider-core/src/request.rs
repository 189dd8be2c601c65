//! The request handed to an adapter, plus helpers for turning its
//! attachments into vendor content parts.

use tracing::{debug, warn};

use crate::attachment::{Attachment, AttachmentKind, DataUrl, FileInfo};

/// Temperature used when a branch does not specify one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion budget sent to every vendor.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// A single-branch generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Model id. Empty means "the adapter's first model".
    pub model: String,
    pub temperature: f32,
    /// Attachments already approved for this branch.
    pub attachments: Vec<Attachment>,
}

impl GenerateRequest {
    /// Create a text-only request with the default temperature.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            attachments: Vec::new(),
        }
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the attachments.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Name/kind echo of the attachments.
    pub fn file_infos(&self) -> Vec<FileInfo> {
        self.attachments.iter().map(Attachment::file_info).collect()
    }

    /// The model to call, falling back to `default` when none was set.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.model.is_empty() {
            default
        } else {
            &self.model
        }
    }
}

/// Text part carrying a document's extracted content.
pub fn document_text_part(name: &str, text: &str) -> String {
    format!("Contenido del PDF \"{}\":\n\n{}", name, text)
}

/// Vendor-neutral content part derived from an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart<'a> {
    Image(DataUrl<'a>),
    Text(String),
}

/// Convert attachments into content parts for `provider`.
///
/// Images whose media type is not in `accepted_media_types` are dropped
/// with a warning, as are images without a parseable data URL. Documents
/// contribute their extracted text; a document that only carries a
/// preview is skipped.
pub fn attachment_parts<'a>(
    provider: &str,
    attachments: &'a [Attachment],
    accepted_media_types: Option<&[&str]>,
) -> Vec<ContentPart<'a>> {
    let mut parts = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        match attachment.kind {
            AttachmentKind::Image => {
                let Some(url) = attachment.data_url() else {
                    warn!(
                        provider,
                        file = %attachment.display_name,
                        "Dropping image without a valid data URL"
                    );
                    continue;
                };

                if let Some(accepted) = accepted_media_types {
                    if !accepted.contains(&url.media_type) {
                        warn!(
                            provider,
                            file = %attachment.display_name,
                            media_type = url.media_type,
                            "Dropping image with unsupported media type"
                        );
                        continue;
                    }
                }

                parts.push(ContentPart::Image(url));
            }
            AttachmentKind::Document => match attachment.extracted_text.as_deref() {
                Some(text) => parts.push(ContentPart::Text(document_text_part(
                    &attachment.display_name,
                    text,
                ))),
                None => debug!(
                    provider,
                    file = %attachment.display_name,
                    "Document has no extracted text, skipping"
                ),
            },
        }
    }

    parts
}
