//! Attachment types shared by the adapters and the orchestrator.

use serde::{Deserialize, Serialize};

/// Generic kind string used when an image's concrete format is unknown.
pub const GENERIC_IMAGE: &str = "image";

/// Kind string for PDF documents.
pub const PDF: &str = "pdf";

/// Media type of PDF documents.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// What kind of file an attachment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// A raster image, always carried as a base64 data URL.
    #[serde(rename = "image")]
    Image,
    /// A PDF document, carried as extracted text and/or a preview.
    #[serde(rename = "pdf")]
    Document,
}

impl AttachmentKind {
    /// The wire name of this kind (`image` or `pdf`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => GENERIC_IMAGE,
            AttachmentKind::Document => PDF,
        }
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file, already reduced to something a model can embed.
///
/// Images always carry `inline_base64`. Documents carry `extracted_text`
/// and/or an `inline_base64` preview. Use [`Attachment::is_embeddable`]
/// to check the invariant on records built by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Opaque identifier assigned at ingestion.
    pub id: String,
    /// Original file name, shown back to the user.
    pub display_name: String,
    /// Image or document.
    pub kind: AttachmentKind,
    /// Size of the original upload in bytes.
    pub size_bytes: u64,
    /// `data:<mime>;base64,<payload>` URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_base64: Option<String>,
    /// Text extracted from a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

impl Attachment {
    /// Create an image attachment from a base64 data URL.
    pub fn image(
        id: impl Into<String>,
        display_name: impl Into<String>,
        data_url: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: AttachmentKind::Image,
            size_bytes,
            inline_base64: Some(data_url.into()),
            extracted_text: None,
        }
    }

    /// Create a document attachment from its extracted text.
    pub fn document(
        id: impl Into<String>,
        display_name: impl Into<String>,
        extracted_text: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: AttachmentKind::Document,
            size_bytes,
            inline_base64: None,
            extracted_text: Some(extracted_text.into()),
        }
    }

    /// Attach a preview image (data URL) to this attachment.
    pub fn with_preview(mut self, data_url: impl Into<String>) -> Self {
        self.inline_base64 = Some(data_url.into());
        self
    }

    /// Whether the record carries the payload its kind requires.
    pub fn is_embeddable(&self) -> bool {
        match self.kind {
            AttachmentKind::Image => self.inline_base64.is_some(),
            AttachmentKind::Document => {
                self.extracted_text.is_some() || self.inline_base64.is_some()
            }
        }
    }

    /// Parse the inline payload as a data URL.
    pub fn data_url(&self) -> Option<DataUrl<'_>> {
        self.inline_base64.as_deref().and_then(parse_data_url)
    }

    /// The declared media type of the inline payload, e.g. `image/png`.
    pub fn media_type(&self) -> Option<&str> {
        self.data_url().map(|url| url.media_type)
    }

    /// The file type string used by the capability gate.
    ///
    /// Images report their concrete format (`png`, `jpeg`, ...) when the
    /// data URL declares one and fall back to the generic `image` kind
    /// otherwise. Documents are always `pdf`.
    pub fn gate_file_type(&self) -> String {
        match self.kind {
            AttachmentKind::Document => PDF.to_string(),
            AttachmentKind::Image => self
                .media_type()
                .and_then(|mime| mime.strip_prefix("image/"))
                .filter(|format| !format.is_empty())
                .map(|format| format.to_ascii_lowercase())
                .unwrap_or_else(|| GENERIC_IMAGE.to_string()),
        }
    }

    /// The name/kind echo sent back to clients.
    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            name: self.display_name.clone(),
            kind: self.kind,
        }
    }
}

/// Name and kind of an attachment, echoed back with every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
}

/// A borrowed view over a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub media_type: &'a str,
    pub data: &'a str,
}

/// Split a base64 data URL into media type and payload.
pub fn parse_data_url(url: &str) -> Option<DataUrl<'_>> {
    let rest = url.strip_prefix("data:")?;
    let (media_type, data) = rest.split_once(";base64,")?;
    if media_type.is_empty() || data.is_empty() {
        return None;
    }
    Some(DataUrl { media_type, data })
}
