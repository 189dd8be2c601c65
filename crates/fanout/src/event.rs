//! Events on the merged, branch-tagged output stream.

use provider_core::FileInfo;

/// One event of a fan-out stream.
///
/// Every variant except `AllDone` carries the index of the branch it
/// belongs to (its position in the request's selection list) and that
/// branch's provider id. Within a branch the informational events come
/// first, then adapter output, then exactly one of `BranchDone` or
/// `BranchError`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    /// The branch runs a different model than requested.
    ModelSubstituted {
        branch: usize,
        provider: String,
        requested: String,
        model: String,
    },
    /// An attachment was rejected; the branch runs text-only.
    AttachmentWarning {
        branch: usize,
        provider: String,
        message: String,
    },
    /// Attachments the branch sent upstream.
    FilesInfo {
        branch: usize,
        provider: String,
        files: Vec<FileInfo>,
    },
    /// A chunk of generated text.
    Content {
        branch: usize,
        provider: String,
        text: String,
    },
    /// The branch finished normally.
    BranchDone {
        branch: usize,
        provider: String,
        model: String,
        temperature: f32,
    },
    /// The branch failed. Siblings are unaffected.
    BranchError {
        branch: usize,
        provider: String,
        message: String,
    },
    /// Every branch is terminal. Sent once, last, and never after a cancel.
    AllDone,
}

impl TokenEvent {
    /// The branch this event belongs to.
    pub fn branch(&self) -> Option<usize> {
        match self {
            TokenEvent::ModelSubstituted { branch, .. }
            | TokenEvent::AttachmentWarning { branch, .. }
            | TokenEvent::FilesInfo { branch, .. }
            | TokenEvent::Content { branch, .. }
            | TokenEvent::BranchDone { branch, .. }
            | TokenEvent::BranchError { branch, .. } => Some(*branch),
            TokenEvent::AllDone => None,
        }
    }

    /// The provider id of the branch this event belongs to.
    pub fn provider(&self) -> Option<&str> {
        match self {
            TokenEvent::ModelSubstituted { provider, .. }
            | TokenEvent::AttachmentWarning { provider, .. }
            | TokenEvent::FilesInfo { provider, .. }
            | TokenEvent::Content { provider, .. }
            | TokenEvent::BranchDone { provider, .. }
            | TokenEvent::BranchError { provider, .. } => Some(provider),
            TokenEvent::AllDone => None,
        }
    }

    /// Whether this event ends its branch.
    pub fn is_branch_terminal(&self) -> bool {
        matches!(
            self,
            TokenEvent::BranchDone { .. } | TokenEvent::BranchError { .. }
        )
    }
}
