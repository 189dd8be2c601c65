//! Per-branch attachment gating.

use provider_core::{can_process, Attachment};

/// What a branch may send after gating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateOutcome {
    /// Attachments the branch forwards: all of them or none.
    pub approved: Vec<Attachment>,
    /// One `"<model>: <reason>"` line per rejected attachment.
    pub warnings: Vec<String>,
}

impl GateOutcome {
    /// Whether the branch keeps its attachments.
    pub fn files_processed(&self) -> bool {
        !self.approved.is_empty()
    }
}

/// Whether `model` admits every attachment.
pub fn admits_all(model: &str, attachments: &[Attachment]) -> bool {
    attachments
        .iter()
        .all(|a| can_process(model, &a.gate_file_type(), a.size_bytes).is_allowed())
}

/// Gate `attachments` against `model`.
///
/// All-or-nothing: a single rejection strips every attachment from the
/// branch, which then runs text-only.
pub fn gate_attachments(model: &str, attachments: &[Attachment]) -> GateOutcome {
    let warnings: Vec<String> = attachments
        .iter()
        .filter_map(|a| {
            let admission = can_process(model, &a.gate_file_type(), a.size_bytes);
            if admission.can_process {
                return None;
            }
            admission.reason.map(|reason| format!("{}: {}", model, reason))
        })
        .collect();

    if warnings.is_empty() {
        GateOutcome {
            approved: attachments.to_vec(),
            warnings,
        }
    } else {
        GateOutcome {
            approved: Vec::new(),
            warnings,
        }
    }
}
