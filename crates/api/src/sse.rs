//! Encoding of orchestrator events as server-sent events.
//!
//! Single mode keeps the per-provider shape clients of a single model
//! expect. Multi mode tags every chunk with the branch index and keys
//! content by provider id, so several branches can share one stream.

use axum::response::sse::Event;
use fanout::TokenEvent;
use provider_core::FileInfo;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// How events are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single,
    Multi,
}

#[derive(Serialize)]
struct FilesInfo<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    files: &'a [FileInfo],
    provider: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<usize>,
}

#[derive(Serialize)]
struct SingleDone<'a> {
    done: bool,
    provider: &'a str,
    model: &'a str,
    temperature: f32,
}

#[derive(Serialize)]
struct BranchDone<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    provider: &'a str,
    branch: usize,
    model: &'a str,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelChanged<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    provider: &'a str,
    branch: usize,
    requested_model: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct FileWarning<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    provider: &'a str,
    branch: usize,
    message: &'a str,
}

/// The JSON text for `event`, or `None` if the mode has no representation
/// for it. Structs go straight to a string so `f32` temperatures keep
/// their shortest form.
pub fn render(event: &TokenEvent, mode: Mode) -> Option<String> {
    let value = match (event, mode) {
        (TokenEvent::ModelSubstituted { branch, provider, requested, model }, _) => {
            serde_json::to_string(&ModelChanged {
                kind: "model_changed",
                provider,
                branch: *branch,
                requested_model: requested,
                model,
            })
        }
        (TokenEvent::AttachmentWarning { branch, provider, message }, _) => {
            serde_json::to_string(&FileWarning {
                kind: "file_warning",
                provider,
                branch: *branch,
                message,
            })
        }
        (TokenEvent::FilesInfo { branch, provider, files }, mode) => {
            serde_json::to_string(&FilesInfo {
                kind: "files_info",
                files,
                provider,
                branch: (mode == Mode::Multi).then_some(*branch),
            })
        }
        (TokenEvent::Content { provider, text, .. }, Mode::Single) => {
            Ok(json!({ "content": text, "provider": provider }).to_string())
        }
        (TokenEvent::Content { branch, provider, text }, Mode::Multi) => {
            let mut map = Map::new();
            map.insert(provider.clone(), Value::from(text.as_str()));
            map.insert("branch".to_string(), Value::from(*branch));
            Ok(Value::Object(map).to_string())
        }
        (TokenEvent::BranchDone { provider, model, temperature, .. }, Mode::Single) => {
            serde_json::to_string(&SingleDone {
                done: true,
                provider,
                model,
                temperature: *temperature,
            })
        }
        (TokenEvent::BranchDone { branch, provider, model, temperature }, Mode::Multi) => {
            serde_json::to_string(&BranchDone {
                kind: "branch_done",
                provider,
                branch: *branch,
                model,
                temperature: *temperature,
            })
        }
        (TokenEvent::BranchError { provider, message, .. }, Mode::Single) => {
            Ok(json!({ "error": message, "provider": provider }).to_string())
        }
        (TokenEvent::BranchError { branch, provider, message }, Mode::Multi) => {
            let mut map = Map::new();
            map.insert(format!("{}Error", provider), Value::from(message.as_str()));
            map.insert("error".to_string(), Value::from(message.as_str()));
            map.insert("provider".to_string(), Value::from(provider.as_str()));
            map.insert("branch".to_string(), Value::from(*branch));
            Ok(Value::Object(map).to_string())
        }
        // The branch's own done event already closed a single stream.
        (TokenEvent::AllDone, Mode::Single) => return None,
        (TokenEvent::AllDone, Mode::Multi) => Ok(json!({ "done": true }).to_string()),
    };

    match value {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("Failed to encode stream event: {}", e);
            None
        }
    }
}

/// Encode `event` as an SSE `data:` frame.
pub fn encode(event: &TokenEvent, mode: Mode) -> Option<Event> {
    render(event, mode).map(|text| Event::default().data(text))
}
