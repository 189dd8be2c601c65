//! Server-Sent Events relay shared by the streaming adapters.
//!
//! Every vendor streams over SSE but frames its payloads differently. An
//! adapter supplies a parser that turns one `(event, data)` pair into a
//! [`Frame`]; [`relay`] handles the connection, cancellation, status
//! mapping and the terminal-event contract.

use futures::stream::{self, StreamExt};
use reqwest::RequestBuilder;
use reqwest_eventsource::{Error as SseError, Event, EventSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attachment::FileInfo;
use crate::error::ProviderError;
use crate::event::{EventStream, StreamEvent};

/// What a vendor parser made of one SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to forward.
    Content(String),
    /// Nothing to forward (pings, metadata, empty deltas).
    Skip,
    /// The vendor signalled the end of the response.
    Done,
    /// The vendor reported an error in-band.
    Error(String),
}

struct Relay<P> {
    label: String,
    source: EventSource,
    cancel: CancellationToken,
    parse: P,
}

impl<P> Relay<P>
where
    P: FnMut(&str, &str) -> Frame + Send + 'static,
{
    /// Next event to forward, or `None` once cancelled.
    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.source.next() => Some(next),
            };

            let Some(next) = polled else {
                debug!(provider = %self.label, "Stream cancelled, closing upstream connection");
                self.source.close();
                return None;
            };

            match next {
                None | Some(Err(SseError::StreamEnded)) => return Some(StreamEvent::Done),
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => {
                    match (self.parse)(&message.event, &message.data) {
                        Frame::Skip => continue,
                        Frame::Content(text) => return Some(StreamEvent::Content(text)),
                        Frame::Done => return Some(StreamEvent::Done),
                        Frame::Error(msg) => return Some(StreamEvent::Error(msg)),
                    }
                }
                Some(Err(SseError::InvalidStatusCode(status, response))) => {
                    self.source.close();
                    let body = response.text().await.unwrap_or_default();
                    let err = ProviderError::from_response_body(&self.label, status.as_u16(), &body);
                    warn!(provider = %self.label, status = status.as_u16(), "Upstream rejected stream: {}", err);
                    return Some(StreamEvent::Error(err.to_string()));
                }
                Some(Err(SseError::Transport(err))) => {
                    warn!(provider = %self.label, "Stream transport error: {}", err);
                    return Some(StreamEvent::Error(ProviderError::from(err).to_string()));
                }
                Some(Err(err)) => {
                    warn!(provider = %self.label, "Stream error: {}", err);
                    return Some(StreamEvent::Error(ProviderError::Network(err.to_string()).to_string()));
                }
            }
        }
    }
}

/// Open `request` as an SSE stream and normalize it with `parse`.
///
/// The returned stream yields `FilesInfo(files)` first when `files` is
/// non-empty, then content, then exactly one terminal event. If `cancel`
/// fires first, the stream ends with no terminal event and the connection
/// is closed.
pub fn relay<P>(
    label: &str,
    request: RequestBuilder,
    files: Vec<FileInfo>,
    cancel: CancellationToken,
    parse: P,
) -> Result<EventStream, ProviderError>
where
    P: FnMut(&str, &str) -> Frame + Send + 'static,
{
    let source = EventSource::new(request)
        .map_err(|e| ProviderError::Configuration(e.to_string()))?;

    let head = if files.is_empty() {
        None
    } else {
        Some(StreamEvent::FilesInfo(files))
    };

    let state = Some(Relay {
        label: label.to_string(),
        source,
        cancel,
        parse,
    });

    let body = stream::unfold(state, |state| async move {
        let mut relay = state?;
        let event = relay.next_event().await?;
        if event.is_terminal() {
            relay.source.close();
            Some((event, None))
        } else {
            Some((event, Some(relay)))
        }
    });

    Ok(stream::iter(head).chain(body).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return its URL.
    async fn serve_once(status: &'static str, content_type: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn openai_like(_event: &str, data: &str) -> Frame {
        if data == "[DONE]" {
            return Frame::Done;
        }
        match serde_json::from_str::<serde_json::Value>(data) {
            Ok(value) => match value["delta"].as_str() {
                Some(text) if !text.is_empty() => Frame::Content(text.to_string()),
                _ => Frame::Skip,
            },
            Err(e) => Frame::Error(e.to_string()),
        }
    }

    #[tokio::test]
    async fn test_relay_content_then_done() {
        let body = "data: {\"delta\":\"Hola\"}\n\ndata: {\"delta\":\"\"}\n\ndata: {\"delta\":\" mundo\"}\n\ndata: [DONE]\n\n".to_string();
        let url = serve_once("200 OK", "text/event-stream", body).await;

        let files = vec![FileInfo {
            name: "a.png".into(),
            kind: AttachmentKind::Image,
        }];
        let stream = relay(
            "Test",
            reqwest::Client::new().get(&url),
            files.clone(),
            CancellationToken::new(),
            openai_like,
        )
        .unwrap();

        let events: Vec<StreamEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::FilesInfo(files),
                StreamEvent::Content("Hola".into()),
                StreamEvent::Content(" mundo".into()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_relay_end_of_body_is_done() {
        let url = serve_once(
            "200 OK",
            "text/event-stream",
            "data: {\"delta\":\"x\"}\n\n".to_string(),
        )
        .await;

        let events: Vec<StreamEvent> = relay(
            "Test",
            reqwest::Client::new().get(&url),
            vec![],
            CancellationToken::new(),
            openai_like,
        )
        .unwrap()
        .collect()
        .await;

        assert_eq!(events, vec![StreamEvent::Content("x".into()), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_relay_maps_status() {
        let url = serve_once(
            "401 Unauthorized",
            "application/json",
            "{\"error\":{\"message\":\"bad key\"}}".to_string(),
        )
        .await;

        let events: Vec<StreamEvent> = relay(
            "OpenAI",
            reqwest::Client::new().get(&url),
            vec![],
            CancellationToken::new(),
            openai_like,
        )
        .unwrap()
        .collect()
        .await;

        assert_eq!(
            events,
            vec![StreamEvent::Error("API Key de OpenAI inválida".into())]
        );
    }

    #[tokio::test]
    async fn test_relay_cancelled_has_no_terminal_event() {
        let url = serve_once(
            "200 OK",
            "text/event-stream",
            "data: {\"delta\":\"x\"}\n\ndata: [DONE]\n\n".to_string(),
        )
        .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let events: Vec<StreamEvent> = relay(
            "Test",
            reqwest::Client::new().get(&url),
            vec![],
            cancel,
            openai_like,
        )
        .unwrap()
        .collect()
        .await;

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_relay_cancel_mid_stream_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;

            let frame = "data: {\"delta\":\"x\"}\n\n";
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
            let chunk = format!("{:x}\r\n{}\r\n", frame.len(), frame);
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(chunk.as_bytes()).await.unwrap();

            // Hold the response open until the client hangs up.
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        let cancel = CancellationToken::new();
        let mut stream = relay(
            "Test",
            reqwest::Client::new().get(&url),
            vec![],
            cancel.clone(),
            openai_like,
        )
        .unwrap();

        assert_eq!(stream.next().await, Some(StreamEvent::Content("x".into())));

        cancel.cancel();
        assert_eq!(stream.next().await, None);

        tokio::time::timeout(std::time::Duration::from_secs(5), closed_rx)
            .await
            .expect("upstream connection still open after cancel")
            .unwrap();
    }
}
