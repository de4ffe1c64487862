//! Ordering-enforcing message emitter.
//!
//! Wraps an outbound channel sender and guarantees the streaming
//! protocol: `START` exactly once before any content, at most one
//! `CONTEXT`, exactly one terminal `END`/`ERROR`, and nothing after the
//! terminal message. Violations are swallowed with a warning rather than
//! corrupting the stream.

use ragline_core::envelope::StreamMessage;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    NotStarted,
    Open,
    Closed,
}

/// Producer-side handle for one client stream.
pub struct Emitter {
    tx: mpsc::Sender<StreamMessage>,
    state: ChannelState,
    context_sent: bool,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<StreamMessage>) -> Self {
        Self {
            tx,
            state: ChannelState::NotStarted,
            context_sent: false,
        }
    }

    /// Channel with the given buffer, returning the consumer receiver.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Whether the stream has been terminated.
    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    pub async fn start(&mut self) {
        match self.state {
            ChannelState::NotStarted => {
                self.state = ChannelState::Open;
                self.send(StreamMessage::Start).await;
            }
            _ => warn!("START emitted more than once, dropping"),
        }
    }

    pub async fn chunk(&mut self, content: impl Into<String>) {
        let message = StreamMessage::Chunk {
            content: content.into(),
        };
        self.send_content(message).await;
    }

    pub async fn context(&mut self, docs: Vec<ragline_core::retrieval::RetrievalCandidate>) {
        if self.context_sent {
            warn!("CONTEXT emitted more than once, dropping");
            return;
        }
        self.context_sent = true;
        self.send_content(StreamMessage::Context { docs }).await;
    }

    pub async fn monitor(&mut self, content: serde_json::Value) {
        self.send_content(StreamMessage::Monitor { content }).await;
    }

    /// Terminal success. Idempotent: a second terminal is dropped.
    pub async fn end(&mut self) {
        self.terminate(StreamMessage::End).await;
    }

    /// Terminal failure. The connection itself stays open for further
    /// requests; only this stream is finished.
    pub async fn error(&mut self, message: impl Into<String>) {
        self.terminate(StreamMessage::Error {
            message: message.into(),
        })
        .await;
    }

    async fn send_content(&mut self, message: StreamMessage) {
        match self.state {
            ChannelState::NotStarted => {
                warn!(message_type = message.message_type(), "Content before START, dropping");
            }
            ChannelState::Closed => {
                warn!(message_type = message.message_type(), "Content after terminal, dropping");
            }
            ChannelState::Open => self.send(message).await,
        }
    }

    async fn terminate(&mut self, message: StreamMessage) {
        match self.state {
            ChannelState::Closed => {
                warn!("Terminal message after terminal, dropping");
            }
            ChannelState::NotStarted => {
                // An error can legitimately happen before START (e.g.
                // invalid request); open implicitly so the client still
                // gets a well-formed stream.
                self.send(StreamMessage::Start).await;
                self.state = ChannelState::Closed;
                self.send(message).await;
            }
            ChannelState::Open => {
                self.state = ChannelState::Closed;
                self.send(message).await;
            }
        }
    }

    async fn send(&self, message: StreamMessage) {
        if self.tx.send(message).await.is_err() {
            warn!("Stream consumer dropped, message lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::Receiver<StreamMessage>) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Some(message) = rx.recv().await {
            types.push(message.message_type());
        }
        types
    }

    #[tokio::test]
    async fn happy_path_ordering() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.start().await;
        emitter.context(vec![]).await;
        emitter.chunk("Hello.").await;
        emitter.chunk(" Bye.").await;
        emitter.end().await;
        drop(emitter);

        assert_eq!(
            collect(rx).await,
            vec!["START", "CONTEXT", "CHUNK", "CHUNK", "END"]
        );
    }

    #[tokio::test]
    async fn content_before_start_dropped() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.chunk("too early").await;
        emitter.start().await;
        emitter.end().await;
        drop(emitter);

        assert_eq!(collect(rx).await, vec!["START", "END"]);
    }

    #[tokio::test]
    async fn nothing_after_terminal() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.start().await;
        emitter.end().await;
        emitter.chunk("late").await;
        emitter.error("late error").await;
        drop(emitter);

        assert_eq!(collect(rx).await, vec!["START", "END"]);
    }

    #[tokio::test]
    async fn double_start_dropped() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.start().await;
        emitter.start().await;
        emitter.end().await;
        drop(emitter);

        assert_eq!(collect(rx).await, vec!["START", "END"]);
    }

    #[tokio::test]
    async fn second_context_dropped() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.start().await;
        emitter.context(vec![]).await;
        emitter.context(vec![]).await;
        emitter.end().await;
        drop(emitter);

        assert_eq!(collect(rx).await, vec!["START", "CONTEXT", "END"]);
    }

    #[tokio::test]
    async fn is_closed_flips_only_on_terminal() {
        let (mut emitter, _rx) = Emitter::channel(16);
        assert!(!emitter.is_closed());
        emitter.start().await;
        emitter.chunk("still open").await;
        assert!(!emitter.is_closed());
        emitter.end().await;
        assert!(emitter.is_closed());
    }

    #[tokio::test]
    async fn error_before_start_still_wellformed() {
        let (mut emitter, rx) = Emitter::channel(16);
        emitter.error("bad request").await;
        drop(emitter);

        assert_eq!(collect(rx).await, vec!["START", "ERROR"]);
    }
}
