//! Speech input/output capability
//!
//! Recognition and synthesis sit behind [`SpeechIo`]; the assistant only ever
//! sees text. Both directions are best-effort: failures are logged and
//! surface as "nothing heard" or a silently dropped reply.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

#[async_trait]
pub trait SpeechIo: Send {
    /// Wait for the next utterance.
    ///
    /// `None` means nothing usable was heard before `timeout`, or that the
    /// input source is closed (see [`Self::is_closed`]).
    async fn capture(&mut self, timeout: Option<Duration>) -> Option<String>;

    /// Deliver a reply to the user
    async fn speak(&mut self, text: &str);

    /// Whether the input source has ended for good
    fn is_closed(&self) -> bool {
        false
    }
}

/// Text console standing in for microphone and speaker
pub struct ConsoleIo<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
    speaker: String,
    closed: bool,
}

impl ConsoleIo<tokio::io::Stdin, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> ConsoleIo<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            speaker: "Jarvis".to_string(),
            closed: false,
        }
    }

    async fn write_str(&mut self, text: &str) {
        if let Err(e) = self.try_write(text).await {
            tracing::warn!(error = %e, "Console write failed");
        }
    }

    async fn try_write(&mut self, text: &str) -> std::io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> SpeechIo for ConsoleIo<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn capture(&mut self, timeout: Option<Duration>) -> Option<String> {
        if self.closed {
            return None;
        }
        self.write_str("\nYou: ").await;

        let next = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.lines.next_line()).await {
                Ok(line) => line,
                Err(_) => {
                    tracing::debug!(timeout_secs = limit.as_secs(), "No input before timeout");
                    return None;
                }
            },
            None => self.lines.next_line().await,
        };

        match next {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Console read failed");
                self.closed = true;
                None
            }
        }
    }

    async fn speak(&mut self, text: &str) {
        let line = format!("\n{}: {text}\n", self.speaker);
        self.write_str(&line).await;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
