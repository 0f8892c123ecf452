//! Text stream handle returned by `stream_text`.

use crate::error::ProviderError;
use crate::types::{StreamEvent, Usage};
use futures::stream::{BoxStream, Stream, StreamExt};
use pin_project::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Called once when the stream is fully drained, with the final usage.
pub type CompletionHook = Box<dyn FnOnce(Option<Usage>) + Send>;

/// Incremental text output from a provider.
///
/// Yields text deltas. Usage reported by the backend is accumulated and
/// becomes available through [`TextStream::usage`] once the stream ends.
#[pin_project]
pub struct TextStream {
    #[pin]
    inner: BoxStream<'static, Result<StreamEvent, ProviderError>>,
    usage: Option<Usage>,
    finished: bool,
    on_complete: Option<CompletionHook>,
}

impl TextStream {
    /// Wrap a raw adapter event stream.
    pub fn new(inner: BoxStream<'static, Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            inner,
            usage: None,
            finished: false,
            on_complete: None,
        }
    }

    /// Build a stream from a fixed list of events.
    pub fn from_events(events: Vec<Result<StreamEvent, ProviderError>>) -> Self {
        Self::new(futures::stream::iter(events).boxed())
    }

    /// Run `hook` with the final usage after the last event. Replaces any
    /// earlier hook.
    pub fn on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Usage seen so far; complete only after the stream has ended.
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Whether the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain the stream and return the full text.
    pub async fn collect_text(&mut self) -> Result<String, ProviderError> {
        let mut text = String::new();
        while let Some(delta) = self.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }

    fn merge_usage(current: &mut Option<Usage>, input: u64, output: u64) {
        let usage = current.get_or_insert_with(Usage::default);
        // Backends report input and output in separate events.
        usage.input_tokens = usage.input_tokens.max(input);
        usage.output_tokens = usage.output_tokens.max(output);
    }
}

impl Stream for TextStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.finished {
                return Poll::Ready(None);
            }
            match futures::ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(StreamEvent::TextDelta { delta })) => {
                    if !delta.is_empty() {
                        return Poll::Ready(Some(Ok(delta)));
                    }
                }
                Some(Ok(StreamEvent::Usage { input, output })) => {
                    Self::merge_usage(this.usage, input, output);
                }
                Some(Ok(StreamEvent::Done { .. })) => {}
                Some(Ok(StreamEvent::Error(message))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(ProviderError::StreamError(message))));
                }
                Some(Err(e)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.finished = true;
                    if let Some(hook) = this.on_complete.take() {
                        hook(*this.usage);
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("usage", &self.usage)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
