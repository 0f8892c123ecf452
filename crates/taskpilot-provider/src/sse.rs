//! Server-sent events decoding shared by the HTTP adapters.

use crate::error::ProviderError;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{BoxStream, Stream, StreamExt};

/// Turn a streaming HTTP response into a stream of SSE data payloads.
///
/// Events without data (pings, keepalives) are skipped.
pub(crate) fn data_stream<S, B>(bytes: S) -> BoxStream<'static, Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    bytes
        .eventsource()
        .filter_map(|event| async move {
            match event {
                Ok(event) if event.data.trim().is_empty() => None,
                Ok(event) => Some(Ok(event.data)),
                Err(EventStreamError::Transport(e)) => Some(Err(ProviderError::Http(e))),
                Err(e) => Some(Err(ProviderError::StreamError(e.to_string()))),
            }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn payloads(chunks: Vec<&'static [u8]>) -> Vec<String> {
        let chunks: Vec<Result<Vec<u8>, reqwest::Error>> =
            chunks.into_iter().map(|c| Ok(c.to_vec())).collect();
        data_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_data_stream_over_chunks() {
        let out = payloads(vec![b"data: one\n\nda", b"ta: two\n\ndata: [DONE]\n\n"]).await;
        assert_eq!(out, vec!["one", "two", "[DONE]"]);
    }

    #[tokio::test]
    async fn test_split_json_payload() {
        let out = payloads(vec![b"data: {\"a\":", b"1}\n\n"]).await;
        assert_eq!(out, vec!["{\"a\":1}"]);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        // "é" is 0xC3 0xA9
        let out = payloads(vec![b"data: caf\xC3", b"\xA9\n\n"]).await;
        assert_eq!(out, vec!["café"]);
    }

    #[tokio::test]
    async fn test_skips_event_and_comment_lines() {
        let out = payloads(vec![b"event: ping\n\n: keepalive\ndata: {}\r\n\r\n"]).await;
        assert_eq!(out, vec!["{}"]);
    }
}
