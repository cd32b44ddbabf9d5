//! Pull-based streamed chat replies.
//!
//! A [`ChatStream`] is lazy: the request that opens the vendor stream only runs when
//! the first delta is pulled, and every later pull performs its read on the caller's
//! task. It is forward-only and cannot be restarted.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use aibridge_types::Result;

/// One incremental piece of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatDelta {
    pub text: String,
    pub finish_reason: Option<String>,
    /// The vendor chunk this delta was decoded from.
    pub raw: serde_json::Value,
}

pub struct ChatStream {
    inner: BoxStream<'static, Result<ChatDelta>>,
    finished: bool,
    pulled: usize,
}

impl ChatStream {
    /// Wrap an already-open delta stream.
    pub fn new(inner: BoxStream<'static, Result<ChatDelta>>) -> Self {
        Self {
            inner,
            finished: false,
            pulled: 0,
        }
    }

    /// Defer `open` until the first pull. Its error becomes the first item.
    pub fn deferred<F>(open: F) -> Self
    where
        F: Future<Output = Result<BoxStream<'static, Result<ChatDelta>>>> + Send + 'static,
    {
        Self::new(stream::once(open).try_flatten().boxed())
    }

    /// Pull the next delta. `None` marks the end; every later call returns `None` too.
    ///
    /// An error ends the stream after it is returned.
    pub async fn next_chunk(&mut self) -> Option<Result<ChatDelta>> {
        StreamExt::next(self).await
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of deltas pulled so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    /// Drain the stream, concatenating the text of every delta.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(delta) = self.next_chunk().await {
            text.push_str(&delta?.text);
        }
        Ok(text)
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatDelta>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(delta))) => {
                self.pulled += 1;
                Poll::Ready(Some(Ok(delta)))
            }
            Poll::Ready(Some(Err(err))) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use aibridge_types::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn delta(text: &str) -> ChatDelta {
        ChatDelta {
            text: text.into(),
            finish_reason: None,
            raw: serde_json::Value::Null,
        }
    }

    fn counting_stream(opens: Arc<AtomicUsize>, parts: Vec<&'static str>) -> ChatStream {
        ChatStream::deferred(async move {
            opens.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<ChatDelta>> = parts.into_iter().map(|p| Ok(delta(p))).collect();
            Ok(stream::iter(items).boxed())
        })
    }

    #[tokio::test]
    async fn deferred_stream_opens_on_first_pull() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_stream(opens.clone(), vec!["Hel", "lo"]);
        assert_eq!(opens.load(Ordering::SeqCst), 0);

        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.text, "Hel");
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        let second = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.text, "lo");
        assert_eq!(stream.pulled(), 2);
        assert!(!stream.is_finished());

        assert!(stream.next_chunk().await.is_none());
        assert!(stream.is_finished());
        assert!(stream.next_chunk().await.is_none());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_unpulled_stream_never_opens() {
        let opens = Arc::new(AtomicUsize::new(0));
        let stream = counting_stream(opens.clone(), vec!["x"]);
        drop(stream);
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_failure_is_first_item_then_end() {
        let mut stream = ChatStream::deferred(async {
            Err::<BoxStream<'static, Result<ChatDelta>>, _>(BridgeError::Auth {
                provider: "gemini".into(),
            })
        });
        let first = stream.next_chunk().await.unwrap();
        assert!(matches!(first, Err(BridgeError::Auth { .. })));
        assert!(stream.is_finished());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn mid_stream_error_ends_stream() {
        let items: Vec<Result<ChatDelta>> = vec![
            Ok(delta("a")),
            Err(BridgeError::remote_protocol("gemini", "bad chunk")),
            Ok(delta("never")),
        ];
        let mut stream = ChatStream::new(stream::iter(items).boxed());
        assert_eq!(stream.next_chunk().await.unwrap().unwrap().text, "a");
        assert!(stream.next_chunk().await.unwrap().is_err());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn collect_text_concatenates() {
        let opens = Arc::new(AtomicUsize::new(0));
        let stream = counting_stream(opens, vec!["a", "b", "c"]);
        assert_eq!(stream.collect_text().await.unwrap(), "abc");
    }
}
