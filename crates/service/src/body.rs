use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::warn;

use cask_store::prelude::DocStream;

/// Renders a document stream as an incrementally emitted JSON array.
///
/// The opening bracket is held back until the first document arrives
/// so an empty result collapses to a single `[]` chunk. A document
/// that fails to serialize is skipped, matching the storage layer's
/// skip-and-continue behavior for undecodable entries.
pub struct JsonArrayBody {
    stream: DocStream,
    started: bool,
    done: bool,
}

impl JsonArrayBody {
    pub fn new(stream: DocStream) -> Self {
        Self {
            stream,
            started: false,
            done: false,
        }
    }
}

impl Stream for JsonArrayBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            match self.stream.poll_next_unpin(cx) {
                Poll::Ready(Some(doc)) => {
                    let json = match serde_json::to_string(&doc) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(key = doc.key, %err, "skipping unserializable document");
                            continue;
                        }
                    };
                    let chunk = if self.started {
                        format!(",{json}")
                    } else {
                        self.started = true;
                        format!("[{json}")
                    };
                    return Poll::Ready(Some(Ok(Bytes::from(chunk))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    let tail = if self.started { "]" } else { "[]" };
                    return Poll::Ready(Some(Ok(Bytes::from_static(tail.as_bytes()))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
