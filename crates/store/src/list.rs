use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::contract::Document;

/// Capacity of the channel between a list producer and its consumer.
/// Slow consumers exert backpressure on the producer instead of letting
/// it buffer the whole result set.
const CHANNEL_CAPACITY: usize = 64;

/// A finite, single-pass stream of documents fed by a background
/// producer task.
///
/// The producer runs until it has emitted every matching document or
/// until the consumer goes away. Dropping the stream (or calling
/// [`DocStream::cancel`]) closes the channel and aborts the producer,
/// so an abandoned list never leaks a task.
#[derive(Debug)]
pub struct DocStream {
    rx: mpsc::Receiver<Document>,
    producer: Option<JoinHandle<()>>,
}

impl DocStream {
    /// Spawn an async producer. The closure receives the sending half;
    /// `send().await` blocks once the channel is full.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Document>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(producer(tx));
        Self {
            rx,
            producer: Some(handle),
        }
    }

    /// Spawn a blocking producer for backends that only expose
    /// synchronous iteration. The closure must use
    /// [`mpsc::Sender::blocking_send`] and stop when it fails.
    pub fn spawn_blocking<F>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Document>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || producer(tx));
        Self {
            rx,
            producer: Some(handle),
        }
    }

    /// A stream over an already-materialized result set.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self::spawn(|tx| async move {
            for doc in docs {
                if tx.send(doc).await.is_err() {
                    return;
                }
            }
        })
    }

    /// Stop the stream early. The channel is closed so a blocked
    /// producer unblocks on its next send, the producer task is
    /// aborted and already-buffered documents are discarded.
    pub fn cancel(&mut self) {
        self.rx.close();
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        while self.rx.try_recv().is_ok() {}
    }

    /// Keep one out of every `n` documents: the n-th, the 2n-th and so
    /// on, resetting the counter after each emission.
    ///
    /// `n <= 1` returns the stream unchanged.
    pub fn every(self, n: u64) -> Self {
        if n <= 1 {
            return self;
        }
        let mut inner = self;
        Self::spawn(move |tx| async move {
            let mut counter: u64 = 0;
            while let Some(doc) = inner.rx.recv().await {
                counter += 1;
                if counter % n == 0 {
                    counter = 0;
                    if tx.send(doc).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    /// Drain the stream into a vector. Test and small-result helper;
    /// production paths should consume incrementally.
    pub async fn collect_all(mut self) -> Vec<Document> {
        let mut docs = Vec::new();
        while let Some(doc) = self.rx.recv().await {
            docs.push(doc);
        }
        docs
    }
}

impl Stream for DocStream {
    type Item = Document;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for DocStream {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;

    fn doc(i: usize) -> Document {
        Document {
            key: format!("{i:04}"),
            value: vec![],
        }
    }

    #[tokio::test]
    async fn test_streams_all_documents_in_order() {
        let docs: Vec<_> = (0..200).map(doc).collect();
        let out = DocStream::from_documents(docs.clone()).collect_all().await;
        assert_eq!(out, docs);
    }

    #[tokio::test]
    async fn test_every_decimates() {
        let docs: Vec<_> = (0..1000).map(doc).collect();
        let out = DocStream::from_documents(docs).every(100).collect_all().await;
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].key, "0099");
        assert_eq!(out[1].key, "0199");
        assert_eq!(out[9].key, "0999");
    }

    #[tokio::test]
    async fn test_every_one_is_identity() {
        let docs: Vec<_> = (0..10).map(doc).collect();
        let out = DocStream::from_documents(docs.clone())
            .every(1)
            .collect_all()
            .await;
        assert_eq!(out, docs);
    }

    #[tokio::test]
    async fn test_cancel_stops_stream() {
        let docs: Vec<_> = (0..1000).map(doc).collect();
        let mut stream = DocStream::from_documents(docs);
        let first = stream.next().await;
        assert_eq!(first.map(|d| d.key), Some("0000".to_string()));
        stream.cancel();
        // Remaining buffered items are discarded; stream terminates.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_blocking_producer() {
        let stream = DocStream::spawn_blocking(|tx| {
            for i in 0..50 {
                if tx.blocking_send(doc(i)).is_err() {
                    return;
                }
            }
        });
        let out = stream.collect_all().await;
        assert_eq!(out.len(), 50);
    }
}
