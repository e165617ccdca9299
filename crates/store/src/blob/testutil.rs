use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BlobRead, BlobStore, BlobWrite};

/// In-memory blob store for filter tests. Written blobs only become
/// visible once their writer is closed, mirroring the durability
/// contract of the real stores.
#[derive(Default, Clone)]
pub(crate) struct MemBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemBlobStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raw stored bytes, bypassing any filter chain on top.
    pub(crate) fn raw(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(id).cloned()
    }
}

struct MemReader(Cursor<Vec<u8>>);

impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl BlobRead for MemReader {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MemWriter {
    id: String,
    buf: Vec<u8>,
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWrite for MemWriter {
    fn close(&mut self) -> io::Result<()> {
        self.blobs
            .lock()
            .insert(self.id.clone(), std::mem::take(&mut self.buf));
        Ok(())
    }
}

impl BlobStore for MemBlobStore {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let blob = self
            .blobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no blob {id:?}")))?;
        Ok(Box::new(MemReader(Cursor::new(blob))))
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        Ok(Box::new(MemWriter {
            id: id.to_string(),
            buf: Vec::new(),
            blobs: Arc::clone(&self.blobs),
        }))
    }

    fn has(&self, id: &str) -> bool {
        self.blobs.lock().contains_key(id)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        self.blobs
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no blob {id:?}")))
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        Ok(self
            .blobs
            .lock()
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect())
    }
}
