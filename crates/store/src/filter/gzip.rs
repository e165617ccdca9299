use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::blob::{BlobRead, BlobStore, BlobWrite};

pub const DEFAULT_LEVEL: u32 = 6;

/// Transparent gzip compression over a blob store.
pub struct GzipFilter {
    inner: Box<dyn BlobStore>,
    level: Compression,
}

impl GzipFilter {
    /// `level` is clamped to the valid 0..=9 gzip range.
    pub fn new(inner: Box<dyn BlobStore>, level: u32) -> Self {
        Self {
            inner,
            level: Compression::new(level.min(9)),
        }
    }
}

struct GzipReader {
    inner: Option<GzDecoder<Box<dyn BlobRead>>>,
}

impl Read for GzipReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(decoder) => decoder.read(buf),
            None => Err(closed()),
        }
    }
}

impl BlobRead for GzipReader {
    fn close(&mut self) -> io::Result<()> {
        let Some(decoder) = self.inner.take() else {
            return Ok(());
        };
        let mut base = decoder.into_inner();
        base.close()
    }
}

struct GzipWriter {
    inner: Option<GzEncoder<Box<dyn BlobWrite>>>,
}

impl Write for GzipWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(encoder) => encoder.write(buf),
            None => Err(closed()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Some(encoder) => encoder.flush(),
            None => Err(closed()),
        }
    }
}

impl BlobWrite for GzipWriter {
    fn close(&mut self) -> io::Result<()> {
        let Some(mut encoder) = self.inner.take() else {
            return Ok(());
        };
        // Flush the gzip footer into the base, then close the base as
        // well even if the footer write failed. First error wins.
        let transform = encoder.try_finish();
        match encoder.finish() {
            Ok(mut base) => transform.and(base.close()),
            Err(err) => transform.and(Err(err)),
        }
    }
}

pub(crate) fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "handle already closed")
}

impl BlobStore for GzipFilter {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let base = self.inner.get_reader(id)?;
        Ok(Box::new(GzipReader {
            inner: Some(GzDecoder::new(base)),
        }))
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let base = self.inner.get_writer(id)?;
        Ok(Box::new(GzipWriter {
            inner: Some(GzEncoder::new(base, self.level)),
        }))
    }

    fn has(&self, id: &str) -> bool {
        self.inner.has(id)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        self.inner.delete(id)
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        self.inner.list(prefix)
    }
}
