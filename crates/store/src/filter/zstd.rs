use std::io::{self, BufReader, Read, Write};

use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

use crate::blob::{BlobRead, BlobStore, BlobWrite};

use super::gzip::closed;

pub const DEFAULT_LEVEL: i32 = 3;

/// Transparent zstd compression over a blob store.
pub struct ZstdFilter {
    inner: Box<dyn BlobStore>,
    level: i32,
}

impl ZstdFilter {
    pub fn new(inner: Box<dyn BlobStore>, level: i32) -> Self {
        Self { inner, level }
    }
}

struct ZstdReader {
    inner: Option<Decoder<'static, BufReader<Box<dyn BlobRead>>>>,
}

impl Read for ZstdReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(decoder) => decoder.read(buf),
            None => Err(closed()),
        }
    }
}

impl BlobRead for ZstdReader {
    fn close(&mut self) -> io::Result<()> {
        let Some(decoder) = self.inner.take() else {
            return Ok(());
        };
        decoder.finish().into_inner().close()
    }
}

struct ZstdWriter {
    inner: Option<Encoder<'static, Box<dyn BlobWrite>>>,
}

impl Write for ZstdWriter {
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

impl BlobWrite for ZstdWriter {
    fn close(&mut self) -> io::Result<()> {
        let Some(encoder) = self.inner.take() else {
            return Ok(());
        };
        // finish() consumes the encoder; on failure the sink is gone,
        // so the base close cannot be attempted separately.
        let mut base = encoder.finish()?;
        base.close()
    }
}

impl BlobStore for ZstdFilter {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let base = self.inner.get_reader(id)?;
        Ok(Box::new(ZstdReader {
            inner: Some(Decoder::new(base)?),
        }))
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let base = self.inner.get_writer(id)?;
        Ok(Box::new(ZstdWriter {
            inner: Some(Encoder::new(base, self.level)?),
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
