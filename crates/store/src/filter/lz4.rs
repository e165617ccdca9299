use std::io::{self, Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::blob::{BlobRead, BlobStore, BlobWrite};

use super::gzip::closed;

/// Transparent lz4 frame compression over a blob store.
pub struct Lz4Filter {
    inner: Box<dyn BlobStore>,
}

impl Lz4Filter {
    pub fn new(inner: Box<dyn BlobStore>) -> Self {
        Self { inner }
    }
}

struct Lz4Reader {
    inner: Option<FrameDecoder<Box<dyn BlobRead>>>,
}

impl Read for Lz4Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(decoder) => decoder.read(buf),
            None => Err(closed()),
        }
    }
}

impl BlobRead for Lz4Reader {
    fn close(&mut self) -> io::Result<()> {
        let Some(decoder) = self.inner.take() else {
            return Ok(());
        };
        decoder.into_inner().close()
    }
}

struct Lz4Writer {
    inner: Option<FrameEncoder<Box<dyn BlobWrite>>>,
}

impl Write for Lz4Writer {
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

impl BlobWrite for Lz4Writer {
    fn close(&mut self) -> io::Result<()> {
        let Some(encoder) = self.inner.take() else {
            return Ok(());
        };
        // finish() consumes the encoder; on failure the sink is gone,
        // so the base close cannot be attempted separately.
        match encoder.finish() {
            Ok(mut base) => base.close(),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    }
}

impl BlobStore for Lz4Filter {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let base = self.inner.get_reader(id)?;
        Ok(Box::new(Lz4Reader {
            inner: Some(FrameDecoder::new(base)),
        }))
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let base = self.inner.get_writer(id)?;
        Ok(Box::new(Lz4Writer {
            inner: Some(FrameEncoder::new(base)),
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::testutil::MemBlobStore;

    #[test]
    fn test_roundtrip() {
        let mem = MemBlobStore::new();
        let filter = Lz4Filter::new(Box::new(mem.clone()));

        let payload = b"abcabcabc".repeat(100);
        let mut writer = filter.get_writer("k").unwrap();
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        assert_ne!(mem.raw("k").unwrap(), payload);

        let mut reader = filter.get_reader("k").unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        reader.close().unwrap();
        assert_eq!(buf, payload);
    }
}
