use std::io::{self, Read, Write};

use aes::Aes256;
use ofb::cipher::{KeyIvInit, StreamCipher};
use ofb::Ofb;
use sha2::{Digest, Sha256};

use crate::blob::{BlobRead, BlobStore, BlobWrite};

use super::gzip::closed;

type Aes256Ofb = Ofb<Aes256>;

pub(crate) const KEY_SIZE: usize = 32;
pub(crate) const IV_SIZE: usize = 16;

/// AES-256-OFB encryption with a static key derived from a passphrase.
///
/// Every blob starts with a fresh random 16-byte IV, followed by the
/// OFB keystream applied to the plaintext. OFB gives confidentiality
/// only; there is no authentication tag, so tampering is not detected.
pub struct AesFilter {
    inner: Box<dyn BlobStore>,
    key: [u8; KEY_SIZE],
}

impl AesFilter {
    pub fn new(inner: Box<dyn BlobStore>, passphrase: &str) -> Self {
        Self {
            inner,
            key: derive_key(passphrase.as_bytes()),
        }
    }
}

/// SHA-256 of the input, used both for passphrases and for ECDH shared
/// secrets.
pub(crate) fn derive_key(input: &[u8]) -> [u8; KEY_SIZE] {
    Sha256::digest(input).into()
}

/// Write a fresh IV into `base` and return a writer that OFB-encrypts
/// everything that follows.
pub(crate) fn encrypt_writer(
    key: &[u8; KEY_SIZE],
    mut base: Box<dyn BlobWrite>,
) -> io::Result<Box<dyn BlobWrite>> {
    let mut iv = [0u8; IV_SIZE];
    getrandom::getrandom(&mut iv)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, format!("rng failure: {err}")))?;
    base.write_all(&iv)?;
    let cipher = Aes256Ofb::new(key.into(), &iv.into());
    Ok(Box::new(OfbWriter {
        inner: Some((cipher, base)),
    }))
}

/// Read the IV preamble from `base` and return a decrypting reader.
pub(crate) fn decrypt_reader(
    key: &[u8; KEY_SIZE],
    mut base: Box<dyn BlobRead>,
) -> io::Result<Box<dyn BlobRead>> {
    let mut iv = [0u8; IV_SIZE];
    if let Err(err) = base.read_exact(&mut iv) {
        let _ = base.close();
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("ciphertext too short: {err}"),
        ));
    }
    let cipher = Aes256Ofb::new(key.into(), &iv.into());
    Ok(Box::new(OfbReader {
        inner: Some((cipher, base)),
    }))
}

struct OfbReader {
    inner: Option<(Aes256Ofb, Box<dyn BlobRead>)>,
}

impl Read for OfbReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some((cipher, base)) = &mut self.inner else {
            return Err(closed());
        };
        let n = base.read(buf)?;
        cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

impl BlobRead for OfbReader {
    fn close(&mut self) -> io::Result<()> {
        let Some((_, mut base)) = self.inner.take() else {
            return Ok(());
        };
        base.close()
    }
}

struct OfbWriter {
    inner: Option<(Aes256Ofb, Box<dyn BlobWrite>)>,
}

impl Write for OfbWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some((cipher, base)) = &mut self.inner else {
            return Err(closed());
        };
        let mut encrypted = buf.to_vec();
        cipher.apply_keystream(&mut encrypted);
        base.write_all(&encrypted)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Some((_, base)) => base.flush(),
            None => Err(closed()),
        }
    }
}

impl BlobWrite for OfbWriter {
    fn close(&mut self) -> io::Result<()> {
        let Some((_, mut base)) = self.inner.take() else {
            return Ok(());
        };
        base.close()
    }
}

impl BlobStore for AesFilter {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let base = self.inner.get_reader(id)?;
        decrypt_reader(&self.key, base)
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let base = self.inner.get_writer(id)?;
        encrypt_writer(&self.key, base)
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
