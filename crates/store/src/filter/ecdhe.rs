use std::io::{self, Read};

use p256::ecdh;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p256::{PublicKey, SecretKey};

use crate::blob::{BlobRead, BlobStore, BlobWrite};

use super::aes::{decrypt_reader, derive_key, encrypt_writer, KEY_SIZE};

/// ECDHE encryption over a blob store.
///
/// Writing generates a fresh P-256 key pair per blob and derives an
/// AES-256-OFB key from the ECDH agreement with the recipient's public
/// key, so two blobs of the same plaintext share no key material. The
/// stored envelope is:
///
/// ```text
/// [1-byte point length][uncompressed ephemeral public key][IV][ciphertext]
/// ```
///
/// Reading requires the recipient's private key. A filter constructed
/// with only one half of the key pair supports only the matching
/// direction.
pub struct EcdheFilter {
    inner: Box<dyn BlobStore>,
    public: Option<PublicKey>,
    secret: Option<SecretKey>,
}

impl EcdheFilter {
    /// Build from PEM-encoded keys. The public key must be SPKI PEM;
    /// the private key may be PKCS#8 or SEC1 PEM.
    pub fn from_pem(
        inner: Box<dyn BlobStore>,
        public_pem: Option<&str>,
        private_pem: Option<&str>,
    ) -> io::Result<Self> {
        let public = public_pem
            .map(|pem| {
                PublicKey::from_public_key_pem(pem).map_err(|err| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("bad public key: {err}"))
                })
            })
            .transpose()?;
        let secret = private_pem
            .map(|pem| {
                SecretKey::from_pkcs8_pem(pem)
                    .or_else(|_| SecretKey::from_sec1_pem(pem))
                    .map_err(|err| {
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("bad private key: {err}"),
                        )
                    })
            })
            .transpose()?;
        Ok(Self::new(inner, public, secret))
    }

    pub fn new(
        inner: Box<dyn BlobStore>,
        public: Option<PublicKey>,
        secret: Option<SecretKey>,
    ) -> Self {
        Self {
            inner,
            public,
            secret,
        }
    }
}

fn random_secret() -> io::Result<SecretKey> {
    // Rejection-sample until the bytes land in the scalar field; all
    // but a negligible fraction of draws succeed on the first try.
    let mut bytes = [0u8; 32];
    loop {
        getrandom::getrandom(&mut bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, format!("rng failure: {err}")))?;
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return Ok(secret);
        }
    }
}

fn shared_key(secret: &SecretKey, public: &PublicKey) -> [u8; KEY_SIZE] {
    let shared = ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    derive_key(shared.raw_secret_bytes())
}

impl BlobStore for EcdheFilter {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let Some(secret) = &self.secret else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "no private key supplied",
            ));
        };
        let mut base = self.inner.get_reader(id)?;

        let mut header = [0u8; 1];
        if let Err(err) = base.read_exact(&mut header) {
            let _ = base.close();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ciphertext too short: {err}"),
            ));
        }
        let mut point = vec![0u8; header[0] as usize];
        if let Err(err) = base.read_exact(&mut point) {
            let _ = base.close();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ciphertext too short: {err}"),
            ));
        }
        let ephemeral = match PublicKey::from_sec1_bytes(&point) {
            Ok(public) => public,
            Err(_) => {
                let _ = base.close();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid public key",
                ));
            }
        };

        let key = shared_key(secret, &ephemeral);
        decrypt_reader(&key, base)
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let Some(recipient) = &self.public else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "no public key supplied",
            ));
        };
        let mut base = self.inner.get_writer(id)?;

        let ephemeral = random_secret()?;
        let key = shared_key(&ephemeral, recipient);
        let point = ephemeral.public_key().to_encoded_point(false);
        base.write_all(&[point.as_bytes().len() as u8])?;
        base.write_all(point.as_bytes())?;

        encrypt_writer(&key, base)
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
    use std::io::Write;

    fn key_pair() -> (PublicKey, SecretKey) {
        let secret = random_secret().unwrap();
        (secret.public_key(), secret)
    }

    #[test]
    fn test_roundtrip() {
        let (public, secret) = key_pair();
        let mem = MemBlobStore::new();
        let filter = EcdheFilter::new(Box::new(mem.clone()), Some(public), Some(secret));

        let payload = b"for your eyes only".to_vec();
        let mut writer = filter.get_writer("k").unwrap();
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        // Envelope: 1-byte length, 65-byte uncompressed point, 16-byte
        // IV, then ciphertext.
        let raw = mem.raw("k").unwrap();
        assert_eq!(raw[0], 65);
        assert_eq!(raw[1], 0x04);
        assert_eq!(raw.len(), 1 + 65 + 16 + payload.len());

        let mut reader = filter.get_reader("k").unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        reader.close().unwrap();
        assert_eq!(buf, payload);
    }

    #[test]
    fn test_same_plaintext_different_envelopes() {
        let (public, _) = key_pair();
        let mem = MemBlobStore::new();
        let filter = EcdheFilter::new(Box::new(mem.clone()), Some(public), None);

        for id in ["a", "b"] {
            let mut writer = filter.get_writer(id).unwrap();
            writer.write_all(b"same plaintext").unwrap();
            writer.close().unwrap();
        }
        let a = mem.raw("a").unwrap();
        let b = mem.raw("b").unwrap();
        // Fresh ephemeral key per blob: even the key headers differ.
        assert_ne!(a[1..66], b[1..66]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_keys() {
        let (public, secret) = key_pair();
        let mem = MemBlobStore::new();

        let write_only = EcdheFilter::new(Box::new(mem.clone()), Some(public), None);
        let mut writer = write_only.get_writer("k").unwrap();
        writer.write_all(b"x").unwrap();
        writer.close().unwrap();
        assert!(write_only.get_reader("k").is_err());

        let read_only = EcdheFilter::new(Box::new(mem.clone()), None, Some(secret));
        assert!(read_only.get_writer("other").is_err());
        let mut reader = read_only.get_reader("k").unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"x");
    }

    #[test]
    fn test_invalid_point_is_rejected() {
        let (_, secret) = key_pair();
        let mem = MemBlobStore::new();
        let mut writer = mem.get_writer("k").unwrap();
        let mut bogus = vec![65u8];
        bogus.extend_from_slice(&[0xffu8; 65]);
        bogus.extend_from_slice(&[0u8; 16]);
        writer.write_all(&bogus).unwrap();
        writer.close().unwrap();

        let filter = EcdheFilter::new(Box::new(mem), None, Some(secret));
        let err = filter.get_reader("k").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_envelope() {
        let (_, secret) = key_pair();
        let mem = MemBlobStore::new();
        let mut writer = mem.get_writer("k").unwrap();
        writer.write_all(&[65u8, 0x04]).unwrap();
        writer.close().unwrap();

        let filter = EcdheFilter::new(Box::new(mem), None, Some(secret));
        let err = filter.get_reader("k").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
