use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use super::{BlobRead, BlobStore, BlobWrite};

/// Blob store over a directory tree.
///
/// Ids map to relative paths under the root; `/` in an id creates
/// intermediate directories. Ids that would resolve outside the root
/// are rejected.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, id: &str) -> io::Result<PathBuf> {
        let rel = Path::new(id);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("invalid blob id {id:?}"),
                    ))
                }
            }
        }
        if id.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty blob id"));
        }
        Ok(self.root.join(rel))
    }

    fn collect(&self, dir: &Path, rel: &str, out: &mut Vec<String>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let child = if rel.is_empty() {
                name
            } else {
                format!("{rel}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.collect(&entry.path(), &child, out)?;
            } else {
                out.push(child);
            }
        }
        Ok(())
    }
}

struct FileReader(File);

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl BlobRead for FileReader {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FileWriter(File);

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl BlobWrite for FileWriter {
    fn close(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_all()
    }
}

impl BlobStore for FileBlobStore {
    fn get_reader(&self, id: &str) -> io::Result<Box<dyn BlobRead>> {
        let path = self.resolve(id)?;
        Ok(Box::new(FileReader(File::open(path)?)))
    }

    fn get_writer(&self, id: &str) -> io::Result<Box<dyn BlobWrite>> {
        let path = self.resolve(id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Box::new(FileWriter(File::create(path)?)))
    }

    fn has(&self, id: &str) -> bool {
        self.resolve(id).map(|path| path.is_file()).unwrap_or(false)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        let path = self.resolve(id)?;
        std::fs::remove_file(path)
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let mut ids = Vec::new();
        self.collect(&self.root, "", &mut ids)?;
        ids.retain(|id| id.starts_with(prefix));
        ids.sort();
        Ok(ids)
    }
}
