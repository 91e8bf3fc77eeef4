//! Local filesystem storage for rendered documents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;

use super::{ObjectStorage, StoredObject};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| StorageError::CreateDirectory {
                path: self.root.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Stores content using atomic file creation to avoid race conditions.
    ///
    /// Tries the original filename first, then `_2`, `_3`, ... variants.
    /// Creation uses O_CREAT | O_EXCL so two concurrent uploads of the
    /// same name cannot clobber each other.
    fn store_with_atomic_creation(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        use std::io::Write;

        let (base, ext) = if let Some(dot_pos) = filename.rfind('.') {
            (&filename[..dot_pos], Some(&filename[dot_pos..]))
        } else {
            (filename, None)
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = self.root.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    continue;
                }
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(self.root.join(filename)))
    }
}

#[async_trait]
impl ObjectStorage for FileStorage {
    async fn upload(&self, buffer: &[u8], filename: &str) -> Result<StoredObject, StorageError> {
        self.ensure_root()?;
        let path = self.store_with_atomic_creation(filename, buffer)?;
        let public_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename)
            .to_string();
        Ok(StoredObject {
            url: format!("file://{}", path.display()),
            public_id,
            size: buffer.len() as u64,
        })
    }
}
