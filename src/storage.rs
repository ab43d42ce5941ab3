//! Encrypted content-addressed file store.
//!
//! A blob lives at `<path>/<base58(sha256(key))>` and holds `IV || ciphertext`
//! under AES-256-CBC. The key that addresses a blob is also its encryption
//! key, so it is never logged; only the hashed filename is.

use crate::crypto::{CryptoProvider, DigestAlgorithm, AES_IV_LEN, AES_KEY_LEN};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    pub path: PathBuf,
}

impl StorageOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Content-addressed store rooted at one directory. No locking is done:
/// two concurrent `create` calls on the same key can both succeed.
#[derive(Debug, Clone)]
pub struct FileStorage {
    provider: Arc<dyn CryptoProvider>,
    options: StorageOptions,
}

impl FileStorage {
    pub fn new(provider: Arc<dyn CryptoProvider>, options: StorageOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Base58 SHA-256 of the key.
    pub fn hash_key(&self, key: &str) -> String {
        bs58::encode(self.provider.digest(DigestAlgorithm::Sha256, key.as_bytes())).into_string()
    }

    pub fn filename(&self, key: &str) -> PathBuf {
        self.options.path.join(self.hash_key(key))
    }

    /// Opens an existing blob.
    pub fn open(&self, key: &str) -> Result<Blob> {
        check_key(key)?;
        let filename = self.filename(key);
        if !filename.is_file() {
            return Err(Error::NotFound(filename.display().to_string()));
        }
        debug!(filename = %filename.display(), "opened blob");
        Ok(self.blob(key, filename))
    }

    /// Creates a blob holding an empty payload.
    pub fn create(&self, key: &str) -> Result<Blob> {
        check_key(key)?;
        let filename = self.filename(key);
        if filename.exists() {
            return Err(Error::AlreadyExists(filename.display().to_string()));
        }
        let blob = self.blob(key, filename);
        blob.set(&[])?;
        info!(filename = %blob.filename.display(), "created blob");
        Ok(blob)
    }

    /// Opens the blob, creating it first when it does not exist.
    pub fn open_or_create(&self, key: &str) -> Result<Blob> {
        match self.open(key) {
            Err(Error::NotFound(_)) => self.create(key),
            other => other,
        }
    }

    /// Removes the blob. A missing file is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let filename = self.filename(key);
        match fs::remove_file(&filename) {
            Ok(()) => {
                info!(filename = %filename.display(), "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn blob(&self, key: &str, filename: PathBuf) -> Blob {
        Blob {
            provider: Arc::clone(&self.provider),
            key: Zeroizing::new(key.to_string()),
            filename,
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.len() != AES_KEY_LEN {
        return Err(Error::validation(
            "key",
            format!("storage keys are {} bytes, got {}", AES_KEY_LEN, key.len()),
        ));
    }
    Ok(())
}

/// Opens `path` for writing, readable by the owner only. Existing files are
/// tightened before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Handle to one stored blob.
pub struct Blob {
    provider: Arc<dyn CryptoProvider>,
    key: Zeroizing<String>,
    filename: PathBuf,
}

impl Blob {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn get(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.filename)?;
        if data.len() < AES_IV_LEN {
            return Err(Error::Decode(format!(
                "{} is shorter than its IV",
                self.filename.display()
            )));
        }
        let (iv, ciphertext) = data.split_at(AES_IV_LEN);
        let plaintext = self.provider.decrypt(self.key.as_bytes(), iv, ciphertext)?;
        debug!(filename = %self.filename.display(), bytes = plaintext.len(), "read blob");
        Ok(plaintext)
    }

    /// Replaces the blob contents under a fresh IV.
    pub fn set(&self, data: &[u8]) -> Result<()> {
        let iv = self.provider.random_bytes(AES_IV_LEN);
        let ciphertext = self.provider.encrypt(self.key.as_bytes(), &iv, data)?;
        let mut contents = iv;
        contents.extend_from_slice(&ciphertext);
        let mut file = open_private(&self.filename)?;
        file.write_all(&contents)?;
        file.sync_all()?;

        debug!(filename = %self.filename.display(), bytes = data.len(), "wrote blob");
        Ok(())
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("key", &"<redacted>")
            .field("filename", &self.filename)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::default_provider;

    const KEY: &str = "Ohneo4ahthahSeG9AeT0thai4Moineex";

    fn storage(dir: &tempfile::TempDir) -> FileStorage {
        FileStorage::new(default_provider(), StorageOptions::new(dir.path()))
    }

    #[test]
    fn test_filename_is_hash_of_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        assert_eq!(
            store.hash_key(KEY),
            "HBkpxPmA2123XGEGXpxVwcfDyi71ViNemDw46ohq1BdC"
        );
        assert_eq!(
            store.filename(KEY),
            dir.path().join("HBkpxPmA2123XGEGXpxVwcfDyi71ViNemDw46ohq1BdC")
        );
        assert_eq!(store.filename(KEY), store.filename(KEY));
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(storage(&dir).open(KEY), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let blob = store.create(KEY).unwrap();
        assert_eq!(blob.key(), KEY);
        assert_eq!(blob.get().unwrap(), Vec::<u8>::new());
        // IV plus one padding block.
        assert_eq!(fs::read(blob.filename()).unwrap().len(), AES_IV_LEN + 16);

        assert!(matches!(store.create(KEY), Err(Error::AlreadyExists(_))));
        assert_eq!(store.open(KEY).unwrap().get().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_set_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let blob = store.open_or_create(KEY).unwrap();
        blob.set(b"hello world").unwrap();
        assert_eq!(blob.get().unwrap(), b"hello world");

        let raw = fs::read(blob.filename()).unwrap();
        assert!(!raw.windows(11).any(|w| w == b"hello world"));

        blob.set(b"").unwrap();
        assert_eq!(store.open(KEY).unwrap().get().unwrap(), b"");
    }

    #[test]
    fn test_fresh_iv_per_write() {
        let dir = tempfile::tempdir().unwrap();
        let blob = storage(&dir).create(KEY).unwrap();
        blob.set(b"same").unwrap();
        let first = fs::read(blob.filename()).unwrap();
        blob.set(b"same").unwrap();
        let second = fs::read(blob.filename()).unwrap();
        assert_ne!(first[..AES_IV_LEN], second[..AES_IV_LEN]);
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        store.delete(KEY).unwrap();
        store.create(KEY).unwrap();
        store.delete(KEY).unwrap();
        assert!(!store.filename(KEY).exists());
        assert!(matches!(store.open(KEY), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_rejects_short_key_and_truncated_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        assert!(matches!(
            store.create("short"),
            Err(Error::Validation { field: "key", .. })
        ));

        let blob = store.create(KEY).unwrap();
        fs::write(blob.filename(), [1, 2, 3]).unwrap();
        assert!(matches!(blob.get(), Err(Error::Decode(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_blob_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let blob = store.create(KEY).unwrap();
        let mode = fs::metadata(blob.filename()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::set_permissions(blob.filename(), fs::Permissions::from_mode(0o644)).unwrap();
        blob.set(b"again").unwrap();
        let mode = fs::metadata(blob.filename()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(blob.get().unwrap(), b"again");
    }

    #[test]
    fn test_debug_hides_key() {
        let dir = tempfile::tempdir().unwrap();
        let blob = storage(&dir).create(KEY).unwrap();
        assert!(!format!("{:?}", blob).contains(KEY));
    }
}
