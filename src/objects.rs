//! Object storage collaborator: resolves a document reference to bytes.
//!
//! The core only ever downloads; upload and lifecycle of raw files belong
//! to the surrounding system.

use async_trait::async_trait;

/// Fetch raw document bytes for an opaque reference.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, reference: &str) -> anyhow::Result<Vec<u8>>;
}

/// Object store reading references as local filesystem paths. Used by the
/// CLI, where "upload" means pointing at a file on disk.
pub struct FsObjectStore;

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn download(&self, reference: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = tokio::fs::read(reference).await?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_reads_file_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, b"hello").unwrap();

        let bytes = FsObjectStore
            .download(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn fs_store_missing_file_errors() {
        assert!(FsObjectStore.download("/does/not/exist").await.is_err());
    }
}
