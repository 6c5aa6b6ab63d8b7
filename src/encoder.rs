use crate::error::ItemError;
use crate::types::Payload;
use crate::PayloadEncoder;

/// Default encoder: in-memory payloads pass through, file payloads are read
/// from disk when the item is dispatched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileEncoder;

impl PayloadEncoder for FileEncoder {
    async fn encode(&self, payload: &Payload) -> Result<Vec<u8>, ItemError> {
        match payload {
            Payload::Bytes(bytes) => Ok(bytes.to_vec()),
            Payload::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ItemError::Encoding(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_bytes_pass_through() {
        let payload = Payload::from(vec![1u8, 2, 3]);
        let bytes = FileEncoder.encode(&payload).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let bytes = FileEncoder.encode(&Payload::File(path)).await.unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn test_missing_file_is_encoding_error() {
        let payload = Payload::File(PathBuf::from("/definitely/not/here.png"));
        let err = FileEncoder.encode(&payload).await.unwrap_err();
        assert!(matches!(err, ItemError::Encoding(ref m) if m.contains("here.png")));
    }
}
