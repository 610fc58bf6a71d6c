//! BLAKE3 hashing of templates, resource declarations and files.

use crate::core::error::{Error, Result};
use crate::core::template::CfnResource;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash of one resource declaration in its serialized form.
pub fn hash_resource(resource: &CfnResource) -> Result<String> {
    Ok(hash_string(&serde_json::to_string(resource)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Stack.template.json");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_string("hello world"));
    }

    #[test]
    fn test_hash_file_missing() {
        let err = hash_file(Path::new("/nonexistent/file")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_hash_string_format() {
        let h = hash_string("");
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), 7 + 64);
    }

    #[test]
    fn test_hash_resource_tracks_properties() {
        let a = CfnResource::new("AWS::S3::Bucket", json!({ "BucketName": "a" }));
        let b = CfnResource::new("AWS::S3::Bucket", json!({ "BucketName": "b" }));
        assert_eq!(hash_resource(&a).unwrap(), hash_resource(&a.clone()).unwrap());
        assert_ne!(hash_resource(&a).unwrap(), hash_resource(&b).unwrap());
    }
}
