//! Streaming SHA-256 content hashing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::domain::ContentDigest;

/// Read buffer size for hashing
const CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file's contents without loading it into memory
pub fn hash_file(path: &Path) -> std::io::Result<ContentDigest> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}

/// Hash everything readable from `reader`
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<ContentDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentDigest::from_bytes(&hasher.finalize()))
}

/// Hash an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest::from_bytes(&Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            hash_bytes(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hash_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_hash_matches_buffer_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");

        // Spans several read chunks
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = hash_file(&temp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
