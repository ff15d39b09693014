use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{DownloadError, Result};

pub async fn calculate_hash(filepath: &Path) -> Result<String> {
    let mut file = File::open(filepath).await?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// `expected` is compared case-insensitively. The file is left in place on
/// mismatch.
pub async fn verify_sha256(filepath: &Path, expected: &str) -> Result<()> {
    let computed = calculate_hash(filepath).await?;
    if !expected.eq_ignore_ascii_case(&computed) {
        return Err(DownloadError::ChecksumMismatch {
            expected: expected.to_string(),
            computed,
        });
    }
    Ok(())
}
