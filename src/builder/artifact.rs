//! Artifact location, size and checksum.
//!
//! One-file builds produce a single executable; directory builds produce a
//! folder whose size and checksum cover every file beneath it.

use super::{
    error::{Error, ErrorExt, Result},
    platform::Platform,
    request::BuildRequest,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Directory the packaging tool writes artifacts to, relative to its working directory.
pub const DIST_DIR: &str = "dist";

/// Directory the packaging tool uses for intermediate files.
pub const WORK_DIR: &str = "build";

/// Expected artifact path for `request` under `working_dir`.
///
/// `dist/<name>` for directory builds, `dist/<name>[.exe]` for one-file builds.
pub fn expected_artifact(working_dir: &Path, request: &BuildRequest, platform: Platform) -> PathBuf {
    let dist = working_dir.join(DIST_DIR);
    if request.is_onefile() {
        dist.join(platform.executable_name(&request.name))
    } else {
        dist.join(&request.name)
    }
}

/// The file a signing tool should operate on for a produced artifact.
///
/// For directory builds this is the main executable inside the folder.
pub fn signable_file(artifact: &Path, request: &BuildRequest, platform: Platform) -> PathBuf {
    if request.is_onefile() {
        artifact.to_path_buf()
    } else {
        artifact.join(platform.executable_name(&request.name))
    }
}

/// Total size in bytes of a file, or of every regular file below a directory.
pub async fn artifact_size(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let root = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(&root).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok::<u64, Error>(total)
    })
    .await
    .map_err(|e| Error::GenericError(format!("artifact size task panicked: {e}")))?
}

/// Hex-encoded SHA-256 of a file, or of a directory tree.
///
/// Directory hashes cover each file's relative path followed by its content,
/// visited in sorted path order.
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;

    let mut hasher = Sha256::new();
    if metadata.is_file() {
        hash_file_into(&mut hasher, path).await?;
    } else if metadata.is_dir() {
        let files = sorted_files(path).await?;
        for file in files {
            if let Ok(rel) = file.strip_prefix(path) {
                hasher.update(rel.to_string_lossy().as_bytes());
            }
            hash_file_into(&mut hasher, &file).await?;
        }
    } else {
        crate::bail!("{} is neither a file nor a directory", path.display());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Every regular file below `root`, sorted; walk errors are propagated.
async fn sorted_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&root).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok::<Vec<PathBuf>, Error>(files)
    })
    .await
    .map_err(|e| Error::GenericError(format!("artifact walk task panicked: {e}")))?
}

async fn hash_file_into(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut buffer = vec![0u8; 8192];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hashing", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}

/// Remove a file or directory tree; a missing path is not an error.
pub async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).fs_context("inspecting", path),
    };

    let removed = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing", path),
    }
}
