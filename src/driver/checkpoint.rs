//! Binary checkpoint stream: fixed magic/version header, alternating
//! files, small text index (§6 "Checkpoint format").

use crate::error::CoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"AMSC";
const FORMAT_VERSION: u32 = 1;

fn checkpoint_path(base: &Path, index: u32) -> PathBuf {
    base.with_extension(format!("ckpt{index}"))
}

fn index_path(base: &Path) -> PathBuf {
    base.with_extension("ckpt.idx")
}

/// Serialize `state` with `bincode`, prefixed by the magic/version
/// header, to whichever of the two alternating files is not currently
/// marked latest, then flip the text index to point at it.
pub fn write_checkpoint<T: Serialize>(base: &Path, state: &T) -> Result<(), CoreError> {
    let current = read_latest_index(base).unwrap_or(0);
    let next = 1 - current;
    let path = checkpoint_path(base, next);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    let encoded = bincode::serde::encode_to_vec(state, bincode::config::standard())
        .map_err(|e| CoreError::Checkpoint { message: e.to_string() })?;
    bytes.extend_from_slice(&encoded);

    std::fs::write(&path, &bytes)?;
    std::fs::write(index_path(base), next.to_string())?;
    Ok(())
}

fn read_latest_index(base: &Path) -> Option<u32> {
    let text = std::fs::read_to_string(index_path(base)).ok()?;
    text.trim().parse().ok()
}

fn read_checkpoint_file<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 8 || &bytes[0..4] != MAGIC {
        return Err(CoreError::Checkpoint {
            message: format!("{} is missing the checkpoint magic header", path.display()),
        });
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(CoreError::Checkpoint {
            message: format!("checkpoint format version {version} unsupported (expected {FORMAT_VERSION})"),
        });
    }
    let (state, _) = bincode::serde::decode_from_slice(&bytes[8..], bincode::config::standard())
        .map_err(|e| CoreError::Checkpoint { message: e.to_string() })?;
    Ok(state)
}

/// Read the latest checkpoint, tolerating an incomplete/corrupt file by
/// falling back to the previous index (§6 "An incomplete checkpoint file
/// on restart is tolerated").
pub fn read_checkpoint<T: DeserializeOwned>(base: &Path) -> Result<T, CoreError> {
    let latest = read_latest_index(base).ok_or_else(|| CoreError::Checkpoint {
        message: format!("no checkpoint index found at {}", index_path(base).display()),
    })?;

    match read_checkpoint_file(&checkpoint_path(base, latest)) {
        Ok(state) => Ok(state),
        Err(primary_err) => {
            let fallback = 1 - latest;
            read_checkpoint_file(&checkpoint_path(base, fallback)).map_err(|_| primary_err)
        }
    }
}
