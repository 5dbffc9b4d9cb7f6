//! Checkpoint files, one per generation boundary.
//!
//! Each file holds `{ digest, checkpoint }` where `digest` is the SHA-256 of
//! the checkpoint's compact JSON. Loading recomputes the digest and rejects
//! any mismatch.

use crate::error::{IoError, Result};
use crate::serialization::{read_json_file, read_json_gz, sha256_hex, to_json, write_json_file, write_json_gz};
use edgeswarm_data::Checkpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PREFIX: &str = "checkpoint_gen_";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    digest: String,
    checkpoint: &'a Checkpoint,
}

#[derive(Deserialize)]
struct Envelope {
    digest: String,
    checkpoint: Checkpoint,
}

/// Directory of checkpoint files named `checkpoint_gen_NNNNN.json[.gz]`.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    compress: bool,
}

impl CheckpointStore {
    /// Opens (creating if needed) a checkpoint directory.
    pub fn new<P: AsRef<Path>>(dir: P, compress: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            IoError::FileSystem(e).with_context(format!("creating checkpoint directory {:?}", dir))
        })?;
        Ok(Self { dir, compress })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, generation: u32) -> PathBuf {
        let ext = if self.compress { "json.gz" } else { "json" };
        self.dir.join(format!("{PREFIX}{generation:05}.{ext}"))
    }

    /// Writes `checkpoint` under its generation number, replacing any earlier
    /// file for the same generation.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        let digest = sha256_hex(to_json(checkpoint)?.as_bytes());
        let envelope = EnvelopeRef { digest, checkpoint };
        let path = self.path_for(checkpoint.generation);
        let staging = path.with_extension("tmp");
        if self.compress {
            write_json_gz(&envelope, &staging)?;
        } else {
            write_json_file(&envelope, &staging)?;
        }
        std::fs::rename(&staging, &path).map_err(|e| {
            IoError::FileSystem(e).with_context(format!("finalizing checkpoint {:?}", path))
        })?;
        tracing::info!(
            generation = checkpoint.generation,
            path = %path.display(),
            "Checkpoint saved"
        );
        Ok(path)
    }

    /// Reads and verifies a checkpoint file. Compression is detected from the
    /// `.gz` extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Checkpoint> {
        let path = path.as_ref();
        let gz = path.extension().is_some_and(|ext| ext == "gz");
        let envelope: Envelope = if gz {
            read_json_gz(path)?
        } else {
            read_json_file(path)?
        };
        let actual = sha256_hex(to_json(&envelope.checkpoint)?.as_bytes());
        if actual != envelope.digest {
            return Err(IoError::integrity(envelope.digest, actual)
                .with_context(format!("loading {:?}", path)));
        }
        Ok(envelope.checkpoint)
    }

    /// Checkpoint files in the directory, ordered by generation.
    pub fn list(&self) -> Result<Vec<(u32, PathBuf)>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            IoError::FileSystem(e).with_context(format!("listing {:?}", self.dir))
        })?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if let Some(generation) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_generation)
            {
                found.push((generation, path));
            }
        }
        found.sort();
        Ok(found)
    }

    /// The most recent checkpoint, if any.
    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        match self.list()?.pop() {
            Some((_, path)) => Self::load(path).map(Some),
            None => Ok(None),
        }
    }
}

fn parse_generation(file_name: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(PREFIX)?;
    let digits = rest
        .strip_suffix(".json.gz")
        .or_else(|| rest.strip_suffix(".json"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
