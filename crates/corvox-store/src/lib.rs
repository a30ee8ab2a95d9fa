#![warn(missing_docs)]

//! Disk cache for hemisphere operator pairs.
//!
//! One artifact per (subject, transform, strategy + parameters), holding
//! both hemispheres' compressed-row arrays and shapes. Artifacts are
//! written to a temporary file and atomically renamed into place, so a
//! failed build never leaves a partial artifact visible to readers.
//! Staleness is decided by comparing the artifact's modification time
//! against the transform definition's.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use corvox_geom::HemiPair;
use corvox_sparse::CsrMatrix;

/// Errors from cache load and store.
///
/// Everything except `Io` on save is recoverable: a missing, stale, or
/// undecodable artifact just means the operators must be rebuilt.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No artifact exists for the key.
    #[error("cache artifact missing: {0}")]
    Missing(PathBuf),

    /// The artifact predates its transform definition.
    #[error("cache artifact is stale: {0}")]
    Stale(PathBuf),

    /// The artifact exists but cannot be decoded.
    #[error("cache artifact unreadable: {0}")]
    Undecodable(String),

    /// The store configuration cannot be parsed.
    #[error("invalid store config: {0}")]
    Config(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// File-store configuration, passed in explicitly at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory that holds per-subject cache artifacts.
    pub root: PathBuf,
}

impl StoreConfig {
    /// Configuration rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load configuration from a TOML file with a `root` key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CacheError::Config(e.to_string()))
    }
}

/// Typed cache key: strategy tag plus its sorted keyword parameters.
///
/// Parameters are sorted by name at construction so the key is
/// order-independent, and rendered with explicit separators so
/// semantically different parameter sets cannot collide textually.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Subject identifier.
    pub subject: String,
    /// Transform name.
    pub transform: String,
    /// Strategy tag, e.g. `lanczos`.
    pub strategy: String,
    /// Sorted (name, value) strategy parameters.
    pub params: Vec<(String, String)>,
}

impl CacheKey {
    /// Build a key, sorting the parameters by name.
    pub fn new(
        subject: impl Into<String>,
        transform: impl Into<String>,
        strategy: impl Into<String>,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut params: Vec<_> = params.into_iter().collect();
        params.sort();
        Self {
            subject: subject.into(),
            transform: transform.into(),
            strategy: strategy.into(),
            params,
        }
    }

    /// Canonical file stem for this key.
    pub fn file_stem(&self) -> String {
        let mut stem = format!("{}_{}", self.transform, self.strategy);
        for (name, value) in &self.params {
            stem.push('_');
            stem.push_str(name);
            stem.push('-');
            stem.push_str(value);
        }
        stem
    }
}

/// Load/store of operator pairs under a configured root directory.
#[derive(Debug, Clone)]
pub struct OperatorStore {
    config: StoreConfig,
}

impl OperatorStore {
    /// A store over the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Path of the artifact for a key.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.config
            .root
            .join(&key.subject)
            .join(format!("{}.opr", key.file_stem()))
    }

    /// Load a cached pair, failing if the artifact is missing, older
    /// than `newer_than`, or undecodable. All failures are recoverable
    /// by rebuilding.
    pub fn load(&self, key: &CacheKey, newer_than: SystemTime) -> Result<HemiPair<CsrMatrix>> {
        let path = self.path_for(key);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Missing(path));
            }
            Err(e) => return Err(e.into()),
        };

        if meta.modified()? < newer_than {
            debug!(path = %path.display(), "cached operators predate transform");
            return Err(CacheError::Stale(path));
        }

        let reader = BufReader::new(File::open(&path)?);
        let operators: HemiPair<CsrMatrix> = bincode::deserialize_from(reader)
            .map_err(|e| CacheError::Undecodable(e.to_string()))?;
        debug!(path = %path.display(), "loaded cached operators");
        Ok(operators)
    }

    /// Persist a pair atomically: serialize to a sibling temporary file,
    /// then rename over the final path.
    pub fn save(&self, key: &CacheKey, operators: &HemiPair<CsrMatrix>) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("opr.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            if let Err(e) = bincode::serialize_into(&mut writer, operators) {
                drop(writer);
                let _ = fs::remove_file(&tmp);
                return Err(CacheError::Undecodable(e.to_string()));
            }
            if let Err(e) = writer.flush() {
                drop(writer);
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
        }
        fs::rename(&tmp, &path)?;
        info!(path = %path.display(), "cached operator pair");
        Ok(())
    }
}
