//! Artifact stores
//!
//! A store publishes bundles per key under a monotonically increasing
//! version and hands back the current one. Publishing is atomic: a reader
//! sees either the previous complete bundle or the new complete bundle.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::bundle::{ArtifactBundle, ScalingRecord};
use super::key::normalize_key;
use crate::error::{ForecastError, Result};
use crate::training::ModelParameters;

pub const MODEL_FILE: &str = "model.bin";
pub const SCALING_FILE: &str = "scaling.json";
pub const CURRENT_FILE: &str = "CURRENT";

/// Persistence of artifact bundles, injected into trainer and predictor.
///
/// Every method normalizes `key` first; keys that are not safe directory
/// names are rejected with `InvalidParameter`.
pub trait ArtifactStore: Send + Sync {
    /// Publish `bundle` as the new current bundle for `key`; returns the
    /// version it was published under.
    fn save(&self, key: &str, bundle: &ArtifactBundle) -> Result<u64>;

    /// Current bundle for `key`, or `ArtifactNotFound`
    fn load(&self, key: &str) -> Result<ArtifactBundle>;

    /// Current version for `key`, None when never trained
    fn current_version(&self, key: &str) -> Result<Option<u64>>;

    /// Keys with a published bundle
    fn keys(&self) -> Result<Vec<String>>;
}

fn not_found(key: &str, reason: impl Into<String>) -> ForecastError {
    ForecastError::ArtifactNotFound {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Open a bundle file, reporting a file that vanished as a missing bundle
fn open_bundle_file(key: &str, version: u64, path: &Path) -> Result<File> {
    File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            not_found(
                key,
                format!("bundle v{} disappeared while reading {}", version, path.display()),
            )
        } else {
            err.into()
        }
    })
}

/// In-process store, used by tests and ephemeral services
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    bundles: RwLock<HashMap<String, ArtifactBundle>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, key: &str, bundle: &ArtifactBundle) -> Result<u64> {
        let key = normalize_key(key)?;
        let mut bundles = self.bundles.write();
        let version = bundles.get(&key).map_or(1, |b| b.version() + 1);
        bundles.insert(key, bundle.with_version(version));
        Ok(version)
    }

    fn load(&self, key: &str) -> Result<ArtifactBundle> {
        let key = normalize_key(key)?;
        self.bundles
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(&key, "model has not been trained"))
    }

    fn current_version(&self, key: &str) -> Result<Option<u64>> {
        let key = normalize_key(key)?;
        Ok(self.bundles.read().get(&key).map(|b| b.version()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.bundles.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Directory-backed store.
///
/// Layout: `<root>/<KEY>/v<version>/{model.bin, scaling.json}` plus a
/// `<root>/<KEY>/CURRENT` pointer holding the current version number.
#[derive(Debug)]
pub struct FileArtifactStore {
    root: PathBuf,
    retain_versions: usize,
    publish: Mutex<()>,
}

impl FileArtifactStore {
    /// Open (and create) a store rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            retain_versions: 2,
            publish: Mutex::new(()),
        })
    }

    /// Number of published versions kept per key (at least 1)
    pub fn with_retain_versions(mut self, retain: usize) -> Self {
        self.retain_versions = retain.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every version of `key`
    pub fn key_dir(&self, key: &str) -> Result<PathBuf> {
        Ok(self.dir_of(&normalize_key(key)?))
    }

    /// Directory of one published version of `key`
    pub fn version_dir(&self, key: &str, version: u64) -> Result<PathBuf> {
        Ok(self.version_dir_of(&normalize_key(key)?, version))
    }

    /// Published versions present on disk, ascending
    pub fn versions(&self, key: &str) -> Result<Vec<u64>> {
        self.versions_of(&normalize_key(key)?)
    }

    // The `*_of` helpers take an already normalized key.
    fn dir_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn version_dir_of(&self, key: &str, version: u64) -> PathBuf {
        self.dir_of(key).join(format!("v{}", version))
    }

    fn current_version_of(&self, key: &str) -> Result<Option<u64>> {
        let pointer = self.dir_of(key).join(CURRENT_FILE);
        let contents = match fs::read_to_string(&pointer) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        contents.trim().parse().map(Some).map_err(|_| {
            ForecastError::SerializationError(format!(
                "corrupt version pointer {}: {:?}",
                pointer.display(),
                contents
            ))
        })
    }

    fn versions_of(&self, key: &str) -> Result<Vec<u64>> {
        let dir = self.dir_of(key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions: Vec<u64> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?.strip_prefix('v')?.parse().ok()
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    fn write_bundle_files(dir: &Path, bundle: &ArtifactBundle) -> Result<()> {
        fs::create_dir_all(dir)?;

        let model_bytes = bincode::serialize(&bundle.parameters)?;
        let mut model_file = File::create(dir.join(MODEL_FILE))?;
        model_file.write_all(&model_bytes)?;
        model_file.sync_all()?;

        let scaling_file = File::create(dir.join(SCALING_FILE))?;
        let mut writer = BufWriter::new(scaling_file);
        serde_json::to_writer_pretty(&mut writer, &bundle.scaling_record())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Replace the CURRENT pointer via write-to-temp + rename
    fn write_pointer(&self, key: &str, version: u64) -> Result<()> {
        let key_dir = self.dir_of(key);
        let tmp = key_dir.join(format!(".{}.{}", CURRENT_FILE, uuid::Uuid::new_v4()));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(version.to_string().as_bytes())?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&tmp, key_dir.join(CURRENT_FILE)) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    fn prune(&self, key: &str, current: u64) {
        let versions = match self.versions_of(key) {
            Ok(v) => v,
            Err(err) => {
                warn!(key, error = %err, "Could not list versions for pruning");
                return;
            }
        };
        let stale = versions
            .iter()
            .filter(|&&v| v <= current)
            .count()
            .saturating_sub(self.retain_versions);

        for &version in versions.iter().take(stale) {
            let dir = self.version_dir_of(key, version);
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(key, version, "Pruned old bundle"),
                Err(err) => warn!(key, version, error = %err, "Failed to prune old bundle"),
            }
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, key: &str, bundle: &ArtifactBundle) -> Result<u64> {
        let key = normalize_key(key)?;
        let key = key.as_str();
        let _publish = self.publish.lock();

        let latest = self.versions_of(key)?.last().copied().unwrap_or(0);
        let current = self.current_version_of(key)?.unwrap_or(0);
        let version = latest.max(current) + 1;
        let stamped = bundle.with_version(version);

        let staging = self.dir_of(key).join(format!(".staging-{}", uuid::Uuid::new_v4()));
        if let Err(err) = Self::write_bundle_files(&staging, &stamped) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
        let target = self.version_dir_of(key, version);
        if let Err(err) = fs::rename(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err.into());
        }

        self.write_pointer(key, version)?;
        info!(key, version, path = %target.display(), "Published artifact bundle");

        self.prune(key, version);
        Ok(version)
    }

    fn load(&self, key: &str) -> Result<ArtifactBundle> {
        let key = normalize_key(key)?;
        let key = key.as_str();
        let version = self
            .current_version_of(key)?
            .ok_or_else(|| not_found(key, "model has not been trained"))?;
        let dir = self.version_dir_of(key, version);

        let model_path = dir.join(MODEL_FILE);
        let scaling_path = dir.join(SCALING_FILE);
        for path in [&model_path, &scaling_path] {
            if !path.is_file() {
                return Err(not_found(
                    key,
                    format!("incomplete bundle v{}: {} is missing", version, path.display()),
                ));
            }
        }

        let mut bytes = Vec::new();
        open_bundle_file(key, version, &model_path)?.read_to_end(&mut bytes)?;
        let parameters: ModelParameters = bincode::deserialize(&bytes)?;

        let reader = BufReader::new(open_bundle_file(key, version, &scaling_path)?);
        let record: ScalingRecord = serde_json::from_reader(reader)?;

        if record.metadata.version != version {
            return Err(not_found(
                key,
                format!(
                    "bundle directory v{} records version {}",
                    version, record.metadata.version
                ),
            ));
        }

        ArtifactBundle::from_parts(parameters, record)
    }

    fn current_version(&self, key: &str) -> Result<Option<u64>> {
        self.current_version_of(&normalize_key(key)?)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(CURRENT_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
