//! Artifact persistence
//!
//! Trained bundles are published per series key with a version number and
//! read back by the predictor.

mod bundle;
mod key;
mod store;

pub use bundle::{ArtifactBundle, BundleMetadata, ScalingRecord};
pub use key::{normalize_key, MAX_KEY_LEN};
pub use store::{
    ArtifactStore, FileArtifactStore, MemoryArtifactStore, CURRENT_FILE, MODEL_FILE, SCALING_FILE,
};
