//! Model persistence for saving and loading trained agents
//!
//! Each snapshot lives in the store directory as four files:
//! - `<id>.mpk` - online network weights (Burn named MessagePack record)
//! - `<id>.target.mpk` - target network weights
//! - `<id>.optim.mpk` - Adam state of the online network
//! - `<id>.json` - [`ModelMetadata`]
//!
//! Every file is written to a temporary name and renamed into place. The
//! metadata file is renamed last and marks the snapshot as complete, so a
//! reader listing the directory never sees a half-written snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::agent::DqnAgent;
use super::config::DqnConfig;
use super::network::{BurnQFunction, QNetwork, QNetworkConfig};

/// Prefix shared by every snapshot id
pub const SNAPSHOT_PREFIX: &str = "snake_dqn_";

const WEIGHTS_EXTENSION: &str = "mpk";
const TARGET_EXTENSION: &str = "target.mpk";
const OPTIMIZER_EXTENSION: &str = "optim.mpk";
const METADATA_EXTENSION: &str = "json";

type SnapshotRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Metadata saved with the model
///
/// Contains the configuration needed to rebuild the network plus the
/// training progress at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// DQN configuration used during training
    pub dqn_config: DqnConfig,

    /// Grid the agent was trained on
    pub grid_width: usize,
    pub grid_height: usize,

    /// Exploration rate at save time
    pub epsilon: f64,

    /// Gradient steps completed
    pub training_steps: usize,

    /// Training steps since the target network was last synced
    #[serde(default)]
    pub steps_since_sync: usize,

    /// Episodes completed
    pub episodes_trained: usize,

    /// Rolling score statistics at save time
    pub rolling_average_score: f32,
    pub rolling_max_score: u32,

    pub created_at: DateTime<Utc>,

    /// Crate version that wrote the snapshot
    pub version: String,
}

impl ModelMetadata {
    /// Capture the agent's configuration and progress
    pub fn from_agent<B: AutodiffBackend>(
        agent: &DqnAgent<BurnQFunction<B>>,
        grid_width: usize,
        grid_height: usize,
    ) -> Self {
        Self {
            dqn_config: agent.config().clone(),
            grid_width,
            grid_height,
            epsilon: agent.epsilon(),
            training_steps: agent.training_steps(),
            steps_since_sync: agent.steps_since_sync(),
            episodes_trained: agent.episodes_trained(),
            rolling_average_score: 0.0,
            rolling_max_score: 0,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_scores(mut self, rolling_average_score: f32, rolling_max_score: u32) -> Self {
        self.rolling_average_score = rolling_average_score;
        self.rolling_max_score = rolling_max_score;
        self
    }
}

/// A completed snapshot found in the store
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub id: String,
    pub metadata: ModelMetadata,
}

/// Directory of saved agent snapshots
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create model directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save both networks, the optimizer state and metadata, returning the
    /// snapshot id
    pub fn save<B: AutodiffBackend>(
        &self,
        agent: &DqnAgent<BurnQFunction<B>>,
        metadata: &ModelMetadata,
    ) -> Result<String> {
        let id = self.unique_id(metadata.created_at);
        let recorder = SnapshotRecorder::new();

        let online: Vec<u8> = recorder
            .record(agent.online().network().clone().into_record(), ())
            .context("Failed to serialize network weights")?;
        write_atomic(&self.weights_path(&id), &online)?;

        let target: Vec<u8> = recorder
            .record(agent.target().network().clone().into_record(), ())
            .context("Failed to serialize target network weights")?;
        write_atomic(&self.target_path(&id), &target)?;

        let optimizer: Vec<u8> = recorder
            .record(agent.online().optimizer_record(), ())
            .context("Failed to serialize optimizer state")?;
        write_atomic(&self.optimizer_path(&id), &optimizer)?;

        let meta_json =
            serde_json::to_vec_pretty(metadata).context("Failed to serialize metadata")?;
        write_atomic(&self.metadata_path(&id), &meta_json)?;

        info!(
            id = %id,
            episodes = metadata.episodes_trained,
            training_steps = metadata.training_steps,
            "model snapshot saved"
        );
        Ok(id)
    }

    /// Load a snapshot into an agent that continues where the saved one
    /// stopped
    ///
    /// Snapshots written without a target network or optimizer state fall
    /// back to a copy of the online network and a fresh Adam optimizer.
    pub fn load<B: AutodiffBackend>(
        &self,
        id: &str,
        device: &B::Device,
    ) -> Result<(DqnAgent<BurnQFunction<B>>, ModelMetadata)> {
        let metadata = self.read_metadata(id)?;
        let config = &metadata.dqn_config;
        let recorder = SnapshotRecorder::new();

        let weights_path = self.weights_path(id);
        let weights = fs::read(&weights_path)
            .with_context(|| format!("Failed to read network weights from {:?}", weights_path))?;
        let network = decode_network::<B>(&recorder, weights, config, device)
            .with_context(|| format!("Failed to decode network weights of snapshot {id}"))?;

        let target_path = self.target_path(id);
        let target_network = if target_path.exists() {
            let bytes = fs::read(&target_path).with_context(|| {
                format!("Failed to read target network weights from {:?}", target_path)
            })?;
            decode_network::<B>(&recorder, bytes, config, device)
                .with_context(|| format!("Failed to decode target network of snapshot {id}"))?
        } else {
            warn!(id, "snapshot has no target network, copying the online network");
            network.clone()
        };

        let mut online = BurnQFunction::from_network(network, config.learning_rate, device);
        let optimizer_path = self.optimizer_path(id);
        if optimizer_path.exists() {
            let bytes = fs::read(&optimizer_path).with_context(|| {
                format!("Failed to read optimizer state from {:?}", optimizer_path)
            })?;
            let record = recorder
                .load(bytes, device)
                .with_context(|| format!("Failed to decode optimizer state of snapshot {id}"))?;
            online.load_optimizer_record(record);
        } else {
            warn!(id, "snapshot has no optimizer state, starting Adam afresh");
        }

        let target = BurnQFunction::from_network(target_network, config.learning_rate, device);
        let mut agent = DqnAgent::from_networks(online, target, config.clone());
        agent.restore_progress(
            metadata.epsilon,
            metadata.training_steps,
            metadata.episodes_trained,
            metadata.steps_since_sync,
        );

        info!(id, episodes = metadata.episodes_trained, "model snapshot loaded");
        Ok((agent, metadata))
    }

    /// Load the most recent snapshot, if any
    pub fn load_latest<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> Result<Option<(String, DqnAgent<BurnQFunction<B>>, ModelMetadata)>> {
        let Some(latest) = self.latest()? else {
            return Ok(None);
        };
        let (agent, metadata) = self.load(&latest.id, device)?;
        Ok(Some((latest.id, agent, metadata)))
    }

    /// Most recent completed snapshot
    pub fn latest(&self) -> Result<Option<SnapshotInfo>> {
        Ok(self.list()?.into_iter().next())
    }

    /// All completed snapshots, newest first
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read model directory: {:?}", self.dir))?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !id.starts_with(SNAPSHOT_PREFIX) || !self.weights_path(id).exists() {
                continue;
            }

            match self.read_metadata(id) {
                Ok(metadata) => snapshots.push(SnapshotInfo {
                    id: id.to_string(),
                    metadata,
                }),
                Err(e) => warn!(id, error = %e, "skipping unreadable snapshot metadata"),
            }
        }

        snapshots.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(snapshots)
    }

    fn read_metadata(&self, id: &str) -> Result<ModelMetadata> {
        if id.is_empty() || id.contains(|c| c == '/' || c == '\\') || id.contains("..") {
            bail!("Invalid snapshot id: {id:?}");
        }
        let meta_path = self.metadata_path(id);
        let meta_json = fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read metadata from {:?}", meta_path))?;
        serde_json::from_str(&meta_json).context("Failed to deserialize metadata")
    }

    /// Timestamped id, suffixed when another snapshot already claimed it
    fn unique_id(&self, created_at: DateTime<Utc>) -> String {
        let base = format!(
            "{SNAPSHOT_PREFIX}{}",
            created_at.format("%Y%m%d_%H%M%S_%3f")
        );
        let mut id = base.clone();
        let mut n = 1;
        while self.weights_path(&id).exists() || self.metadata_path(&id).exists() {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }

    fn weights_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{WEIGHTS_EXTENSION}"))
    }

    fn target_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{TARGET_EXTENSION}"))
    }

    fn optimizer_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{OPTIMIZER_EXTENSION}"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{METADATA_EXTENSION}"))
    }
}

/// Rebuild a network of the configured shape from a weights record
fn decode_network<B: AutodiffBackend>(
    recorder: &SnapshotRecorder,
    bytes: Vec<u8>,
    config: &DqnConfig,
    device: &B::Device,
) -> Result<QNetwork<B>> {
    let network = QNetworkConfig::new(config.hidden_layers.clone()).init::<B>(device);
    let record = recorder.load(bytes, device)?;
    Ok(network.load_record(record))
}

/// Write to a sibling temp file, then rename over the destination
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {:?} into place at {:?}", tmp, path))?;
    debug!(path = ?path, bytes = bytes.len(), "file written");
    Ok(())
}
