//! Typed experiment configuration
//!
//! Built from the resolved tree after composition. Only the keys the
//! trainers read at start-up are typed; everything else is kept in the
//! `extra` maps and passed through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::utils::get_path;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required key '{0}'")]
    MissingKey(String),
    #[error("configuration does not match the experiment schema: {0}")]
    Invalid(String),
    #[error("no observation keys: set algo.cnn_keys.encoder or algo.mlp_keys.encoder")]
    NoEncoderKeys,
    #[error("{kind} decoder keys {keys:?} are not among the {kind} encoder keys")]
    DecoderNotInEncoder { kind: &'static str, keys: Vec<String> },
    #[error("'{key}' must be positive, found {value}")]
    NotPositive { key: &'static str, value: String },
}

/// Keys that must be present before the typed view is built.
const REQUIRED_KEYS: &[&str] = &[
    "seed",
    "env.id",
    "env.num_envs",
    "algo.name",
    "algo.per_rank_batch_size",
    "buffer.size",
    "checkpoint.every",
    "metric.log_every",
    "fabric",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Precision {
    Bits(u64),
    Mode(String),
}

/// `devices` as Fabric takes it: a count (`-1` for all), indices, or a
/// selector string such as `auto` or `"0,1"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Devices {
    Count(i64),
    Indices(Vec<u64>),
    Selector(String),
}

impl Default for Devices {
    fn default() -> Self {
        Devices::Count(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub id: String,
    pub num_envs: u64,
    #[serde(default = "one")]
    pub frame_stack: i64,
    #[serde(default = "one_u")]
    pub action_repeat: u64,
    #[serde(default)]
    pub max_episode_steps: Option<i64>,
    #[serde(default)]
    pub wrapper: Mapping,
    #[serde(default)]
    pub reward_as_observation: bool,
    #[serde(default)]
    pub capture_video: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySet {
    #[serde(default)]
    pub encoder: Vec<String>,
    #[serde(default)]
    pub decoder: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(rename = "_target_", default)]
    pub target: Option<String>,
    pub lr: f64,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoConfig {
    pub name: String,
    #[serde(default)]
    pub total_steps: Option<u64>,
    pub per_rank_batch_size: u64,
    #[serde(default)]
    pub learning_starts: u64,
    #[serde(default = "one_f")]
    pub replay_ratio: f64,
    #[serde(default = "yes")]
    pub run_test: bool,
    #[serde(default)]
    pub cnn_keys: KeySet,
    #[serde(default)]
    pub mlp_keys: KeySet,
    #[serde(default)]
    pub optimizer: Option<OptimizerConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub size: u64,
    #[serde(default)]
    pub checkpoint: bool,
    #[serde(default = "yes")]
    pub memmap: bool,
    #[serde(default)]
    pub sample_next_obs: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub every: u64,
    #[serde(default = "yes")]
    pub save_last: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub metrics: Mapping,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub log_every: u64,
    #[serde(default = "one_u")]
    pub log_level: u64,
    #[serde(default)]
    pub disable_timer: bool,
    #[serde(default)]
    pub aggregator: Option<AggregatorConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "auto")]
    pub accelerator: String,
    #[serde(default)]
    pub precision: Option<Precision>,
    #[serde(default)]
    pub devices: Devices,
    #[serde(default)]
    pub plugins: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub seed: i64,
    #[serde(default)]
    pub total_steps: Option<u64>,
    pub env: EnvConfig,
    pub algo: AlgoConfig,
    pub buffer: BufferConfig,
    pub checkpoint: CheckpointConfig,
    pub metric: MetricConfig,
    pub fabric: FabricConfig,
    #[serde(default)]
    pub run_benchmarks: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn one() -> i64 {
    1
}

fn one_u() -> u64 {
    1
}

fn one_f() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn auto() -> String {
    "auto".to_string()
}

impl ExperimentConfig {
    /// Build the typed view of a resolved tree.
    pub fn from_tree(tree: &Value) -> Result<Self, SchemaError> {
        for key in REQUIRED_KEYS {
            match get_path(tree, key) {
                None | Some(Value::Null) => return Err(SchemaError::MissingKey(key.to_string())),
                Some(_) => {}
            }
        }
        serde_yaml::from_value(tree.clone()).map_err(|e| SchemaError::Invalid(e.to_string()))
    }

    /// Start-up checks on observation keys and sizes.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let (cnn, mlp) = (&self.algo.cnn_keys, &self.algo.mlp_keys);
        if cnn.encoder.is_empty() && mlp.encoder.is_empty() {
            return Err(SchemaError::NoEncoderKeys);
        }
        for (kind, keys) in [("cnn", cnn), ("mlp", mlp)] {
            let stray: Vec<String> =
                keys.decoder.iter().filter(|k| !keys.encoder.contains(k)).cloned().collect();
            if !stray.is_empty() {
                return Err(SchemaError::DecoderNotInEncoder { kind, keys: stray });
            }
        }

        let counts = [
            ("algo.per_rank_batch_size", self.algo.per_rank_batch_size),
            ("env.num_envs", self.env.num_envs),
            ("checkpoint.every", self.checkpoint.every),
        ];
        for (key, value) in counts {
            if value == 0 {
                return Err(SchemaError::NotPositive { key, value: value.to_string() });
            }
        }
        let devices_ok = match &self.fabric.devices {
            Devices::Count(n) => *n == -1 || *n > 0,
            Devices::Indices(ids) => !ids.is_empty(),
            Devices::Selector(s) => !s.trim().is_empty(),
        };
        if !devices_ok {
            return Err(SchemaError::Invalid(format!(
                "fabric.devices must be a positive count, -1, or device indices, found {:?}",
                self.fabric.devices
            )));
        }
        if self.algo.replay_ratio.is_nan() || self.algo.replay_ratio <= 0.0 {
            return Err(SchemaError::NotPositive {
                key: "algo.replay_ratio",
                value: self.algo.replay_ratio.to_string(),
            });
        }
        Ok(())
    }

    /// Observation keys the encoders read, CNN first.
    pub fn observation_keys(&self) -> Vec<&str> {
        self.algo
            .cnn_keys
            .encoder
            .iter()
            .chain(self.algo.mlp_keys.encoder.iter())
            .map(String::as_str)
            .collect()
    }
}
