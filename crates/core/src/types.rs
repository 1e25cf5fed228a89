//! Model identity, algorithm configuration and per-action sufficient statistics.

use crate::error::{BanditError, BanditResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// (name, version) pair identifying one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub name: String,
    pub version: String,
}

impl ModelKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    #[serde(rename = "egreedy")]
    EpsilonGreedy,
    #[serde(rename = "linucb")]
    LinUcb,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmKind::EpsilonGreedy => write!(f, "egreedy"),
            AlgorithmKind::LinUcb => write!(f, "linucb"),
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = BanditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "egreedy" => Ok(AlgorithmKind::EpsilonGreedy),
            "linucb" => Ok(AlgorithmKind::LinUcb),
            other => Err(BanditError::InvalidConfig(format!(
                "unsupported algorithm '{other}'"
            ))),
        }
    }
}

/// Hyperparameters fixed at model creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum AlgorithmConfig {
    #[serde(rename = "egreedy")]
    EpsilonGreedy { epsilon: f64 },
    #[serde(rename = "linucb")]
    LinUcb { n_features: usize, alpha: f64 },
}

impl AlgorithmConfig {
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            AlgorithmConfig::EpsilonGreedy { .. } => AlgorithmKind::EpsilonGreedy,
            AlgorithmConfig::LinUcb { .. } => AlgorithmKind::LinUcb,
        }
    }
}

/// Pull count and cumulative reward for one egreedy action.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpsilonGreedyArm {
    pub count: u64,
    pub reward_sum: f64,
}

impl EpsilonGreedyArm {
    pub fn mean(&self) -> f64 {
        self.reward_sum / self.count.max(1) as f64
    }
}

/// Ridge-regression statistics for one LinUCB action.
/// `a` is the row-major n×n design matrix, `b` the reward-weighted context sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinUcbArm {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl LinUcbArm {
    /// A = I, b = 0.
    pub fn identity(n: usize) -> Self {
        let mut a = vec![0.0; n * n];
        for i in 0..n {
            a[i * n + i] = 1.0;
        }
        Self { a, b: vec![0.0; n] }
    }

    pub fn dim(&self) -> usize {
        self.b.len()
    }
}

/// Per-action statistics, index-aligned with the model's action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arms")]
pub enum ModelStatistics {
    #[serde(rename = "egreedy")]
    EpsilonGreedy(Vec<EpsilonGreedyArm>),
    #[serde(rename = "linucb")]
    LinUcb(Vec<LinUcbArm>),
}

impl ModelStatistics {
    /// Zero/identity statistics for `arms` actions under `config`.
    pub fn initial(config: &AlgorithmConfig, arms: usize) -> Self {
        match config {
            AlgorithmConfig::EpsilonGreedy { .. } => {
                ModelStatistics::EpsilonGreedy(vec![EpsilonGreedyArm::default(); arms])
            }
            AlgorithmConfig::LinUcb { n_features, .. } => {
                ModelStatistics::LinUcb(vec![LinUcbArm::identity(*n_features); arms])
            }
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            ModelStatistics::EpsilonGreedy(_) => AlgorithmKind::EpsilonGreedy,
            ModelStatistics::LinUcb(_) => AlgorithmKind::LinUcb,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ModelStatistics::EpsilonGreedy(arms) => arms.len(),
            ModelStatistics::LinUcb(arms) => arms.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything persisted for one model apart from its version counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub config: AlgorithmConfig,
    pub actions: Vec<String>,
    pub statistics: ModelStatistics,
    pub created_at: DateTime<Utc>,
}

impl ModelState {
    pub fn new(config: AlgorithmConfig, actions: Vec<String>) -> Self {
        let statistics = ModelStatistics::initial(&config, actions.len());
        Self {
            config,
            actions,
            statistics,
            created_at: Utc::now(),
        }
    }

    pub fn action_index(&self, action: &str) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    /// Encode into the store blob.
    pub fn encode(&self) -> BanditResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a store blob and check its structure.
    pub fn decode(bytes: &[u8]) -> BanditResult<Self> {
        let state: ModelState = serde_json::from_slice(bytes)?;
        state.check_shape()?;
        Ok(state)
    }

    fn check_shape(&self) -> BanditResult<()> {
        if self.config.kind() != self.statistics.kind() {
            return Err(BanditError::CorruptState(format!(
                "config is {} but statistics are {}",
                self.config.kind(),
                self.statistics.kind()
            )));
        }
        if self.statistics.len() != self.actions.len() {
            return Err(BanditError::CorruptState(format!(
                "{} actions but {} statistics entries",
                self.actions.len(),
                self.statistics.len()
            )));
        }
        if let (AlgorithmConfig::LinUcb { n_features, .. }, ModelStatistics::LinUcb(arms)) =
            (&self.config, &self.statistics)
        {
            let n = *n_features;
            if arms.iter().any(|arm| arm.a.len() != n * n || arm.b.len() != n) {
                return Err(BanditError::CorruptState(format!(
                    "linucb arm does not match n_features = {n}"
                )));
            }
        }
        Ok(())
    }
}

/// A model as read from the store, tagged with the counter it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub key: ModelKey,
    pub state: ModelState,
    pub counter: u64,
}

/// Opaque handle naming the statistics version a selection was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionToken {
    pub key: ModelKey,
    pub counter: u64,
}

impl SelectionToken {
    pub fn new(key: ModelKey, counter: u64) -> Self {
        Self { key, counter }
    }
}

// Layout: "<counter>:<name byte length>:<name><version>" so that names may
// contain any separator.
impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}{}",
            self.counter,
            self.key.name.len(),
            self.key.name,
            self.key.version
        )
    }
}

impl FromStr for SelectionToken {
    type Err = BanditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BanditError::InvalidConfig(format!("malformed selection token '{s}'"));
        let (counter, rest) = s.split_once(':').ok_or_else(malformed)?;
        let (name_len, rest) = rest.split_once(':').ok_or_else(malformed)?;
        let counter: u64 = counter.parse().map_err(|_| malformed())?;
        let name_len: usize = name_len.parse().map_err(|_| malformed())?;
        if name_len > rest.len() || !rest.is_char_boundary(name_len) {
            return Err(malformed());
        }
        let (name, version) = rest.split_at(name_len);
        Ok(Self::new(ModelKey::new(name, version), counter))
    }
}
