//! Model registry: validates and creates models, resolves (name, version)
//! to the currently stored state. Holds no state of its own; every resolve
//! reads through to the store.

use bandit_core::{AlgorithmConfig, BanditError, BanditResult, Model, ModelKey, ModelState};
use bandit_store::ModelStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// Validate, initialize and persist a new model at counter 0.
    pub async fn create(
        &self,
        key: ModelKey,
        config: AlgorithmConfig,
        actions: Vec<String>,
    ) -> BanditResult<Model> {
        validate(&key, &config, &actions)?;

        let state = ModelState::new(config, actions);
        self.store.create_if_absent(&key, state.encode()?).await?;

        info!(
            model = %key,
            algorithm = %config.kind(),
            actions = state.actions.len(),
            "Model created"
        );

        Ok(Model {
            key,
            state,
            counter: 0,
        })
    }

    pub async fn resolve(&self, key: &ModelKey) -> BanditResult<Model> {
        let stored = self
            .store
            .load(key)
            .await?
            .ok_or_else(|| BanditError::NotFound(key.to_string()))?;
        let state = ModelState::decode(&stored.blob)?;

        debug!(model = %key, counter = stored.counter, "Model resolved");

        Ok(Model {
            key: key.clone(),
            state,
            counter: stored.counter,
        })
    }
}

/// Reject anything that could not produce a usable model.
pub fn validate(key: &ModelKey, config: &AlgorithmConfig, actions: &[String]) -> BanditResult<()> {
    if key.name.is_empty() || key.version.is_empty() {
        return Err(BanditError::InvalidConfig(
            "model name and version must be non-empty".into(),
        ));
    }

    match *config {
        AlgorithmConfig::EpsilonGreedy { epsilon } => {
            if !(0.0..=1.0).contains(&epsilon) {
                return Err(BanditError::InvalidConfig(format!(
                    "epsilon must lie in [0, 1], got {epsilon}"
                )));
            }
        }
        AlgorithmConfig::LinUcb { n_features, alpha } => {
            if n_features == 0 {
                return Err(BanditError::InvalidConfig(
                    "n_features must be at least 1".into(),
                ));
            }
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(BanditError::InvalidConfig(format!(
                    "alpha must be a finite non-negative number, got {alpha}"
                )));
            }
        }
    }

    if actions.is_empty() {
        return Err(BanditError::InvalidConfig(
            "at least one action is required".into(),
        ));
    }
    let mut seen = HashSet::with_capacity(actions.len());
    for action in actions {
        if action.is_empty() {
            return Err(BanditError::InvalidConfig(
                "action identifiers must be non-empty".into(),
            ));
        }
        if !seen.insert(action.as_str()) {
            return Err(BanditError::InvalidConfig(format!(
                "duplicate action '{action}'"
            )));
        }
    }

    Ok(())
}
