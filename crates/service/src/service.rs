//! Bandit service: create models, select actions, record outcomes.
//!
//! `record_outcome` is the only read-modify-write path. It never holds a
//! lock; it reads (state, counter), computes new statistics and commits them
//! with a conditional write, restarting from the read when another writer
//! got there first.

use crate::registry::ModelRegistry;
use crate::retry::RetryPolicy;
use bandit_core::{
    AlgorithmConfig, BanditError, BanditResult, Model, ModelKey, ModelState, SelectionToken,
};
use bandit_rl_engine::ActionInsight;
use bandit_store::ModelStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// The chosen action and the statistics version it was based on.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub action: String,
    pub token: SelectionToken,
}

pub struct BanditService {
    registry: ModelRegistry,
    store: Arc<dyn ModelStore>,
    retry: RetryPolicy,
}

impl BanditService {
    pub fn new(store: Arc<dyn ModelStore>, retry: RetryPolicy) -> Self {
        Self {
            registry: ModelRegistry::new(store.clone()),
            store,
            retry,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub async fn create_model(
        &self,
        key: ModelKey,
        config: AlgorithmConfig,
        actions: Vec<String>,
    ) -> BanditResult<Model> {
        metrics::counter!("bandit.create.requests").increment(1);
        self.registry.create(key, config, actions).await
    }

    /// Choose an action for `key`. Read-only against the store.
    pub async fn select_action(
        &self,
        key: &ModelKey,
        context: Option<&[f64]>,
    ) -> BanditResult<Selection> {
        let start = Instant::now();
        metrics::counter!("bandit.select.requests").increment(1);

        let model = self.registry.resolve(key).await?;
        let index = {
            let mut rng = rand::thread_rng();
            bandit_rl_engine::select(&model.state, context, &mut rng)?
        };
        let action = model.state.actions.get(index).cloned().ok_or_else(|| {
            BanditError::CorruptState(format!("selected index {index} has no action"))
        })?;

        metrics::histogram!("bandit.select.latency_us")
            .record(start.elapsed().as_micros() as f64);
        debug!(model = %key, action = %action, counter = model.counter, "Action selected");

        Ok(Selection {
            action,
            token: SelectionToken::new(model.key, model.counter),
        })
    }

    /// Fold one observed reward into the model. Returns the committed counter.
    ///
    /// Caller errors (unknown action, bad reward or context) fail on the first
    /// attempt. Conflicts are retried up to `max_attempts` and then surface as
    /// `Conflict`; store failures surface immediately. On any failure the
    /// stored statistics are exactly what they were before the call.
    pub async fn record_outcome(
        &self,
        key: &ModelKey,
        action: &str,
        reward: f64,
        context: Option<&[f64]>,
    ) -> BanditResult<u64> {
        metrics::counter!("bandit.record.requests").increment(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let model = self.registry.resolve(key).await?;
            let statistics = bandit_rl_engine::update(&model.state, action, reward, context)?;
            let next = ModelState {
                statistics,
                ..model.state
            };

            match self
                .store
                .conditional_write(key, next.encode()?, model.counter)
                .await
            {
                Ok(counter) => {
                    debug!(
                        model = %key,
                        action = action,
                        reward = reward,
                        counter = counter,
                        attempt = attempt,
                        "Outcome recorded"
                    );
                    return Ok(counter);
                }
                Err(e) if e.is_transient() => {
                    metrics::counter!("bandit.record.conflicts").increment(1);
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("bandit.record.exhausted").increment(1);
                        error!(
                            model = %key,
                            attempts = attempt,
                            "Giving up on conflicting outcome write"
                        );
                        return Err(BanditError::Conflict {
                            model: key.to_string(),
                            attempts: attempt,
                        });
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        model = %key,
                        attempt = attempt,
                        delay_us = delay.as_micros() as u64,
                        error = %e,
                        "Outcome write conflicted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if matches!(e, BanditError::StoreUnavailable(_)) {
                        error!(
                            model = %key,
                            error = %e,
                            "Model store failure while recording outcome"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Current model plus per-action insights.
    pub async fn describe(&self, key: &ModelKey) -> BanditResult<(Model, Vec<ActionInsight>)> {
        let model = self.registry.resolve(key).await?;
        let insights = bandit_rl_engine::inspect(&model.state)?;
        Ok((model, insights))
    }
}
