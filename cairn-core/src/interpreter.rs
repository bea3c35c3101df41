//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//!
//! References that could not be resolved at plan time (they point at
//! resources created or replaced by the same Plan) are resolved here, from
//! the states returned by earlier Effects.
//!
//! The delete half of every Replace runs before any other Effect, in reverse
//! plan order. A Plan lists dependencies first, so a replaced resource is
//! only deleted once the replaced resources referring to it are gone.

use std::collections::HashMap;

use log::info;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{Bindings, Resource, ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Read succeeded
    Read { state: State },
    /// Read found nothing; the resource should be dropped from state
    Gone { id: ResourceId },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete and create both succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { id: ResourceId, reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
    /// Resources whose remote object was deleted, including a Replace whose
    /// create half failed
    pub destroyed: Vec<ResourceId>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut bindings = Bindings::new();
        let mut destroyed = Vec::new();

        let mut failed_deletes = HashMap::new();
        if !self.config.dry_run {
            for (index, effect) in plan.effects().iter().enumerate().rev() {
                let Effect::Replace {
                    id, identifier, to, ..
                } = effect
                else {
                    continue;
                };
                info!("replacing {} ({}), deleting first", id, identifier);
                match self.provider.delete(id, identifier, &to.timeouts).await {
                    Ok(()) => destroyed.push(id.clone()),
                    Err(e) if self.config.continue_on_error => {
                        failed_deletes.insert(index, e);
                    }
                    Err(e) => {
                        return ApplyResult {
                            outcomes: vec![Err(e)],
                            success_count: 0,
                            failure_count: 1,
                            destroyed,
                        };
                    }
                }
            }
        }

        for (index, effect) in plan.effects().iter().enumerate() {
            let result = match failed_deletes.remove(&index) {
                Some(e) => Err(e),
                None => {
                    self.execute_effect(effect, &mut bindings, &mut destroyed)
                        .await
                }
            };

            match &result {
                Ok(_) => success_count += 1,
                Err(_) => {
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
            destroyed,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &mut Bindings,
        destroyed: &mut Vec<ResourceId>,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                id: effect.resource_id().clone(),
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Read {
                id,
                identifier,
                timeouts,
            } => {
                let state = self
                    .provider
                    .read(id, identifier.as_deref(), timeouts)
                    .await?;
                if !state.exists {
                    info!("{} no longer exists", id);
                    return Ok(EffectOutcome::Gone { id: id.clone() });
                }
                bindings.insert(id.name.clone(), state.binding_attributes());
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resolved = resolve(resource, bindings)?;
                info!("creating {}", resource.id);
                let state = self.provider.create(&resolved).await?;
                record(bindings, &resolved, &state);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update {
                id,
                identifier,
                from,
                to,
                ..
            } => {
                let resolved = resolve(to, bindings)?;
                info!("updating {} ({})", id, identifier);
                let state = self
                    .provider
                    .update(id, identifier, from, &resolved)
                    .await?;
                record(bindings, &resolved, &state);
                Ok(EffectOutcome::Updated { state })
            }
            // Already deleted before the first Effect ran
            Effect::Replace { id, to, .. } => {
                let resolved = resolve(to, bindings).map_err(|e| {
                    e.context(format!("{} was destroyed but creating it again failed", id))
                })?;
                info!("creating replacement for {}", id);
                let state = self.provider.create(&resolved).await.map_err(|e| {
                    e.context(format!("{} was destroyed but creating it again failed", id))
                })?;
                record(bindings, &resolved, &state);
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete {
                id,
                identifier,
                timeouts,
            } => {
                info!("deleting {} ({})", id, identifier);
                self.provider.delete(id, identifier, timeouts).await?;
                destroyed.push(id.clone());
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

/// Resolve remaining references, failing if any dependency is unavailable
fn resolve(resource: &Resource, bindings: &Bindings) -> ProviderResult<Resource> {
    let resolved = resource.resolve(bindings);
    if let Some((attr, binding, target)) = resolved.unresolved() {
        return Err(ProviderError::validation(format!(
            "attribute '{}' refers to {}.{}, which is not available",
            attr, binding, target
        ))
        .for_resource(resource.id.clone()));
    }
    Ok(resolved)
}

fn record(bindings: &mut Bindings, resolved: &Resource, state: &State) {
    let mut attrs = resolved.attributes.clone();
    attrs.extend(state.binding_attributes());
    bindings.insert(resolved.id.name.clone(), attrs);
}
