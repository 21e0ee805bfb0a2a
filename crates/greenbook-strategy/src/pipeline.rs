//! Plugin evaluation pipeline.
//!
//! Holds registered plugins with their operator-mutable descriptors.
//! Evaluation walks enabled plugins in ascending priority order; the
//! first ACCEPT with a non-empty candidate list wins, but every plugin
//! evaluated is reported so the ledger records each verdict.

use crate::plugin::{Evaluation, EvaluationInput, StrategyPlugin};
use greenbook_core::PluginDescriptor;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

struct Registered {
    descriptor: PluginDescriptor,
    plugin: Arc<dyn StrategyPlugin>,
}

/// Result of running the pipeline for one market.
pub struct PipelineOutcome {
    /// Every evaluation performed, in evaluation order.
    pub evaluations: Vec<(PluginDescriptor, Evaluation)>,
    /// Index into `evaluations` of the winning ACCEPT, if any.
    pub winner: Option<usize>,
}

impl PipelineOutcome {
    pub fn winning(&self) -> Option<&(PluginDescriptor, Evaluation)> {
        self.winner.map(|i| &self.evaluations[i])
    }
}

pub struct PluginPipeline {
    plugins: RwLock<Vec<Registered>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Register a plugin, using a persisted descriptor when available.
    pub fn register(
        &self,
        plugin: Arc<dyn StrategyPlugin>,
        persisted: Option<PluginDescriptor>,
    ) {
        let descriptor = persisted.unwrap_or_else(|| plugin.default_descriptor());
        debug!(id = %descriptor.id, priority = descriptor.priority, "Registered plugin");
        self.plugins.write().push(Registered { descriptor, plugin });
    }

    /// Current descriptors, in priority order.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        let mut out: Vec<PluginDescriptor> = self
            .plugins
            .read()
            .iter()
            .map(|r| r.descriptor.clone())
            .collect();
        out.sort_by_key(|d| d.priority);
        out
    }

    /// Apply an operator update (enabled flag, priority, config) to one
    /// plugin. Returns false when the id is unknown.
    pub fn update_descriptor(&self, updated: &PluginDescriptor) -> bool {
        let mut plugins = self.plugins.write();
        match plugins.iter_mut().find(|r| r.descriptor.id == updated.id) {
            Some(r) => {
                r.descriptor.enabled = updated.enabled;
                r.descriptor.priority = updated.priority;
                r.descriptor.config = updated.config.clone();
                true
            }
            None => {
                warn!(id = %updated.id, "Descriptor update for unknown plugin");
                false
            }
        }
    }

    /// Evaluate all enabled plugins against one market.
    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> PipelineOutcome {
        let plugins = self.plugins.read();
        let mut order: Vec<&Registered> = plugins.iter().filter(|r| r.descriptor.enabled).collect();
        order.sort_by_key(|r| r.descriptor.priority);

        let mut evaluations = Vec::with_capacity(order.len());
        let mut winner = None;
        for registered in order {
            let evaluation = registered
                .plugin
                .evaluate(input, &registered.descriptor.config);
            let is_winner = winner.is_none() && evaluation.is_winning_accept();
            if is_winner {
                winner = Some(evaluations.len());
            }
            evaluations.push((registered.descriptor.clone(), evaluation));
            // First ACCEPT wins for this market and cycle.
            if is_winner {
                break;
            }
        }

        PipelineOutcome {
            evaluations,
            winner,
        }
    }
}

impl Default for PluginPipeline {
    fn default() -> Self {
        Self::new()
    }
}
