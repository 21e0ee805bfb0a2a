//! Operator commands and the engine handle.
//!
//! External control operations never touch engine state directly: they
//! enqueue a command that the loop applies between scan cycles. Reads
//! (status, activity, plugins) go through the handle synchronously.

use crate::activity::ActivityEntry;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::status::EngineStatus;
use greenbook_core::{EngineMode, PluginDescriptor, RiskSettings};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A queued state transition or settings change.
#[derive(Debug)]
pub enum EngineCommand {
    Start(EngineMode),
    Stop,
    Pause,
    Resume,
    GoLive,
    GoStaging,
    UpdateSettings(RiskSettings),
}

pub(crate) struct CommandEnvelope {
    pub command: EngineCommand,
    pub reply: oneshot::Sender<EngineResult<EngineMode>>,
}

/// Cloneable front door for the control surface.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) engine: Arc<Engine>,
    pub(crate) command_tx: mpsc::Sender<CommandEnvelope>,
}

impl EngineHandle {
    /// Queue a command and wait for the loop to apply it. Resolves with
    /// the mode in effect after the transition.
    pub async fn send(&self, command: EngineCommand) -> EngineResult<EngineMode> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(CommandEnvelope { command, reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    pub fn activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.engine.activity().recent(limit)
    }

    pub fn plugins(&self) -> Vec<PluginDescriptor> {
        self.engine.pipeline().descriptors()
    }

    pub fn update_plugin(&self, descriptor: &PluginDescriptor) -> bool {
        self.engine.update_plugin(descriptor)
    }
}
