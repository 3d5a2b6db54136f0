//! The plugin contract

use crate::api::PluginApi;
use crate::dispatcher::CommandSpecError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Command(#[from] CommandSpecError),

    #[error("invalid plugin definition {path}: {message}")]
    Definition { path: PathBuf, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A loadable plugin
///
/// `install` runs once per process with a fresh [`PluginApi`]. Commands
/// registered through [`PluginApi::command`] only become visible once
/// `install` returned `Ok`.
pub trait Plugin: Send + Sync {
    fn install(&self, api: &PluginApi) -> Result<(), PluginError>;
}

impl<F> Plugin for F
where
    F: Fn(&PluginApi) -> Result<(), PluginError> + Send + Sync,
{
    fn install(&self, api: &PluginApi) -> Result<(), PluginError> {
        self(api)
    }
}
