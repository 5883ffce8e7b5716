use std::sync::Arc;

use crate::{Plugin, PluginSpec};

/// Builds one plugin and knows the spec it should run with when the config
/// file says nothing about it.
pub trait PluginFactory: Send + Sync {
    /// Push the plugin's default spec unless `specs` already carries one with the same id.
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>);

    #[must_use]
    fn build(&self) -> Arc<dyn Plugin>;
}
