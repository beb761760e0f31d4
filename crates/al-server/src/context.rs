//! Application context shared by all route handlers.
//!
//! [`AppContext`] is cheap to clone: everything inside is either an `Arc` or
//! a handle that wraps one.

use std::sync::Arc;

use al_av::ToolRegistry;
use al_core::config::Config;

use crate::controller::{ControllerSettings, FfmpegLauncher, Launcher, LiveController};
use crate::registry::SessionRegistry;
use crate::store::SegmentStore;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub registry: SessionRegistry,
}

impl AppContext {
    /// Build a context that launches ffmpeg from `tools`.
    pub fn new(config: Config, tools: Arc<ToolRegistry>) -> Self {
        let launcher = Arc::new(FfmpegLauncher::new(
            tools.clone(),
            config.transcoder.clone(),
        ));
        Self::with_launcher(config, tools, launcher)
    }

    /// Build a context around a custom [`Launcher`].
    pub fn with_launcher(config: Config, tools: Arc<ToolRegistry>, launcher: Arc<dyn Launcher>) -> Self {
        let store = SegmentStore::new(config.live.store_root.clone());
        let controller = LiveController::new(store, launcher, ControllerSettings::from_config(&config));
        let registry = SessionRegistry::new(controller, config.upstream.clone());

        Self {
            config: Arc::new(config),
            tools,
            registry,
        }
    }

    pub fn store(&self) -> &SegmentStore {
        self.registry.store()
    }
}
