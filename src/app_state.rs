// Application state shared by every HTTP handler

use std::sync::Arc;

use crate::auth::Authorizer;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::EngineResult;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub engine: Engine,
    pub authorizer: Authorizer,
}

impl AppState {
    pub fn new(engine: Engine, authorizer: Authorizer) -> Self {
        Self { engine, authorizer }
    }

    /// Open the configured store and admin credentials
    pub fn from_config(config: &Config) -> EngineResult<Self> {
        let engine = Engine::open(config)?;
        let authorizer = Authorizer::new(config.admin_api_key.as_deref(), config.admin_actor_ids.clone());
        Ok(Self::new(engine, authorizer))
    }
}
