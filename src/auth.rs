use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Proof that the caller passed the admin check. Only [`Authorizer`] can
/// build one, so every admin command has to go through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor {
    id: String,
}

impl AdminActor {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Admin credential check
#[derive(Debug, Clone)]
pub struct Authorizer {
    /// SHA-256 of the admin API key
    key_digest: Option<[u8; 32]>,
    privileged_actors: HashSet<String>,
}

impl Authorizer {
    pub fn new(admin_api_key: Option<&str>, privileged_actors: impl IntoIterator<Item = String>) -> Self {
        Self {
            key_digest: admin_api_key.filter(|k| !k.is_empty()).map(digest),
            privileged_actors: privileged_actors.into_iter().collect(),
        }
    }

    /// A valid admin key admits any actor id (default "admin"); without a key
    /// the actor id itself must be privileged.
    pub fn authorize(&self, admin_key: Option<&str>, actor_id: Option<&str>) -> EngineResult<AdminActor> {
        let actor_id = actor_id.map(str::trim).filter(|a| !a.is_empty());

        if let Some(presented) = admin_key {
            let ok = self.key_digest.map_or(false, |expected| digest(presented) == expected);
            if !ok {
                warn!(actor = actor_id.unwrap_or("-"), "admin key rejected");
                return Err(EngineError::Forbidden("invalid admin key".into()));
            }
            return Ok(AdminActor { id: actor_id.unwrap_or("admin").to_string() });
        }

        match actor_id {
            None => Err(EngineError::Unauthorized),
            Some(id) if self.privileged_actors.contains(id) => Ok(AdminActor { id: id.to_string() }),
            Some(id) => {
                warn!(actor = id, "non-privileged actor attempted admin command");
                Err(EngineError::Forbidden(format!("actor {} is not an admin", id)))
            }
        }
    }

    pub fn from_headers(&self, headers: &HeaderMap) -> EngineResult<AdminActor> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        self.authorize(header(ADMIN_KEY_HEADER), header(ACTOR_ID_HEADER))
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}
