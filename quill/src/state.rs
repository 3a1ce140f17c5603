use std::sync::Arc;

use axum::http::HeaderMap;
use quill_core::handlers::{self, Provisioning};
use quill_core::{Actor, Result, Store};

use crate::auth::{bearer_token, TokenKind, TokenService};
use crate::config::Config;
use crate::ServerError;

/// State shared by every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenService>,
    pub provisioning: Provisioning,
}

impl AppState {
    pub fn new(store: Store, config: &Config) -> std::result::Result<Self, ServerError> {
        Ok(AppState {
            store,
            tokens: Arc::new(TokenService::new(&config.jwt)?),
            provisioning: config.provisioning,
        })
    }

    /// Resolve the bearer token in `headers` to an actor, loaded fresh
    /// from the store. No token means no actor.
    pub async fn identify(&self, headers: &HeaderMap) -> Result<Option<Actor>> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };
        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let id = claims.user_id()?;
        let actor = self
            .store
            .run(move |conn| handlers::load_actor(conn, id))
            .await?;
        Ok(Some(actor))
    }
}
