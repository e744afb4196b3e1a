//! Identity adapters. Authentication happens upstream; these only carry the
//! resolved actor into the pipeline.

use async_trait::async_trait;
use uuid::Uuid;

use crate::ports::IdentityProvider;

/// Actor known up front (request header, CLI flag), or nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<Uuid>);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_actor_id(&self) -> Option<Uuid> {
        self.0
    }
}
