//! User identity seam
//!
//! Authentication happens elsewhere; the engine only needs a stable user id
//! to stamp as the owner of sessions it seeds.

/// Supplies the signed-in user's identifier
pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> String;
}

/// Fixed identity, for single-user setups and tests
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> String {
        self.0.clone()
    }
}
