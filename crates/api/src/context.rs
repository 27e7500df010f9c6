use hotelstock_ledger::Actor;

/// Who is performing a request.
///
/// Set by [`crate::middleware::actor_middleware`] and required by every ledger route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    username: String,
    role: String,
}

impl ActorContext {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// The identity recorded as `created_by` on ledger rows.
    pub fn actor(&self) -> Actor {
        Actor::new(self.username.clone(), self.role.clone())
    }
}
