use stockledger_core::UserId;

/// Acting user for a request.
///
/// Inserted by the actor middleware and present for every domain route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: UserId,
}

impl ActorContext {
    pub fn new(actor: UserId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }
}
