use aether_store::AllowList;

/// The invoking user, as reported by the platform for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub is_guild_administrator: bool,
    /// `None` for direct messages.
    pub guild_id: Option<u64>,
    pub is_bot: bool,
}

impl Actor {
    pub fn member(id: u64, guild_id: u64, is_guild_administrator: bool) -> Self {
        Self {
            id,
            is_guild_administrator,
            guild_id: Some(guild_id),
            is_bot: false,
        }
    }

    pub fn direct(id: u64) -> Self {
        Self {
            id,
            is_guild_administrator: false,
            guild_id: None,
            is_bot: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    owner_id: u64,
}

impl AccessPolicy {
    pub fn new(owner_id: u64) -> Self {
        Self { owner_id }
    }

    pub fn owner_id(&self) -> u64 {
        self.owner_id
    }

    /// Gate for moderation and info commands: owner, guild administrator, or allowlisted.
    pub fn is_authorized(&self, actor: &Actor, allowlist: &AllowList) -> bool {
        self.is_owner(actor) || actor.is_guild_administrator || allowlist.contains(actor.id)
    }

    /// Gate for owner-exclusive commands. Administrators and allowlisted users do not pass.
    pub fn is_owner(&self, actor: &Actor) -> bool {
        actor.id == self.owner_id
    }
}
