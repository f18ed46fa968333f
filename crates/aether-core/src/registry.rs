#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Only the configured owner. Everyone else gets `denial`.
    OwnerOnly { denial: &'static str },
    /// Owner, guild administrators, and allowlisted users.
    Trusted,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    None,
    Member,
    MemberWithReason,
    MemberAndRole,
    OptionalMember,
    StatusText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Kick,
    Ban,
    AddRole,
    RemoveRole,
    Shutdown,
    Restart,
    Status,
    ServerInfo,
    UserInfo,
    Ping,
    SetStatus,
    AddWhitelist,
    RemoveWhitelist,
    ShowWhitelist,
    Help,
}

/// Grouping used by the help card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Moderation,
    OwnerOnly,
    Info,
    Hidden,
}

impl Section {
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Moderation => "🔨 Moderation",
            Self::OwnerOnly => "⚙️ Owner Only",
            Self::Info => "📊 Info",
            Self::Hidden => "",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub privilege: Privilege,
    pub params: ParamShape,
    /// Invocation synopsis without the prefix, e.g. `kick @user [reason]`.
    pub usage: &'static str,
    pub section: Section,
    pub action: Action,
}

impl CommandSpec {
    const fn new(
        name: &'static str,
        privilege: Privilege,
        params: ParamShape,
        usage: &'static str,
        section: Section,
        action: Action,
    ) -> Self {
        Self {
            name,
            privilege,
            params,
            usage,
            section,
            action,
        }
    }

    /// Commands that need a guild context to run.
    pub fn guild_only(&self) -> bool {
        matches!(
            self.action,
            Action::Kick
                | Action::Ban
                | Action::AddRole
                | Action::RemoveRole
                | Action::ServerInfo
                | Action::UserInfo
        )
    }
}

const WHITELIST_DENIAL: &str = "⛔ Only the bot owner can manage the whitelist.";

#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    pub fn with_defaults() -> Self {
        use Action as A;
        use ParamShape as P;
        use Privilege::{Public, Trusted};
        use Section as S;

        let commands = vec![
            CommandSpec::new(
                "kick",
                Trusted,
                P::MemberWithReason,
                "kick @user [reason]",
                S::Moderation,
                A::Kick,
            ),
            CommandSpec::new(
                "ban",
                Trusted,
                P::MemberWithReason,
                "ban @user [reason]",
                S::Moderation,
                A::Ban,
            ),
            CommandSpec::new(
                "addrole",
                Trusted,
                P::MemberAndRole,
                "addrole @user @role",
                S::Moderation,
                A::AddRole,
            ),
            CommandSpec::new(
                "removerole",
                Trusted,
                P::MemberAndRole,
                "removerole @user @role",
                S::Moderation,
                A::RemoveRole,
            ),
            CommandSpec::new(
                "shutdown",
                Privilege::OwnerOnly { denial: "⛔ Only the bot owner can shut me down." },
                P::None,
                "shutdown",
                S::OwnerOnly,
                A::Shutdown,
            ),
            CommandSpec::new(
                "restart",
                Privilege::OwnerOnly { denial: "⛔ Only the bot owner can restart me." },
                P::None,
                "restart",
                S::OwnerOnly,
                A::Restart,
            ),
            CommandSpec::new(
                "setstatus",
                Privilege::OwnerOnly { denial: "⛔ Only the bot owner can change my status." },
                P::StatusText,
                "setstatus <type> <text>",
                S::OwnerOnly,
                A::SetStatus,
            ),
            CommandSpec::new(
                "addwhitelist",
                Privilege::OwnerOnly { denial: WHITELIST_DENIAL },
                P::Member,
                "addwhitelist @user",
                S::OwnerOnly,
                A::AddWhitelist,
            ),
            CommandSpec::new(
                "removewhitelist",
                Privilege::OwnerOnly { denial: WHITELIST_DENIAL },
                P::Member,
                "removewhitelist @user",
                S::OwnerOnly,
                A::RemoveWhitelist,
            ),
            CommandSpec::new(
                "showwhitelist",
                Privilege::OwnerOnly { denial: "⛔ Only the bot owner can view the whitelist." },
                P::None,
                "showwhitelist",
                S::OwnerOnly,
                A::ShowWhitelist,
            ),
            CommandSpec::new(
                "status",
                Trusted,
                P::None,
                "status",
                S::Info,
                A::Status,
            ),
            CommandSpec::new(
                "serverinfo",
                Trusted,
                P::None,
                "serverinfo",
                S::Info,
                A::ServerInfo,
            ),
            CommandSpec::new(
                "userinfo",
                Trusted,
                P::OptionalMember,
                "userinfo [@user]",
                S::Info,
                A::UserInfo,
            ),
            CommandSpec::new(
                "ping",
                Trusted,
                P::None,
                "ping",
                S::Info,
                A::Ping,
            ),
            CommandSpec::new(
                "help",
                Public,
                P::None,
                "help",
                S::Hidden,
                A::Help,
            ),
        ];
        Self { commands }
    }

    pub fn list(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Case-sensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|spec| spec.name == name)
    }

    pub fn in_section(&self, section: Section) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter().filter(move |spec| spec.section == section)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let registry = CommandRegistry::with_defaults();
        let names: HashSet<_> = registry.list().iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), registry.list().len());
        assert_eq!(registry.list().len(), 15);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.get("kick").is_some());
        assert!(registry.get("Kick").is_none());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn privileges_match_command_table() {
        let registry = CommandRegistry::with_defaults();
        let owner_only = [
            "shutdown",
            "restart",
            "setstatus",
            "addwhitelist",
            "removewhitelist",
            "showwhitelist",
        ];
        for spec in registry.list() {
            let expected_owner = owner_only.contains(&spec.name);
            assert_eq!(
                matches!(spec.privilege, Privilege::OwnerOnly { .. }),
                expected_owner,
                "{}",
                spec.name
            );
        }
        assert_eq!(registry.get("help").map(|s| s.privilege), Some(Privilege::Public));
        assert_eq!(registry.get("ping").map(|s| s.privilege), Some(Privilege::Trusted));
    }

    #[test]
    fn usage_starts_with_command_name() {
        let registry = CommandRegistry::with_defaults();
        for spec in registry.list() {
            assert!(spec.usage.starts_with(spec.name), "{}", spec.name);
        }
    }
}
