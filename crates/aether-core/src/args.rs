//! Positional argument binding for text commands.
//!
//! Tokens are whitespace separated; a token may be wrapped in double quotes to
//! include spaces (`!addwhitelist "Some Name"`). Trailing free text (reasons,
//! role names, status text) takes the rest of the line verbatim.

use crate::registry::ParamShape;

/// How the user referred to a member or role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(u64),
    Name(String),
}

impl Lookup {
    /// Accepts `<@id>`, `<@!id>`, a bare id, or a name.
    pub fn user(token: &str) -> Self {
        let inner = token
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|rest| rest.strip_prefix('!').unwrap_or(rest));
        match inner.or(Some(token)).and_then(parse_snowflake) {
            Some(id) => Self::Id(id),
            None => Self::Name(token.to_string()),
        }
    }

    /// Accepts `<@&id>`, a bare id, or a name.
    pub fn role(token: &str) -> Self {
        let inner = token
            .strip_prefix("<@&")
            .and_then(|rest| rest.strip_suffix('>'));
        match inner.or(Some(token)).and_then(parse_snowflake) {
            Some(id) => Self::Id(id),
            None => Self::Name(token.to_string()),
        }
    }
}

/// A bare number may also be a literal name (a role called `2024`).
fn digits_as_name(raw: &str, lookup: &Lookup) -> Option<Lookup> {
    match lookup {
        Lookup::Id(_) if raw.bytes().all(|b| b.is_ascii_digit()) => {
            Some(Lookup::Name(raw.to_string()))
        }
        _ => None,
    }
}

fn parse_snowflake(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().filter(|id| *id != 0)
}

/// A member argument together with the text the user typed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberArg {
    pub raw: String,
    pub lookup: Lookup,
}

impl MemberArg {
    fn parse(token: &str) -> Self {
        Self {
            raw: token.to_string(),
            lookup: Lookup::user(token),
        }
    }

    /// Name to try when a bare-number id matched nobody.
    pub fn name_fallback(&self) -> Option<Lookup> {
        digits_as_name(&self.raw, &self.lookup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleArg {
    pub raw: String,
    pub lookup: Lookup,
}

impl RoleArg {
    pub fn name_fallback(&self) -> Option<Lookup> {
        digits_as_name(&self.raw, &self.lookup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args {
    None,
    Member(MemberArg),
    MemberWithReason {
        member: MemberArg,
        reason: Option<String>,
    },
    MemberAndRole {
        member: MemberArg,
        role: RoleArg,
    },
    OptionalMember(Option<MemberArg>),
    StatusText {
        kind: String,
        text: String,
    },
}

/// Binds the text after the command name to `shape`. `None` means required input is missing.
pub fn bind(shape: ParamShape, input: &str) -> Option<Args> {
    match shape {
        ParamShape::None => Some(Args::None),
        ParamShape::Member => {
            let (token, _) = next_token(input)?;
            Some(Args::Member(MemberArg::parse(&token)))
        }
        ParamShape::MemberWithReason => {
            let (token, rest) = next_token(input)?;
            Some(Args::MemberWithReason {
                member: MemberArg::parse(&token),
                reason: free_text(rest),
            })
        }
        ParamShape::MemberAndRole => {
            let (token, rest) = next_token(input)?;
            let role = unquote(free_text(rest)?.as_str()).to_string();
            if role.is_empty() {
                return None;
            }
            Some(Args::MemberAndRole {
                member: MemberArg::parse(&token),
                role: RoleArg {
                    lookup: Lookup::role(&role),
                    raw: role,
                },
            })
        }
        ParamShape::OptionalMember => Some(Args::OptionalMember(
            next_token(input).map(|(token, _)| MemberArg::parse(&token)),
        )),
        ParamShape::StatusText => {
            let (kind, rest) = next_token(input)?;
            Some(Args::StatusText {
                kind,
                text: free_text(rest)?,
            })
        }
    }
}

/// Splits off the first token, honoring double quotes. Returns the token and the unconsumed rest.
pub fn next_token(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    if let Some(quoted) = input.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            let token = &quoted[..end];
            if !token.is_empty() {
                return Some((token.to_string(), &quoted[end + 1..]));
            }
        }
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((input[..end].to_string(), &input[end..]))
}

fn free_text(rest: &str) -> Option<String> {
    let trimmed = rest.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lookup_accepts_mentions_and_ids() {
        assert_eq!(Lookup::user("<@42>"), Lookup::Id(42));
        assert_eq!(Lookup::user("<@!42>"), Lookup::Id(42));
        assert_eq!(Lookup::user("42"), Lookup::Id(42));
        assert_eq!(Lookup::user("alice"), Lookup::Name("alice".to_string()));
        assert_eq!(Lookup::user("<@abc>"), Lookup::Name("<@abc>".to_string()));
    }

    #[test]
    fn role_lookup_rejects_user_mentions_as_ids() {
        assert_eq!(Lookup::role("<@&7>"), Lookup::Id(7));
        assert_eq!(Lookup::role("<@7>"), Lookup::Name("<@7>".to_string()));
        assert_eq!(Lookup::role("Moderators"), Lookup::Name("Moderators".to_string()));
    }

    #[test]
    fn bare_numbers_can_fall_back_to_names() {
        let bound = bind(ParamShape::MemberAndRole, "1234 2024").expect("bind");
        let Args::MemberAndRole { member, role } = bound else {
            panic!("wrong shape");
        };
        assert_eq!(role.lookup, Lookup::Id(2024));
        assert_eq!(role.name_fallback(), Some(Lookup::Name("2024".to_string())));
        assert_eq!(member.name_fallback(), Some(Lookup::Name("1234".to_string())));

        let mention = MemberArg::parse("<@1234>");
        assert_eq!(mention.name_fallback(), None);
        let named = MemberArg::parse("alice");
        assert_eq!(named.name_fallback(), None);
    }

    #[test]
    fn reason_is_optional_rest_of_line() {
        let bound = bind(ParamShape::MemberWithReason, " <@5>   spamming   links ").expect("bind");
        let Args::MemberWithReason { member, reason } = bound else {
            panic!("wrong shape");
        };
        assert_eq!(member.lookup, Lookup::Id(5));
        assert_eq!(reason.as_deref(), Some("spamming   links"));

        let bound = bind(ParamShape::MemberWithReason, "<@5>").expect("bind");
        assert!(matches!(bound, Args::MemberWithReason { reason: None, .. }));
    }

    #[test]
    fn missing_required_arguments_fail_to_bind() {
        assert_eq!(bind(ParamShape::Member, "   "), None);
        assert_eq!(bind(ParamShape::MemberWithReason, ""), None);
        assert_eq!(bind(ParamShape::MemberAndRole, "<@5>"), None);
        assert_eq!(bind(ParamShape::StatusText, "listening"), None);
    }

    #[test]
    fn role_takes_rest_of_line_and_strips_quotes() {
        let bound = bind(ParamShape::MemberAndRole, "<@5> \"Server Mods\"").expect("bind");
        let Args::MemberAndRole { role, .. } = bound else {
            panic!("wrong shape");
        };
        assert_eq!(role.raw, "Server Mods");
        assert_eq!(role.lookup, Lookup::Name("Server Mods".to_string()));
    }

    #[test]
    fn quoted_member_names_keep_spaces() {
        let bound = bind(ParamShape::Member, "\"Jane Doe\" ignored").expect("bind");
        assert_eq!(
            bound,
            Args::Member(MemberArg {
                raw: "Jane Doe".to_string(),
                lookup: Lookup::Name("Jane Doe".to_string()),
            })
        );
    }

    #[test]
    fn status_text_keeps_inner_spacing() {
        let bound = bind(ParamShape::StatusText, "Listening  lo-fi  beats").expect("bind");
        assert_eq!(
            bound,
            Args::StatusText {
                kind: "Listening".to_string(),
                text: "lo-fi  beats".to_string(),
            }
        );
    }

    #[test]
    fn optional_member_may_be_absent() {
        assert_eq!(
            bind(ParamShape::OptionalMember, ""),
            Some(Args::OptionalMember(None))
        );
    }
}
