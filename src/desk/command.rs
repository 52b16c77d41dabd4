use super::error::{DeskError, DeskResult};
use crate::store::{AccessLevel, Admin};
use std::str::FromStr;

/// Who may invoke a command, checked against a fresh lookup of the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,
    Admin,
    Elevated,
}

impl Access {
    pub fn allows(self, caller: Option<&Admin>) -> bool {
        match self {
            Self::Anyone => true,
            Self::Admin => caller.is_some(),
            Self::Elevated => caller.is_some_and(Admin::is_elevated),
        }
    }

    pub fn check(self, caller: Option<&Admin>) -> DeskResult<()> {
        if self.allows(caller) {
            return Ok(());
        }
        Err(DeskError::InsufficientPrivilege(match self {
            Self::Elevated => "tier 2 admins only",
            _ => "admins only",
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Help,
    Admin,
    Admins,
    SetTag,
    SetLevel,
    Take,
    Close,
    Transfer,
    ToggleStatus,
    Stats,
    Monitor,
    Password,
    History,
    Broadcast,
    Feedback,
}

impl CommandKind {
    pub const ALL: [CommandKind; 16] = [
        Self::Start,
        Self::Help,
        Self::Admins,
        Self::Close,
        Self::Feedback,
        Self::SetTag,
        Self::Admin,
        Self::Take,
        Self::Transfer,
        Self::ToggleStatus,
        Self::Stats,
        Self::History,
        Self::SetLevel,
        Self::Monitor,
        Self::Password,
        Self::Broadcast,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Admin => "admin",
            Self::Admins => "admins",
            Self::SetTag => "set_tag",
            Self::SetLevel => "set_level",
            Self::Take => "take",
            Self::Close => "close",
            Self::Transfer => "transfer",
            Self::ToggleStatus => "toggle_status",
            Self::Stats => "stats",
            Self::Monitor => "monitor",
            Self::Password => "password",
            Self::History => "history",
            Self::Broadcast => "broadcast",
            Self::Feedback => "feedback",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Self::Start
            | Self::Help
            | Self::Admins
            | Self::SetTag
            | Self::Close
            | Self::Feedback => Access::Anyone,
            Self::Admin
            | Self::Take
            | Self::Transfer
            | Self::ToggleStatus
            | Self::Stats
            | Self::History => Access::Admin,
            Self::SetLevel | Self::Monitor | Self::Password | Self::Broadcast => Access::Elevated,
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Self::SetTag => "/set_tag <password> <tag>",
            Self::SetLevel => "/set_level <user_id> <level 1|2>",
            Self::Take => "/take <client_id>",
            Self::Transfer => "/transfer <admin_user_id>",
            Self::History => "/history <dialogue_id>",
            Self::Broadcast => "/broadcast <message>",
            Self::Feedback => "/feedback <text>",
            Self::Start => "/start",
            Self::Help => "/help",
            Self::Admin => "/admin",
            Self::Admins => "/admins",
            Self::Close => "/close",
            Self::ToggleStatus => "/toggle_status",
            Self::Stats => "/stats",
            Self::Monitor => "/monitor",
            Self::Password => "/password",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::Start => "welcome message",
            Self::Help => "this list",
            Self::Admins => "list admins and who is free",
            Self::Close => "end your current dialogue",
            Self::SetTag => "register as an admin or change your tag",
            Self::Admin => "admin panel",
            Self::Take => "take a waiting client",
            Self::Transfer => "hand your client to another admin",
            Self::ToggleStatus => "switch between available and away",
            Self::Stats => "dialogue statistics",
            Self::History => "read a dialogue's messages",
            Self::SetLevel => "change an admin's access level",
            Self::Monitor => "watch all assigned dialogues",
            Self::Password => "issue a one-time admin password",
            Self::Broadcast => "announce to every client",
            Self::Feedback => "tell the team what you think",
        }
    }
}

impl FromStr for CommandKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or(())
    }
}

/// A command line split into its name and arguments, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: String,
    pub args: Vec<&'a str>,
    pub rest: &'a str,
}

impl<'a> Invocation<'a> {
    /// Splits `/name arg1 arg2`. Returns `None` when the text is not a command.
    pub fn split(text: &'a str) -> Option<Self> {
        let body = text.trim().strip_prefix('/')?;
        let (head, rest) = match body.find(char::is_whitespace) {
            Some(i) => (&body[..i], body[i..].trim()),
            None => (body, ""),
        };
        if head.is_empty() {
            return None;
        }

        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        Some(Self {
            name,
            args: rest.split_whitespace().collect(),
            rest,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Admin,
    Admins,
    SetTag { password: String, tag: String },
    SetLevel { user_id: i64, level: AccessLevel },
    Take { client_id: i64 },
    Close,
    Transfer { admin_id: i64 },
    ToggleStatus,
    Stats,
    Monitor,
    Password,
    History { dialogue_id: i64 },
    Broadcast { text: String },
    Feedback { text: String },
}

impl Command {
    pub fn parse(kind: CommandKind, invocation: &Invocation<'_>) -> DeskResult<Self> {
        let usage = || DeskError::Usage(kind.usage());
        let id_arg = || -> DeskResult<i64> {
            match invocation.args.as_slice() {
                [id] => id.parse().map_err(|_| usage()),
                _ => Err(usage()),
            }
        };

        Ok(match kind {
            CommandKind::Start => Self::Start,
            CommandKind::Help => Self::Help,
            CommandKind::Admin => Self::Admin,
            CommandKind::Admins => Self::Admins,
            CommandKind::Close => Self::Close,
            CommandKind::ToggleStatus => Self::ToggleStatus,
            CommandKind::Stats => Self::Stats,
            CommandKind::Monitor => Self::Monitor,
            CommandKind::Password => Self::Password,
            CommandKind::SetTag => match invocation.args.as_slice() {
                [password, tag] => Self::SetTag {
                    password: password.to_string(),
                    tag: tag.to_string(),
                },
                _ => return Err(usage()),
            },
            CommandKind::SetLevel => match invocation.args.as_slice() {
                [user_id, level] => Self::SetLevel {
                    user_id: user_id.parse().map_err(|_| usage())?,
                    level: level
                        .parse()
                        .ok()
                        .and_then(AccessLevel::from_i32)
                        .ok_or_else(usage)?,
                },
                _ => return Err(usage()),
            },
            CommandKind::Take => Self::Take {
                client_id: id_arg()?,
            },
            CommandKind::Transfer => Self::Transfer {
                admin_id: id_arg()?,
            },
            CommandKind::History => Self::History {
                dialogue_id: id_arg()?,
            },
            CommandKind::Broadcast | CommandKind::Feedback => {
                if invocation.rest.is_empty() {
                    return Err(usage());
                }
                let text = invocation.rest.to_string();
                match kind {
                    CommandKind::Feedback => Self::Feedback { text },
                    _ => Self::Broadcast { text },
                }
            }
        })
    }
}
