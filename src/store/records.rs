use crate::entity::{admins, dialogues, messages};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Basic,
    Elevated,
}

impl AccessLevel {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Basic => 1,
            Self::Elevated => 2,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Basic),
            2 => Some(Self::Elevated),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.as_i32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueStatus {
    Open,
    Assigned,
    Closed,
}

impl DialogueStatus {
    pub const LIVE: [&'static str; 2] = ["open", "assigned"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Closed => "closed",
        }
    }

    /// Open and assigned dialogues both count as the client's current conversation.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl FromStr for DialogueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown dialogue status '{}'", other)),
        }
    }
}

impl fmt::Display for DialogueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub user_id: i64,
    pub tag: String,
    pub level: AccessLevel,
    pub password_hash: String,
    pub active: bool,
}

impl Admin {
    pub fn is_elevated(&self) -> bool {
        self.level == AccessLevel::Elevated
    }
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub user_id: i64,
    pub tag: String,
    pub level: AccessLevel,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct Dialogue {
    pub id: i64,
    pub client_id: i64,
    pub admin_id: Option<i64>,
    pub status: DialogueStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub dialogue_id: i64,
    pub user_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminStats {
    pub total: u64,
    pub active: u64,
    pub closed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overview {
    pub messages: u64,
    pub open: u64,
    pub assigned: u64,
    pub closed: u64,
    pub admins: u64,
}

fn micros_to_datetime(table: &'static str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StoreError::Corrupt {
        table,
        detail: format!("timestamp out of range: {}", micros),
    })
}

impl TryFrom<admins::Model> for Admin {
    type Error = StoreError;

    fn try_from(r: admins::Model) -> Result<Self, Self::Error> {
        let level = AccessLevel::from_i32(r.level).ok_or_else(|| StoreError::Corrupt {
            table: "admins",
            detail: format!("invalid level {} for user {}", r.level, r.user_id),
        })?;

        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            tag: r.tag,
            level,
            password_hash: r.password,
            active: r.active,
        })
    }
}

impl TryFrom<dialogues::Model> for Dialogue {
    type Error = StoreError;

    fn try_from(r: dialogues::Model) -> Result<Self, Self::Error> {
        let status = r
            .status
            .parse()
            .map_err(|detail| StoreError::Corrupt {
                table: "dialogues",
                detail,
            })?;
        let end_time = r
            .end_time
            .map(|t| micros_to_datetime("dialogues", t))
            .transpose()?;

        Ok(Self {
            id: r.id,
            client_id: r.client_id,
            admin_id: r.admin_id,
            status,
            start_time: micros_to_datetime("dialogues", r.start_time)?,
            end_time,
        })
    }
}

impl TryFrom<messages::Model> for Message {
    type Error = StoreError;

    fn try_from(r: messages::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            dialogue_id: r.dialogue_id,
            user_id: r.user_id,
            body: r.message,
            timestamp: micros_to_datetime("messages", r.timestamp)?,
        })
    }
}
