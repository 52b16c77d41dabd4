use crate::store::StoreError;
use thiserror::Error;

/// Everything a desk operation can fail with. All variants except `Storage`
/// are rejections that are shown to the sender as-is.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("⛔ Insufficient privilege: {0}.")]
    InsufficientPrivilege(&'static str),
    #[error("❌ Usage: {0}")]
    Usage(&'static str),
    #[error("❌ Unknown command /{0}. Use /help to see what is available.")]
    UnknownCommand(String),
    #[error("❌ Wrong password.")]
    BadPassword,
    #[error("❌ This one-time password has expired. Ask a tier 2 admin for a new one.")]
    ExpiredPassword,
    #[error("❌ Invalid tag: {0}.")]
    InvalidTag(&'static str),
    #[error("❌ Tag #{0} is already taken.")]
    TagTaken(String),
    #[error("❌ User {0} is not an admin.")]
    NotAnAdmin(i64),
    #[error("❌ You cannot change your own level.")]
    SelfLevelChange,
    #[error("❌ You have no active dialogue.")]
    NoActiveDialogue,
    #[error("❌ You are already handling a dialogue. Close or transfer it first.")]
    AdminBusy,
    #[error("❌ Client {0} has no dialogue waiting for an admin.")]
    NothingToTake(i64),
    #[error("❌ User {0} is an admin, not a client.")]
    ClientIsAdmin(i64),
    #[error("❌ Client {0} is already being handled by another admin.")]
    AlreadyTaken(i64),
    #[error("❌ You are already talking to an admin. Use /close to end that dialogue first.")]
    AlreadyAssigned,
    #[error("⏳ Admin #{0} is busy with another dialogue. Try another admin or just send your message and the first free admin will answer.")]
    TargetBusy(String),
    #[error("⚫ Admin #{0} is away right now. Try another admin or wait a little.")]
    TargetAway(String),
    #[error("❌ No admin with tag #{0}. Use /admins to see the list.")]
    UnknownTag(String),
    #[error("❌ You cannot transfer a dialogue to yourself.")]
    SelfTransfer,
    #[error("❌ Dialogue {0} not found.")]
    DialogueNotFound(i64),
    #[error("❌ Message is too long ({0} characters, the limit is {1}).")]
    MessageTooLong(usize, usize),
    #[error("❌ Could not process the password, please try again later.")]
    PasswordHash,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type DeskResult<T> = Result<T, DeskError>;
