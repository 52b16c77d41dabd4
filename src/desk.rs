//! Transport-independent support desk: command dispatch, dialogue routing
//! and admin roles. The chat layer feeds it [`Inbound`] events and delivers
//! the [`Outgoing`] messages it returns.

use crate::store::{Admin, Store, StoreError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

mod command;
mod error;
mod passwords;
mod reports;
mod roles;
mod router;
mod sessions;

#[cfg(test)]
mod tests;

use command::{Access, Command, CommandKind, Invocation};
use error::{DeskError, DeskResult};
pub use passwords::OneTimePasswords;
use passwords::Redemption;

pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const ROOT_ADMIN_TAG: &str = "admin";

#[derive(Debug, Clone)]
pub struct Sender {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Inbound {
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    User(i64),
    AdminChat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub target: Target,
    pub text: String,
}

impl Outgoing {
    pub fn to_user(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            target: Target::User(user_id),
            text: text.into(),
        }
    }

    pub fn to_admin_chat(text: impl Into<String>) -> Self {
        Self {
            target: Target::AdminChat,
            text: text.into(),
        }
    }
}

pub struct SupportDesk {
    store: Arc<Store>,
    passwords: Arc<OneTimePasswords>,
    master_password: Option<String>,
    turn: Mutex<()>,
}

impl SupportDesk {
    pub fn new(
        store: Arc<Store>,
        passwords: Arc<OneTimePasswords>,
        master_password: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            passwords,
            master_password: master_password.filter(|p| !p.is_empty()),
            turn: Mutex::new(()),
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Handles one inbound message. Events are processed one at a time.
    ///
    /// Rejections become a reply to the sender; storage failures are
    /// returned so the caller can report them.
    pub async fn handle(&self, inbound: &Inbound) -> Result<Vec<Outgoing>, StoreError> {
        let _turn = self.turn.lock().await;

        let text = inbound.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let sender = &inbound.sender;
        let result = match Invocation::split(text) {
            Some(invocation) => self.dispatch(sender, &invocation).await,
            None => self.route(sender, text).await,
        };

        match result {
            Ok(outgoing) => Ok(outgoing),
            Err(DeskError::Storage(e)) => Err(e),
            Err(rejection) => {
                if matches!(
                    rejection,
                    DeskError::BadPassword | DeskError::ExpiredPassword
                ) {
                    warn!(
                        "Rejected password from {} ({}): {}",
                        sender.name, sender.id, rejection
                    );
                } else {
                    info!("Rejected {} ({}): {}", sender.name, sender.id, rejection);
                }
                Ok(vec![Outgoing::to_user(sender.id, rejection.to_string())])
            }
        }
    }

    async fn dispatch(
        &self,
        sender: &Sender,
        invocation: &Invocation<'_>,
    ) -> DeskResult<Vec<Outgoing>> {
        let kind: CommandKind = invocation
            .name
            .parse()
            .map_err(|_| DeskError::UnknownCommand(invocation.name.clone()))?;

        let caller = self.store.find_admin(sender.id).await?;
        kind.access().check(caller.as_ref())?;
        let command = Command::parse(kind, invocation)?;

        info!("{} ({}) invoked /{}", sender.name, sender.id, kind.name());

        match command {
            Command::Start => Ok(self.start(sender)),
            Command::Help => Ok(self.help(sender, caller.as_ref())),
            Command::Admins => self.list_admins(sender).await,
            Command::SetTag { password, tag } => {
                self.set_tag(sender, caller, &password, &tag).await
            }
            Command::Close => self.close(sender, caller.as_ref()).await,
            Command::Admin => self.panel(sender, admin_of(caller)?).await,
            Command::Take { client_id } => self.take(admin_of(caller)?, client_id).await,
            Command::Transfer { admin_id } => self.transfer(admin_of(caller)?, admin_id).await,
            Command::ToggleStatus => self.toggle_status(admin_of(caller)?).await,
            Command::Stats => self.stats(admin_of(caller)?).await,
            Command::History { dialogue_id } => self.history(admin_of(caller)?, dialogue_id).await,
            Command::SetLevel { user_id, level } => {
                self.set_level(admin_of(caller)?, user_id, level).await
            }
            Command::Monitor => self.monitor(admin_of(caller)?).await,
            Command::Password => self.issue_password(admin_of(caller)?).await,
            Command::Broadcast { text } => self.broadcast(admin_of(caller)?, &text).await,
            Command::Feedback { text } => self.feedback(sender, &text),
        }
    }
}

fn admin_of(caller: Option<Admin>) -> DeskResult<Admin> {
    caller.ok_or(DeskError::InsufficientPrivilege("admins only"))
}
