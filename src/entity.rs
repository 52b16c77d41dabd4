pub mod admins;
pub mod dialogues;
pub mod messages;
