use super::*;
use crate::store::{AccessLevel, DialogueStatus, NewAdmin};
use chrono::{TimeDelta, Utc};
use tempfile::TempDir;

const MASTER: &str = "letmein";
const CLIENT: i64 = 100;
const OTHER_CLIENT: i64 = 101;
const BASIC: i64 = 7;
const SECOND: i64 = 8;
const ROOT: i64 = 1;

struct Harness {
    _dir: TempDir,
    desk: Arc<SupportDesk>,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let passwords = Arc::new(OneTimePasswords::new(TimeDelta::hours(24)));
        let desk = SupportDesk::new(store, passwords, Some(MASTER.to_string()));
        desk.seed_root_admin(ROOT).await.unwrap();
        Self { _dir: dir, desk }
    }

    /// Root admin plus two tier 1 admins, `ops` and `night`.
    async fn staffed() -> Self {
        let h = Self::new().await;
        h.send(BASIC, &format!("/set_tag {} ops", MASTER)).await;
        h.send(SECOND, &format!("/set_tag {} night", MASTER)).await;
        h
    }

    async fn send(&self, user_id: i64, text: &str) -> Vec<Outgoing> {
        self.desk
            .handle(&Inbound {
                sender: Sender {
                    id: user_id,
                    name: format!("user{}", user_id),
                },
                text: text.to_string(),
            })
            .await
            .unwrap()
    }

    fn store(&self) -> &Store {
        self.desk.store()
    }
}

fn texts_for(outgoing: &[Outgoing], target: Target) -> Vec<&str> {
    outgoing
        .iter()
        .filter(|o| o.target == target)
        .map(|o| o.text.as_str())
        .collect()
}

fn single_reply(outgoing: &[Outgoing], user_id: i64) -> &str {
    let replies = texts_for(outgoing, Target::User(user_id));
    assert_eq!(replies.len(), 1, "expected one reply in {outgoing:?}");
    replies[0]
}

#[tokio::test]
async fn root_admin_is_seeded_at_tier_two() {
    let h = Harness::new().await;
    let root = h.store().find_admin(ROOT).await.unwrap().unwrap();
    assert_eq!(root.tag, ROOT_ADMIN_TAG);
    assert!(root.is_elevated());

    h.desk.seed_root_admin(ROOT).await.unwrap();
    assert_eq!(h.store().list_admins().await.unwrap().len(), 1);
}

#[tokio::test]
async fn seeding_raises_an_existing_tier_one_admin() {
    let h = Harness::staffed().await;
    h.desk.seed_root_admin(BASIC).await.unwrap();
    let admin = h.store().find_admin(BASIC).await.unwrap().unwrap();
    assert!(admin.is_elevated());
    assert_eq!(admin.tag, "ops");
}

#[tokio::test]
async fn first_message_opens_one_dialogue_and_alerts_admin_chat() {
    let h = Harness::new().await;

    let out = h.send(CLIENT, "my order is late").await;
    let alerts = texts_for(&out, Target::AdminChat);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("/take 100"));
    assert!(single_reply(&out, CLIENT).contains("received"));

    let out = h.send(CLIENT, "any news?").await;
    assert_eq!(texts_for(&out, Target::AdminChat).len(), 1);
    assert!(texts_for(&out, Target::User(CLIENT)).is_empty());

    let dialogues = h.store().dialogues_for_client(CLIENT).await.unwrap();
    assert_eq!(dialogues.len(), 1);
    let history = h.store().history(dialogues[0].id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.timestamp >= dialogues[0].start_time));
}

#[tokio::test]
async fn blank_messages_are_ignored() {
    let h = Harness::new().await;
    assert!(h.send(CLIENT, "   ").await.is_empty());
    assert!(h.store().dialogues_for_client(CLIENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlong_messages_are_rejected() {
    let h = Harness::new().await;
    let out = h.send(CLIENT, &"a".repeat(MAX_MESSAGE_LENGTH + 1)).await;
    assert!(single_reply(&out, CLIENT).contains("too long"));
    assert!(h.store().dialogues_for_client(CLIENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn take_then_relay_both_ways() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;

    let out = h.send(BASIC, "/take 100").await;
    assert!(single_reply(&out, BASIC).contains("client 100"));
    assert!(single_reply(&out, CLIENT).contains("#ops"));

    let out = h.send(CLIENT, "still there?").await;
    assert!(texts_for(&out, Target::AdminChat).is_empty());
    assert!(single_reply(&out, BASIC).ends_with("still there?"));

    let out = h.send(BASIC, "yes, checking").await;
    assert_eq!(single_reply(&out, CLIENT), "💬 #ops:\nyes, checking");

    let dialogue = h.store().live_dialogue_for_client(CLIENT).await.unwrap().unwrap();
    assert_eq!(dialogue.status, DialogueStatus::Assigned);
    assert_eq!(dialogue.admin_id, Some(BASIC));
    assert_eq!(h.store().history(dialogue.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn take_rejects_busy_admin_and_taken_client() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(OTHER_CLIENT, "hi").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(BASIC, "/take 101").await;
    assert!(single_reply(&out, BASIC).contains("already handling"));

    let out = h.send(SECOND, "/take 100").await;
    assert!(single_reply(&out, SECOND).contains("already being handled"));

    let out = h.send(SECOND, "/take 555").await;
    assert!(single_reply(&out, SECOND).contains("no dialogue waiting"));
}

#[tokio::test]
async fn admin_without_dialogue_cannot_send() {
    let h = Harness::staffed().await;
    let out = h.send(BASIC, "hello?").await;
    assert!(single_reply(&out, BASIC).contains("no active dialogue"));
}

#[tokio::test]
async fn closing_starts_a_fresh_dialogue_next_time() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(BASIC, "/close").await;
    assert!(single_reply(&out, CLIENT).contains("closed"));
    assert!(
        h.store()
            .assigned_dialogue_for_admin(BASIC)
            .await
            .unwrap()
            .is_none()
    );

    h.send(CLIENT, "one more thing").await;
    let dialogues = h.store().dialogues_for_client(CLIENT).await.unwrap();
    assert_eq!(dialogues.len(), 2);
    assert_eq!(dialogues[0].status, DialogueStatus::Closed);
    assert_eq!(dialogues[1].status, DialogueStatus::Open);
}

#[tokio::test]
async fn client_can_close_and_admin_is_told() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(CLIENT, "/close").await;
    assert!(single_reply(&out, BASIC).contains("closed the dialogue"));

    let out = h.send(CLIENT, "/close").await;
    assert!(single_reply(&out, CLIENT).contains("no active dialogue"));
}

#[tokio::test]
async fn client_selects_admin_by_tag() {
    let h = Harness::staffed().await;

    let out = h.send(CLIENT, "#OPS").await;
    assert!(single_reply(&out, CLIENT).contains("#ops"));
    assert!(single_reply(&out, BASIC).contains("picked you"));

    let out = h.send(CLIENT, "#night").await;
    assert!(single_reply(&out, CLIENT).contains("already talking"));

    let out = h.send(OTHER_CLIENT, "#ops").await;
    assert!(single_reply(&out, OTHER_CLIENT).contains("busy"));

    let out = h.send(OTHER_CLIENT, "#nobody").await;
    assert!(single_reply(&out, OTHER_CLIENT).contains("No admin with tag"));
}

#[tokio::test]
async fn away_admins_cannot_be_selected() {
    let h = Harness::staffed().await;
    let out = h.send(SECOND, "/toggle_status").await;
    assert!(single_reply(&out, SECOND).contains("away"));

    let out = h.send(CLIENT, "#night").await;
    assert!(single_reply(&out, CLIENT).contains("away"));

    let out = h.send(CLIENT, "/admins").await;
    let listing = single_reply(&out, CLIENT);
    assert!(listing.contains("⚫ away #night"));
    assert!(listing.contains("🟢 available #ops"));
}

#[tokio::test]
async fn transfer_moves_the_client() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(BASIC, "/transfer 8").await;
    assert_eq!(out.len(), 3);
    assert!(single_reply(&out, CLIENT).contains("#night"));

    let dialogue = h.store().live_dialogue_for_client(CLIENT).await.unwrap().unwrap();
    assert_eq!(dialogue.admin_id, Some(SECOND));

    let out = h.send(CLIENT, "hi again").await;
    assert!(single_reply(&out, SECOND).ends_with("hi again"));
}

#[tokio::test]
async fn transfer_rejections() {
    let h = Harness::staffed().await;

    let out = h.send(BASIC, "/transfer 8").await;
    assert!(single_reply(&out, BASIC).contains("no active dialogue"));

    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(BASIC, "/transfer 7").await;
    assert!(single_reply(&out, BASIC).contains("yourself"));

    let out = h.send(BASIC, "/transfer 999").await;
    assert!(single_reply(&out, BASIC).contains("not an admin"));

    h.send(OTHER_CLIENT, "hi").await;
    h.send(SECOND, "/take 101").await;
    let out = h.send(BASIC, "/transfer 8").await;
    assert!(single_reply(&out, BASIC).contains("busy"));
}

#[tokio::test]
async fn set_tag_accepts_master_and_one_time_passwords() {
    let h = Harness::new().await;

    let out = h.send(BASIC, "/set_tag wrong ops").await;
    assert!(single_reply(&out, BASIC).contains("Wrong password"));
    assert!(h.store().find_admin(BASIC).await.unwrap().is_none());

    let out = h.send(ROOT, "/password").await;
    let reply = single_reply(&out, ROOT);
    let otp = reply
        .split('`')
        .nth(1)
        .expect("password is quoted in the reply")
        .to_string();
    assert_eq!(otp.len(), 8);

    let out = h.send(BASIC, &format!("/set_tag {} ops", otp)).await;
    assert!(single_reply(&out, BASIC).contains("#ops"));
    let admin = h.store().find_admin(BASIC).await.unwrap().unwrap();
    assert_eq!(admin.level, AccessLevel::Basic);

    let out = h.send(SECOND, &format!("/set_tag {} night", otp)).await;
    assert!(single_reply(&out, SECOND).contains("Wrong password"));
}

#[tokio::test]
async fn expired_one_time_password_is_refused() {
    let h = Harness::new().await;
    let otp = h
        .desk
        .passwords
        .issue(Utc::now() - TimeDelta::hours(25))
        .await;

    let out = h.send(BASIC, &format!("/set_tag {} ops", otp)).await;
    assert!(single_reply(&out, BASIC).contains("expired"));
    assert!(h.store().find_admin(BASIC).await.unwrap().is_none());
}

#[tokio::test]
async fn admins_retag_with_their_own_password() {
    let h = Harness::new().await;
    let otp = h.desk.passwords.issue(Utc::now()).await;
    h.send(BASIC, &format!("/set_tag {} ops", otp)).await;

    let out = h.send(BASIC, &format!("/set_tag {} lead", otp)).await;
    assert!(single_reply(&out, BASIC).contains("#lead"));
    let admin = h.store().find_admin(BASIC).await.unwrap().unwrap();
    assert_eq!(admin.tag, "lead");
    assert_eq!(h.store().list_admins().await.unwrap().len(), 2);
}

#[tokio::test]
async fn tags_are_unique_regardless_of_case() {
    let h = Harness::staffed().await;
    let out = h.send(CLIENT, &format!("/set_tag {} OPS", MASTER)).await;
    assert!(single_reply(&out, CLIENT).contains("already taken"));

    let out = h.send(CLIENT, &format!("/set_tag {} bad!tag", MASTER)).await;
    assert!(single_reply(&out, CLIENT).contains("Invalid tag"));
}

#[tokio::test]
async fn only_tier_two_changes_levels() {
    let h = Harness::staffed().await;

    let out = h.send(BASIC, "/set_level 8 2").await;
    assert!(single_reply(&out, BASIC).contains("Insufficient privilege"));
    assert!(!h.store().find_admin(SECOND).await.unwrap().unwrap().is_elevated());

    let out = h.send(ROOT, "/set_level 8 2").await;
    assert!(single_reply(&out, SECOND).contains("tier 2"));
    assert!(h.store().find_admin(SECOND).await.unwrap().unwrap().is_elevated());

    let out = h.send(ROOT, "/set_level 1 1").await;
    assert!(single_reply(&out, ROOT).contains("your own level"));

    let out = h.send(ROOT, "/set_level 555 2").await;
    assert!(single_reply(&out, ROOT).contains("not an admin"));
}

#[tokio::test]
async fn clients_cannot_use_admin_commands() {
    let h = Harness::new().await;
    for command in ["/take 1", "/stats", "/monitor", "/broadcast hi"] {
        let out = h.send(CLIENT, command).await;
        assert!(
            single_reply(&out, CLIENT).contains("Insufficient privilege"),
            "{command}"
        );
    }
}

#[tokio::test]
async fn unknown_and_malformed_commands_are_explained() {
    let h = Harness::new().await;

    let out = h.send(CLIENT, "/promote me").await;
    assert!(single_reply(&out, CLIENT).contains("Unknown command /promote"));

    let out = h.send(ROOT, "/set_level abc").await;
    assert!(single_reply(&out, ROOT).contains("/set_level <user_id>"));
}

#[tokio::test]
async fn help_lists_only_permitted_commands() {
    let h = Harness::staffed().await;

    let out = h.send(CLIENT, "/help").await;
    let client_help = single_reply(&out, CLIENT);
    assert!(client_help.contains("/admins"));
    assert!(!client_help.contains("/take"));

    let out = h.send(BASIC, "/help").await;
    let basic_help = single_reply(&out, BASIC);
    assert!(basic_help.contains("/take"));
    assert!(!basic_help.contains("/broadcast"));

    let out = h.send(ROOT, "/help").await;
    assert!(single_reply(&out, ROOT).contains("/broadcast"));
}

#[tokio::test]
async fn history_is_limited_for_tier_one() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;
    h.send(BASIC, "hi there").await;
    let dialogue = h.store().live_dialogue_for_client(CLIENT).await.unwrap().unwrap();

    let out = h.send(BASIC, &format!("/history {}", dialogue.id)).await;
    let transcript = single_reply(&out, BASIC);
    assert!(transcript.contains("client: hello"));
    assert!(transcript.contains("#ops: hi there"));

    let out = h.send(SECOND, &format!("/history {}", dialogue.id)).await;
    assert!(single_reply(&out, SECOND).contains("Insufficient privilege"));

    let out = h.send(ROOT, &format!("/history {}", dialogue.id)).await;
    assert!(single_reply(&out, ROOT).contains("client: hello"));

    let out = h.send(ROOT, "/history 999").await;
    assert!(single_reply(&out, ROOT).contains("not found"));
}

#[tokio::test]
async fn monitor_shows_assigned_dialogues() {
    let h = Harness::staffed().await;

    let out = h.send(ROOT, "/monitor").await;
    assert!(single_reply(&out, ROOT).contains("no active dialogues"));

    for text in ["first", "second", "third", "fourth"] {
        h.send(CLIENT, text).await;
    }
    h.send(BASIC, "/take 100").await;

    let out = h.send(ROOT, "/monitor").await;
    let report = single_reply(&out, ROOT);
    assert!(report.contains("#ops"));
    assert!(report.contains("fourth"));
    assert!(report.contains("second"));
    assert!(!report.contains("first"));
}

#[tokio::test]
async fn stats_and_panel_reflect_activity() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(BASIC, "/stats").await;
    let stats = single_reply(&out, BASIC);
    assert!(stats.contains("0 waiting, 1 assigned, 0 closed"));
    assert!(stats.contains("#ops: 1 dialogues, 1 active, 0 closed"));

    let out = h.send(BASIC, "/admin").await;
    let panel = single_reply(&out, BASIC);
    assert!(panel.contains("client 100"));
    assert!(panel.contains("/take"));
}

#[tokio::test]
async fn broadcast_reaches_clients_only() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "hello").await;
    h.send(OTHER_CLIENT, "hi").await;

    let out = h.send(ROOT, "/broadcast Maintenance at 9").await;
    assert_eq!(out.len(), 3);
    assert_eq!(
        single_reply(&out, CLIENT),
        "📢 Announcement:\n\nMaintenance at 9"
    );
    assert!(single_reply(&out, OTHER_CLIENT).contains("Maintenance at 9"));
    assert!(single_reply(&out, ROOT).contains("2 clients"));
}

#[tokio::test]
async fn one_live_dialogue_per_client_under_concurrency() {
    let h = Harness::new().await;
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let desk = Arc::clone(&h.desk);
            tokio::spawn(async move {
                desk.handle(&Inbound {
                    sender: Sender {
                        id: CLIENT,
                        name: "racer".into(),
                    },
                    text: format!("message {}", i),
                })
                .await
                .unwrap()
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let dialogues = h.store().dialogues_for_client(CLIENT).await.unwrap();
    assert_eq!(dialogues.len(), 1);
    assert_eq!(h.store().history(dialogues[0].id).await.unwrap().len(), 8);
}

#[tokio::test]
async fn root_admin_without_master_password_cannot_retag_by_password() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).await.unwrap();
    store
        .insert_admin(NewAdmin {
            user_id: BASIC,
            tag: "ops".into(),
            level: AccessLevel::Basic,
            password_hash: passwords::NO_PASSWORD.into(),
        })
        .await
        .unwrap();
    let desk = SupportDesk::new(
        store,
        Arc::new(OneTimePasswords::new(TimeDelta::hours(24))),
        Some(String::new()),
    );

    let out = desk
        .handle(&Inbound {
            sender: Sender {
                id: BASIC,
                name: "ops".into(),
            },
            text: "/set_tag ! lead".into(),
        })
        .await
        .unwrap();
    assert!(single_reply(&out, BASIC).contains("Wrong password"));
}

#[tokio::test]
async fn registering_as_admin_closes_own_client_dialogue() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "help me").await;
    h.send(BASIC, "/take 100").await;

    let out = h.send(CLIENT, &format!("/set_tag {} newbie", MASTER)).await;
    assert!(single_reply(&out, CLIENT).contains("#newbie"));
    assert!(single_reply(&out, BASIC).contains("became an admin"));
    assert!(h.store().live_dialogue_for_client(CLIENT).await.unwrap().is_none());
    assert!(
        h.store()
            .assigned_dialogue_for_admin(BASIC)
            .await
            .unwrap()
            .is_none()
    );

    let out = h.send(SECOND, "/take 100").await;
    assert!(single_reply(&out, SECOND).contains("is an admin"));
}

#[tokio::test]
async fn registering_with_a_waiting_dialogue_closes_it_quietly() {
    let h = Harness::new().await;
    h.send(CLIENT, "help me").await;

    let out = h.send(CLIENT, &format!("/set_tag {} newbie", MASTER)).await;
    assert_eq!(out.len(), 1);
    let dialogues = h.store().dialogues_for_client(CLIENT).await.unwrap();
    assert_eq!(dialogues[0].status, DialogueStatus::Closed);
}

#[tokio::test]
async fn reselecting_own_admin_reports_already_assigned() {
    let h = Harness::staffed().await;
    h.send(CLIENT, "#ops").await;

    let out = h.send(CLIENT, "#ops").await;
    assert!(single_reply(&out, CLIENT).contains("already talking"));
}

#[tokio::test]
async fn feedback_is_forwarded_to_admin_chat() {
    let h = Harness::new().await;

    let out = h.send(CLIENT, "/feedback quick and helpful").await;
    let forwarded = texts_for(&out, Target::AdminChat);
    assert_eq!(forwarded.len(), 1);
    assert!(forwarded[0].contains("user100 (100)"));
    assert!(forwarded[0].ends_with("quick and helpful"));
    assert!(single_reply(&out, CLIENT).contains("Thank you"));
    assert!(h.store().dialogues_for_client(CLIENT).await.unwrap().is_empty());

    let out = h.send(CLIENT, "/feedback").await;
    assert!(single_reply(&out, CLIENT).contains("/feedback <text>"));

    let out = h.send(CLIENT, "/help").await;
    assert!(single_reply(&out, CLIENT).contains("/feedback"));
}

#[tokio::test]
async fn storage_failures_are_returned_not_replied() {
    let h = Harness::new().await;
    std::fs::remove_dir_all(h._dir.path()).unwrap();

    let result = h
        .desk
        .handle(&Inbound {
            sender: Sender {
                id: CLIENT,
                name: "client".into(),
            },
            text: "is anyone there?".into(),
        })
        .await;
    assert!(matches!(result, Err(StoreError::Db(_))), "{result:?}");
}
