use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    discord: DiscordConfig,
    admin: AdminConfig,
    storage: StorageConfig,
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct DiscordConfig {
    token: String,
    admin_chat_id: u64,
    level2_admin_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AdminConfig {
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StorageConfig {
    data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "support_bot.log".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Channel that receives new-dialogue announcements. 0 disables them.
    pub admin_chat_id: u64,
    /// User seeded as a tier 2 admin on startup. 0 disables seeding.
    pub level2_admin_id: i64,
    pub admin_password: Option<String>,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::resolve(path, |key| std::env::var(key).ok())
    }

    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_file(Path::new(CONFIG_FILE))
    }

    /// Reads `path` when it exists, then applies environment overrides.
    fn resolve(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            ConfigFile::default()
        };

        Self::apply_overrides(file, env)
    }

    fn apply_overrides(mut file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(token) = env("BOT_TOKEN") {
            file.discord.token = token;
        }
        if let Some(id) = numeric(&env, "ADMIN_CHAT_ID")? {
            file.discord.admin_chat_id = id;
        }
        if let Some(id) = numeric(&env, "LEVEL2_ADMIN_ID")? {
            file.discord.level2_admin_id = id;
        }
        if let Some(password) = env("ADMIN_PASSWORD") {
            file.admin.password = password;
        }
        if let Some(dir) = env("DATA_DIR") {
            file.storage.data_dir = dir;
        }
        if let Some(log) = env("LOG_FILE") {
            file.logging.file = log;
        }

        let token = file.discord.token.trim();
        if token.is_empty() {
            bail!("Bot token is missing: set discord.token in {CONFIG_FILE} or BOT_TOKEN");
        }

        let level2_admin_id = i64::try_from(file.discord.level2_admin_id).with_context(|| {
            format!(
                "LEVEL2_ADMIN_ID {} is out of range",
                file.discord.level2_admin_id
            )
        })?;

        let password = file.admin.password.trim();
        Ok(Self {
            discord_token: token.to_string(),
            admin_chat_id: file.discord.admin_chat_id,
            level2_admin_id,
            admin_password: (!password.is_empty()).then(|| password.to_string()),
            data_dir: file.storage.data_dir.into(),
            log_file: file.logging.file.into(),
        })
    }
}

fn numeric(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{key} must be a number, got {raw:?}"))
        })
        .transpose()
}
