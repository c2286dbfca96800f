//! Agent configuration.
//!
//! The TOML file is read into [`RawConfig`], which tolerates the loose forms
//! the options have always accepted (`true` or `"true"`, `2` or `"2"`), and
//! is then validated once into an [`AgentConfig`]. Every problem is reported
//! together, before any network call.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::oauth::DEFAULT_TOKEN_URL;
use crate::auth::token_store::{ACCESS_TOKEN, CLIENT_SECRET, CredentialStore, REFRESH_TOKEN};
use crate::domain::{Action, OutgoingMail, UnknownAction};
use crate::error::{Error, Result};
use crate::mail::graph_client::DEFAULT_API_BASE;
use crate::mail::snapshot::DEFAULT_PAGE_SIZE;

const APP_DIR: &str = "outlook_agent";
const CLIENT_SECRET_ENV: &str = "OUTLOOK_CLIENT_SECRET";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECEIVE_PERIOD_DAYS: u32 = 2;
const MAX_PAGE_SIZE: u32 = 1000;

const TEMPLATE: &str = r#"# outlook_agent configuration

client_id = "YOUR_APP_CLIENT_ID"
# client_secret may also live in the keyring (outlook_client_secret)
# or in the OUTLOOK_CLIENT_SECRET environment variable.
client_secret = ""
# Seeds only: renewed tokens are kept in the keyring and win over these.
access_token = ""
refresh_token = ""

folder = "inbox"
type = "get_new_emails"   # or "send_email"

debug = false
raw_email = false
emit_events = true
expected_receive_period_in_days = 2

# page_size = 20
# timeout_secs = 30
# sink = "stdout"         # "desktop", or a file path for JSON lines
# state_db = "/var/lib/outlook_agent/state.db"

# [send_email]
# to = ["someone@example.com"]
# subject = "Hello"
# content = "<b>Hi</b>"
# content_type = "HTML"
# importance = "Low"
"#;

/// A boolean that may arrive as `true` or as `"true"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn boolify(&self) -> Option<bool> {
        match self {
            Flag::Bool(b) => Some(*b),
            Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

/// An integer that may arrive as `2` or as `"2"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(*n),
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSendEmail {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub importance: Option<String>,
}

/// The configuration file as written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub folder: Option<String>,
    pub debug: Option<Flag>,
    pub raw_email: Option<Flag>,
    pub emit_events: Option<Flag>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub expected_receive_period_in_days: Option<Number>,
    pub page_size: Option<Number>,
    pub timeout_secs: Option<Number>,
    pub api_base: Option<String>,
    pub token_url: Option<String>,
    pub state_db: Option<PathBuf>,
    pub sink: Option<String>,
    pub send_email: Option<RawSendEmail>,
}

/// Where events go.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkKind {
    Stdout,
    Desktop,
    File(PathBuf),
}

impl SinkKind {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "stdout" => SinkKind::Stdout,
            "desktop" => SinkKind::Desktop,
            path => SinkKind::File(PathBuf::from(path)),
        }
    }
}

/// Validated configuration for one trigger.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub folder: String,
    pub debug: bool,
    pub raw_email: bool,
    pub emit_events: bool,
    /// The `type` option. Unknown values are kept so the dispatcher can
    /// report them at trigger time.
    pub action: std::result::Result<Action, UnknownAction>,
    pub expected_receive_period_in_days: u32,
    pub page_size: u32,
    pub timeout: Duration,
    pub api_base: String,
    pub token_url: String,
    pub state_db: PathBuf,
    pub sink: SinkKind,
    pub send_email: Option<OutgoingMail>,
}

impl AgentConfig {
    /// Non-fatal findings worth showing to whoever edits the file.
    pub fn warnings(&self) -> Vec<String> {
        match &self.action {
            Ok(_) => Vec::new(),
            Err(e) => vec![format!(
                "{e}: should be 'get_new_emails' or 'send_email'"
            )],
        }
    }
}

impl RawConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Configuration(vec![e.to_string()]))
    }

    /// Validate every option and fill secrets from `creds`.
    ///
    /// Renewed tokens live in the credential store, so stored access and
    /// refresh tokens take precedence over the seeds in the file. The client
    /// secret comes from the file first, then the store, then the environment.
    /// A store that cannot be read fails resolution; the file seeds are only
    /// used when the store has no entry.
    pub fn resolve(self, creds: &dyn CredentialStore) -> Result<AgentConfig> {
        let mut errors = Vec::new();

        let client_id = present(self.client_id);
        let client_secret = match present(self.client_secret) {
            Some(secret) => Some(secret),
            None => lookup(creds, CLIENT_SECRET)?
                .or_else(|| present(std::env::var(CLIENT_SECRET_ENV).ok())),
        };
        let access_token = lookup(creds, ACCESS_TOKEN)?.or_else(|| present(self.access_token));
        let refresh_token = lookup(creds, REFRESH_TOKEN)?.or_else(|| present(self.refresh_token));
        let folder = present(self.folder);

        for (value, name) in [
            (&client_id, "client_id"),
            (&client_secret, "client_secret"),
            (&folder, "folder"),
            (&access_token, "access_token"),
            (&refresh_token, "refresh_token"),
        ] {
            if value.is_none() {
                errors.push(format!("{name} is a required field"));
            }
        }

        let debug = flag(self.debug, "debug", false, &mut errors);
        let raw_email = flag(self.raw_email, "raw_email", false, &mut errors);
        let emit_events = flag(self.emit_events, "emit_events", true, &mut errors);

        let action = self
            .kind
            .as_deref()
            .unwrap_or_default()
            .parse::<Action>();

        let expected_receive_period_in_days = match self.expected_receive_period_in_days {
            None => DEFAULT_RECEIVE_PERIOD_DAYS,
            Some(n) => match n.to_i64() {
                Some(days) if days > 0 && days <= u32::MAX as i64 => days as u32,
                _ => {
                    errors.push(
                        "Please provide 'expected_receive_period_in_days' to indicate how many days can pass before this Agent is considered to be not working"
                            .to_string(),
                    );
                    0
                }
            },
        };

        let page_size = match self.page_size.as_ref().map(Number::to_i64) {
            None => DEFAULT_PAGE_SIZE,
            Some(Some(n)) if (1..=MAX_PAGE_SIZE as i64).contains(&n) => n as u32,
            Some(_) => {
                errors.push(format!("page_size must be between 1 and {MAX_PAGE_SIZE}"));
                DEFAULT_PAGE_SIZE
            }
        };

        let timeout_secs = match self.timeout_secs.as_ref().map(Number::to_i64) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(Some(n)) if n > 0 => n as u64,
            Some(_) => {
                errors.push("timeout_secs must be a positive integer".to_string());
                DEFAULT_TIMEOUT_SECS
            }
        };

        let api_base = url_option(self.api_base, DEFAULT_API_BASE, "api_base", &mut errors);
        let token_url = url_option(self.token_url, DEFAULT_TOKEN_URL, "token_url", &mut errors);

        let state_db = match self.state_db {
            Some(p) => Some(p),
            None => default_state_path(),
        };
        if state_db.is_none() {
            errors.push("state_db is not set and no config directory is available".to_string());
        }

        let send_email = self.send_email.map(outgoing_mail);
        if action == Ok(Action::SendEmail)
            && send_email.as_ref().is_none_or(|m| m.to.is_empty())
        {
            errors.push(
                "send_email.to needs at least one recipient when type is send_email".to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(Error::Configuration(errors));
        }

        // All required values were checked above.
        let required = |v: Option<String>| v.unwrap_or_default();
        Ok(AgentConfig {
            client_id: required(client_id),
            client_secret: required(client_secret),
            access_token: required(access_token),
            refresh_token: required(refresh_token),
            folder: required(folder),
            debug,
            raw_email,
            emit_events,
            action,
            expected_receive_period_in_days,
            page_size,
            timeout: Duration::from_secs(timeout_secs),
            api_base,
            token_url,
            state_db: state_db.unwrap_or_default(),
            sink: SinkKind::parse(self.sink.as_deref().unwrap_or_default()),
            send_email,
        })
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn lookup(creds: &dyn CredentialStore, name: &str) -> Result<Option<String>> {
    let value = creds
        .get(name)
        .map_err(|e| Error::Credential(format!("could not read {name}: {e}")))?;
    Ok(present(value))
}

fn flag(v: Option<Flag>, name: &str, default: bool, errors: &mut Vec<String>) -> bool {
    match v {
        None => default,
        Some(f) => f.boolify().unwrap_or_else(|| {
            errors.push(format!("if provided, {name} must be true or false"));
            default
        }),
    }
}

fn url_option(v: Option<String>, default: &str, name: &str, errors: &mut Vec<String>) -> String {
    let value = present(v).unwrap_or_else(|| default.to_string());
    if let Err(e) = url::Url::parse(&value) {
        errors.push(format!("{name} is not a valid URL ({e})"));
    }
    value
}

fn outgoing_mail(raw: RawSendEmail) -> OutgoingMail {
    OutgoingMail {
        subject: raw.subject.unwrap_or_default(),
        importance: raw.importance.unwrap_or_else(|| "Low".to_string()),
        content_type: raw.content_type.unwrap_or_else(|| "HTML".to_string()),
        content: raw.content.unwrap_or_default(),
        to: raw.to,
        cc: raw.cc,
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

pub fn default_config_path() -> Result<PathBuf> {
    config_dir()
        .map(|p| p.join("config.toml"))
        .ok_or_else(|| Error::Configuration(vec!["no config dir available".to_string()]))
}

pub fn default_state_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("state.db"))
}

/// Read the raw configuration at `path`. A missing file is replaced by a
/// template and reported as a configuration error.
pub fn load_config(path: &Path) -> Result<RawConfig> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, TEMPLATE)?;
        return Err(Error::Configuration(vec![format!(
            "Created template config at {}; edit it and run again",
            path.display()
        )]));
    }
    let s = fs::read_to_string(path)?;
    RawConfig::from_toml_str(&s)
}
