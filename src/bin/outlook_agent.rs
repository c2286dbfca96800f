use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use outlook_agent::{Agent, TriggerReport};
use outlook_agent::auth::oauth::OAuthTokenEndpoint;
use outlook_agent::auth::token_manager::unix_now;
use outlook_agent::auth::token_store::{CredentialStore, KeyringStore, MemoryCredentials};
use outlook_agent::config::{AgentConfig, SinkKind, default_config_path, load_config};
use outlook_agent::events::{DesktopNotifier, EventSink, JsonLinesSink};
use outlook_agent::health::{self, Health};
use outlook_agent::mail::GraphClient;
use outlook_agent::store::{AgentMemory, SqliteStateStore, StateStore};

#[derive(Parser)]
#[command(name = "outlook_agent")]
#[command(about = "Outlook mailbox agent (one trigger per invocation)", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/outlook_agent/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the configured action once (call this from cron or a timer)
    Run {
        /// Print events instead of publishing them; keep state and keyring untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the configuration without touching the network
    Validate,

    /// Exit 0 if events were produced recently and no error followed
    Status,

    /// Store a named secret (e.g. outlook_client_secret) in the keyring
    SetCredential {
        #[arg(long)]
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config_path = match cli.config {
        Some(p) => p,
        None => default_config_path()?,
    };

    match cli.cmd {
        Command::SetCredential { name } => {
            eprintln!("Paste value for {name} (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            KeyringStore.set(&name, secret.trim())?;
            println!("Saved {name} into keyring");
            Ok(())
        }

        Command::Validate => {
            let cfg = resolve_config(&config_path, &KeyringStore)?;
            for w in cfg.warnings() {
                warn!("{w}");
            }
            println!("Configuration OK: {}", config_path.display());
            Ok(())
        }

        Command::Status => {
            let cfg = resolve_config(&config_path, &KeyringStore)?;
            let state = SqliteStateStore::open(&cfg.state_db)
                .with_context(|| format!("opening state db {}", cfg.state_db.display()))?;
            let memory = AgentMemory::load(&state)?;
            let health = health::check(&memory, cfg.expected_receive_period_in_days, unix_now());
            match health {
                Health::Working => println!("working"),
                Health::Quiet => println!(
                    "not working: no event in the last {} day(s)",
                    cfg.expected_receive_period_in_days
                ),
                Health::Failing => println!("not working: errors since the last event"),
            }
            if !health.is_working() {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Run { dry_run } => run(&config_path, dry_run),
    }
}

fn resolve_config(path: &std::path::Path, creds: &dyn CredentialStore) -> Result<AgentConfig> {
    let raw = load_config(path)?;
    Ok(raw.resolve(creds)?)
}

fn open_sink(cfg: &AgentConfig, dry_run: bool) -> Result<Box<dyn EventSink>> {
    if dry_run {
        return Ok(Box::new(JsonLinesSink::stdout()));
    }
    Ok(match &cfg.sink {
        SinkKind::Stdout => Box::new(JsonLinesSink::stdout()),
        SinkKind::Desktop => Box::new(DesktopNotifier::new()),
        SinkKind::File(path) => Box::new(
            JsonLinesSink::append(path)
                .with_context(|| format!("opening event log {}", path.display()))?,
        ),
    })
}

fn run(config_path: &std::path::Path, dry_run: bool) -> Result<()> {
    let keyring = KeyringStore;
    let cfg = resolve_config(config_path, &keyring)?;

    let state = SqliteStateStore::open(&cfg.state_db)
        .with_context(|| format!("opening state db {}", cfg.state_db.display()))?;
    let mut memory = AgentMemory::load(&state)?;

    let api = GraphClient::new(&cfg.api_base, cfg.timeout, cfg.debug)?;
    let endpoint = OAuthTokenEndpoint::new(
        &cfg.client_id,
        &cfg.client_secret,
        &cfg.token_url,
        cfg.timeout,
        cfg.debug,
    )?;

    let scratch = MemoryCredentials::new();
    let creds: &dyn CredentialStore = if dry_run { &scratch } else { &keyring };
    let mut sink = open_sink(&cfg, dry_run)?;

    let now = unix_now();
    let result = Agent::new(&cfg, &api, &endpoint, creds, sink.as_mut()).trigger(&mut memory, now);

    let report = finish(result, &mut memory, &state, now, dry_run)?;
    info!(
        "trigger done: action={:?} renewed={} fetched={} emitted={}",
        report.action.map(|a| a.as_str()),
        report.token_renewed,
        report.messages_fetched,
        report.events_emitted
    );
    Ok(())
}

/// Record the outcome in memory and persist it. A trigger failure is logged
/// first and carried into the save error, so it is never lost.
fn finish(
    result: outlook_agent::Result<TriggerReport>,
    memory: &mut AgentMemory,
    state: &dyn StateStore,
    now: i64,
    dry_run: bool,
) -> Result<TriggerReport> {
    if let Err(e) = &result {
        error!("trigger failed: {e}");
    }

    if dry_run {
        info!("dry run: state not saved");
    } else {
        if result.is_err() {
            memory.last_error_at = Some(now);
        }
        memory.save(state).with_context(|| match &result {
            Ok(_) => "saving state".to_string(),
            Err(e) => format!("saving state after trigger failure ({e})"),
        })?;
    }

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlook_agent::Error;
    use outlook_agent::store::MemoryStateStore;

    struct ReadOnlyState;

    impl StateStore for ReadOnlyState {
        fn get(&self, _key: &str) -> outlook_agent::Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> outlook_agent::Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }

        fn remove(&self, _key: &str) -> outlook_agent::Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    fn failed_fetch() -> outlook_agent::Result<TriggerReport> {
        Err(Error::Fetch {
            status: 503,
            body: "busy".to_string(),
        })
    }

    #[test]
    fn save_failure_keeps_the_trigger_error() {
        let mut memory = AgentMemory::default();
        let err = finish(failed_fetch(), &mut memory, &ReadOnlyState, 42, false).unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("status 503"), "{chain}");
        assert!(chain.contains("disk full"), "{chain}");
    }

    #[test]
    fn failed_trigger_is_recorded_in_state() {
        let state = MemoryStateStore::new();
        let mut memory = AgentMemory::default();

        assert!(finish(failed_fetch(), &mut memory, &state, 42, false).is_err());
        assert_eq!(AgentMemory::load(&state).unwrap().last_error_at, Some(42));
    }

    #[test]
    fn dry_run_never_writes_state() {
        let mut memory = AgentMemory::default();
        let report = finish(Ok(TriggerReport::default()), &mut memory, &ReadOnlyState, 42, true);
        assert!(report.is_ok());
    }
}
