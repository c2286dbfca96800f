//! Whole triggers against a local Graph stand-in, with state kept in SQLite
//! between runs the way the binary keeps it.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::json;

use common::{MockServer, Recorded, Reply};
use outlook_agent::auth::oauth::OAuthTokenEndpoint;
use outlook_agent::auth::token_store::{ACCESS_TOKEN, MemoryCredentials, REFRESH_TOKEN};
use outlook_agent::config::{AgentConfig, RawConfig};
use outlook_agent::events::MemorySink;
use outlook_agent::mail::GraphClient;
use outlook_agent::store::{AgentMemory, SqliteStateStore};
use outlook_agent::{Agent, Error, TriggerReport};

const NOW: i64 = 1_700_000_000;

struct Mailbox {
    server: MockServer,
    listing: Arc<Mutex<Vec<&'static str>>>,
}

impl Mailbox {
    fn start(ids: &[&'static str], broken: Option<&'static str>) -> Self {
        let listing = Arc::new(Mutex::new(ids.to_vec()));
        let shared = listing.clone();
        let server = MockServer::start(move |r: &Recorded| {
            if r.url == "/token" {
                return Reply::json(
                    200,
                    json!({
                        "token_type": "Bearer",
                        "access_token": "at-2",
                        "refresh_token": "rt-2",
                        "expires_in": 3600
                    }),
                );
            }
            if r.url.starts_with("/me/mailFolders/inbox/messages") {
                let value: Vec<_> = shared
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|id| json!({ "id": id }))
                    .collect();
                return Reply::json(200, json!({ "value": value }));
            }
            match r.url.strip_prefix("/me/messages/") {
                Some(id) if Some(id) == broken => Reply::json(503, json!({ "error": "busy" })),
                Some(id) => Reply::json(200, json!({ "id": id, "subject": format!("mail {id}") })),
                None => Reply::json(404, json!({})),
            }
        });
        Self { server, listing }
    }

    fn set_listing(&self, ids: &[&'static str]) {
        *self.listing.lock().unwrap() = ids.to_vec();
    }

    fn config(&self, state_db: &Path, creds: &MemoryCredentials) -> AgentConfig {
        let base = self.server.base_url();
        RawConfig::from_toml_str(&format!(
            r#"
            client_id = "app"
            client_secret = "secret"
            access_token = "at-1"
            refresh_token = "rt-1"
            folder = "inbox"
            type = "get_new_emails"
            api_base = "{base}"
            token_url = "{base}/token"
            state_db = "{}"
            "#,
            state_db.display()
        ))
        .unwrap()
        .resolve(creds)
        .unwrap()
    }
}

/// One scheduled run: load state, trigger, save state.
fn run_once(
    mailbox: &Mailbox,
    state_db: &Path,
    creds: &MemoryCredentials,
) -> (Result<TriggerReport, Error>, Vec<serde_json::Value>) {
    let cfg = mailbox.config(state_db, creds);
    let state = SqliteStateStore::open(&cfg.state_db).unwrap();
    let mut memory = AgentMemory::load(&state).unwrap();

    let api = GraphClient::new(&cfg.api_base, cfg.timeout, false).unwrap();
    let endpoint = OAuthTokenEndpoint::new(
        &cfg.client_id,
        &cfg.client_secret,
        &cfg.token_url,
        cfg.timeout,
        false,
    )
    .unwrap();
    let mut sink = MemorySink::new();
    let view = sink.clone();

    let result = Agent::new(&cfg, &api, &endpoint, creds, &mut sink).trigger(&mut memory, NOW);
    memory.save(&state).unwrap();

    let payloads = view.events().into_iter().map(|e| e.payload).collect();
    (result, payloads)
}

#[test]
fn consecutive_runs_emit_each_message_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.db");
    let creds = MemoryCredentials::new();
    let mailbox = Mailbox::start(&["A", "B"], None);

    // First run: no expiry known, so the token is renewed before anything else.
    let (report, events) = run_once(&mailbox, &db, &creds);
    let report = report.unwrap();
    assert!(report.token_renewed);
    assert_eq!(report.events_emitted, 2);
    assert_eq!(events[0]["id"], "A");
    assert_eq!(events[1]["id"], "B");
    assert_eq!(
        creds.writes(),
        vec![
            (ACCESS_TOKEN.to_string(), "at-2".to_string()),
            (REFRESH_TOKEN.to_string(), "rt-2".to_string()),
        ]
    );
    let requests = mailbox.server.requests();
    assert_eq!(requests[0].url, "/token");
    assert!(
        requests[1..]
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer at-2"))
    );

    // Second run: the stored token is still fresh and only C is new.
    mailbox.set_listing(&["B", "C"]);
    let seen = mailbox.server.requests().len();
    let (report, events) = run_once(&mailbox, &db, &creds);
    let report = report.unwrap();
    assert!(!report.token_renewed);
    assert_eq!(report.messages_fetched, 1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "C");
    let urls = mailbox.server.urls();
    assert_eq!(
        &urls[seen..],
        &[
            "/me/mailFolders/inbox/messages?$format=json&$top=20&$select=id".to_string(),
            "/me/messages/C".to_string(),
        ]
    );

    // Third run: nothing changed, nothing fetched.
    let seen = mailbox.server.requests().len();
    let (report, events) = run_once(&mailbox, &db, &creds);
    assert!(!report.unwrap().listing_changed);
    assert!(events.is_empty());
    assert_eq!(mailbox.server.requests().len(), seen + 1);

    let state = SqliteStateStore::open(&db).unwrap();
    let memory = AgentMemory::load(&state).unwrap();
    assert_eq!(memory.expires_at, Some(NOW + 3600));
    assert_eq!(memory.last_event_at, Some(NOW));
    assert_eq!(
        memory.last_status,
        Some(json!({ "value": [{ "id": "B" }, { "id": "C" }] }))
    );
}

#[test]
fn failed_fetch_keeps_the_previous_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.db");
    let creds = MemoryCredentials::new();
    let mailbox = Mailbox::start(&["A"], Some("B"));

    run_once(&mailbox, &db, &creds).0.unwrap();

    mailbox.set_listing(&["A", "B"]);
    let (result, _) = run_once(&mailbox, &db, &creds);
    assert!(matches!(result, Err(Error::Fetch { status: 503, .. })));

    let state = SqliteStateStore::open(&db).unwrap();
    let memory = AgentMemory::load(&state).unwrap();
    assert_eq!(memory.last_status, Some(json!({ "value": [{ "id": "A" }] })));
}
