//! Trigger dispatch.
//!
//! One [`Agent::trigger`] call is one scheduled run: make sure the token is
//! usable, then either look for new mail or send the configured message.

use log::{info, warn};

use crate::auth::oauth::TokenEndpoint;
use crate::auth::token_manager::{Credential, TokenManager};
use crate::auth::token_store::CredentialStore;
use crate::config::AgentConfig;
use crate::domain::Action;
use crate::error::{Error, Result};
use crate::events::{EventEmitter, EventSink};
use crate::mail::{MailApi, MessageFetcher, PollOutcome, poll_folder};
use crate::store::AgentMemory;

/// What a trigger did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerReport {
    /// `None` when the configured type was not recognised.
    pub action: Option<Action>,
    pub token_renewed: bool,
    pub listing_changed: bool,
    pub messages_fetched: usize,
    pub events_emitted: usize,
}

pub struct Agent<'a> {
    config: &'a AgentConfig,
    api: &'a dyn MailApi,
    tokens: TokenManager<'a>,
    sink: &'a mut dyn EventSink,
}

impl<'a> Agent<'a> {
    pub fn new(
        config: &'a AgentConfig,
        api: &'a dyn MailApi,
        endpoint: &'a dyn TokenEndpoint,
        creds: &'a dyn CredentialStore,
        sink: &'a mut dyn EventSink,
    ) -> Self {
        let credential = Credential {
            access_token: config.access_token.clone(),
            refresh_token: config.refresh_token.clone(),
            expires_at: None,
        };
        Self {
            config,
            api,
            tokens: TokenManager::new(credential, endpoint, creds, config.debug),
            sink,
        }
    }

    /// Run the configured action once.
    ///
    /// `memory` is only written after the step it records has succeeded, so
    /// on error it still describes the last good state and can be saved as is.
    pub fn trigger(&mut self, memory: &mut AgentMemory, now: i64) -> Result<TriggerReport> {
        let action = match &self.config.action {
            Ok(action) => *action,
            Err(unknown) => {
                warn!("Error: {unknown}");
                return Ok(TriggerReport::default());
            }
        };

        let mut report = TriggerReport {
            action: Some(action),
            ..TriggerReport::default()
        };

        self.tokens.resume(memory.expires_at);
        report.token_renewed = self.tokens.ensure_valid(now)?;
        memory.expires_at = self.tokens.credential().expires_at;

        match action {
            Action::GetNewEmails => self.get_new_emails(memory, now, &mut report)?,
            Action::SendEmail => self.send_email(memory, now, &mut report)?,
        }
        Ok(report)
    }

    fn get_new_emails(
        &mut self,
        memory: &mut AgentMemory,
        now: i64,
        report: &mut TriggerReport,
    ) -> Result<()> {
        let config = self.config;
        let access_token = self.tokens.access_token();

        let outcome = poll_folder(
            self.api,
            access_token,
            &config.folder,
            config.page_size,
            memory.last_status.as_ref(),
        )?;
        let PollOutcome::Changed { snapshot, new_ids } = outcome else {
            return Ok(());
        };
        report.listing_changed = true;
        info!("{} new message(s) in {}", new_ids.len(), config.folder);

        let fetcher = MessageFetcher::new(self.api, config.raw_email);
        let mut emitter = EventEmitter::new(&mut *self.sink, config.emit_events);
        for id in &new_ids {
            let message = fetcher.fetch(access_token, id)?;
            report.messages_fetched += 1;
            if emitter.emit(message.into_payload(), now)?.is_some() {
                report.events_emitted += 1;
                memory.last_event_at = Some(now);
            }
        }

        memory.last_status = Some(snapshot.into_envelope());
        Ok(())
    }

    fn send_email(
        &mut self,
        memory: &mut AgentMemory,
        now: i64,
        report: &mut TriggerReport,
    ) -> Result<()> {
        let mail = self.config.send_email.as_ref().ok_or_else(|| {
            Error::Configuration(vec![
                "send_email.to needs at least one recipient when type is send_email".to_string(),
            ])
        })?;

        let response = self
            .api
            .create_message(self.tokens.access_token(), &mail.to_graph_json())?;

        let mut emitter = EventEmitter::new(&mut *self.sink, self.config.emit_events);
        if emitter.emit(response, now)?.is_some() {
            report.events_emitted += 1;
            memory.last_event_at = Some(now);
        }
        Ok(())
    }
}
