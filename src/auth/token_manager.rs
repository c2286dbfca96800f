use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::auth::oauth::TokenEndpoint;
use crate::auth::token_store::{ACCESS_TOKEN, CredentialStore, REFRESH_TOKEN};
use crate::error::Result;

/// Renew when fewer than this many seconds remain on the access token.
pub const SAFETY_MARGIN_SECS: i64 = 600;

/// The bearer credential and what we know about its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds. `None` forces a renewal on the next check.
    pub expires_at: Option<i64>,
}

pub struct TokenManager<'a> {
    credential: Credential,
    endpoint: &'a dyn TokenEndpoint,
    store: &'a dyn CredentialStore,
    debug: bool,
}

impl<'a> TokenManager<'a> {
    pub fn new(
        credential: Credential,
        endpoint: &'a dyn TokenEndpoint,
        store: &'a dyn CredentialStore,
        debug: bool,
    ) -> Self {
        Self {
            credential,
            endpoint,
            store,
            debug,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.credential.access_token
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Adopt the expiry remembered from the previous trigger.
    pub fn resume(&mut self, expires_at: Option<i64>) {
        self.credential.expires_at = expires_at;
    }

    /// True when the token is missing an expiry or is inside the safety margin.
    pub fn needs_renewal(&self, now: i64) -> bool {
        match self.credential.expires_at {
            None => true,
            Some(exp) => exp - now < SAFETY_MARGIN_SECS,
        }
    }

    /// Renew the access token if it is about to expire. Returns whether a
    /// renewal happened. On failure nothing is changed.
    pub fn ensure_valid(&mut self, now: i64) -> Result<bool> {
        if !self.needs_renewal(now) {
            info!("refresh not needed");
            return Ok(false);
        }
        self.renew(now)?;
        Ok(true)
    }

    fn renew(&mut self, now: i64) -> Result<()> {
        let tokens = self.endpoint.refresh(&self.credential.refresh_token)?;

        if tokens.access_token != self.credential.access_token {
            self.store.set(ACCESS_TOKEN, &tokens.access_token)?;
            if self.debug {
                info!("{ACCESS_TOKEN} credential updated");
            }
            self.credential.access_token = tokens.access_token;
        }

        if let Some(rt) = tokens.refresh_token
            && rt != self.credential.refresh_token
        {
            self.store.set(REFRESH_TOKEN, &rt)?;
            if self.debug {
                info!("{REFRESH_TOKEN} credential updated");
            }
            self.credential.refresh_token = rt;
        }

        self.credential.expires_at = tokens.expires_in.map(|s| now + s as i64);
        debug!("token expires at {:?}", self.credential.expires_at);
        Ok(())
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
