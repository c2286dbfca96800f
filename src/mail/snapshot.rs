//! Change detection over successive folder listings.
//!
//! A listing is fetched every cycle and compared with the envelope kept from
//! the previous cycle. An identical envelope means nothing happened. Otherwise
//! every listed id missing from the previous listing is new, in API order.

use log::{debug, warn};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::mail::graph_client::MailApi;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One folder listing: the envelope as received plus the ids it names.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    envelope: Value,
    ids: Vec<String>,
}

impl Snapshot {
    /// Read the ids out of a `{ "value": [ { "id": ... }, ... ] }` envelope.
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        let entries = envelope
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidResponse("listing has no value array".into()))?;

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.get("id").and_then(Value::as_str) {
                Some(id) => ids.push(id.to_string()),
                None => warn!("skipping listing entry without an id: {entry}"),
            }
        }
        Ok(Self { envelope, ids })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn envelope(&self) -> &Value {
        &self.envelope
    }

    pub fn into_envelope(self) -> Value {
        self.envelope
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    /// Ids of this snapshot absent from `previous`, in listing order.
    /// With no previous snapshot every id is new.
    pub fn new_ids<'a>(
        &'a self,
        previous: Option<&'a Snapshot>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.ids
            .iter()
            .map(String::as_str)
            .filter(move |id| previous.is_none_or(|prev| !prev.contains(id)))
    }
}

/// Structural equality of two listing envelopes. A missing previous envelope
/// never equals anything.
pub fn envelopes_equal(previous: Option<&Value>, current: &Value) -> bool {
    previous.is_some_and(|prev| prev == current)
}

/// Result of polling a folder once.
#[derive(Debug)]
pub enum PollOutcome {
    /// Same envelope as last time. Nothing to fetch, nothing to store.
    Unchanged,
    /// The listing moved. `new_ids` may still be empty.
    Changed {
        snapshot: Snapshot,
        new_ids: Vec<String>,
    },
}

/// Fetch the newest `page_size` ids of `folder` and diff them against the
/// envelope kept from the previous poll.
///
/// Nothing is persisted here: the caller stores `snapshot` once every new id
/// has been handled, so a failure part-way leaves the old baseline in place.
pub fn poll_folder(
    api: &dyn MailApi,
    access_token: &str,
    folder: &str,
    page_size: u32,
    previous: Option<&Value>,
) -> Result<PollOutcome> {
    let envelope = api.list_folder(access_token, folder, page_size)?;

    if envelopes_equal(previous, &envelope) {
        debug!("listing of {folder} unchanged");
        return Ok(PollOutcome::Unchanged);
    }

    let previous = match previous {
        Some(v) => Some(Snapshot::from_envelope(v.clone())?),
        None => None,
    };
    let snapshot = Snapshot::from_envelope(envelope)?;
    let new_ids = snapshot
        .new_ids(previous.as_ref())
        .map(str::to_string)
        .collect();

    Ok(PollOutcome::Changed { snapshot, new_ids })
}
