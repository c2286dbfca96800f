//! Event emission.
//!
//! An [`Event`] is one structured record handed to an [`EventSink`]. The
//! [`EventEmitter`] sits in front of the sink and drops events when the agent
//! runs with `emit_events = false`.

pub mod notifier;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub use notifier::DesktopNotifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unix seconds.
    pub created_at: i64,
    pub payload: Value,
}

pub trait EventSink {
    fn publish(&mut self, event: &Event) -> Result<()>;
}

/// One JSON document per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesSink<File> {
    /// Append to `path`, creating it if needed.
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn publish(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Collects events in memory; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn publish(&mut self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|e| Error::Sink(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Gate between the agent and its sink.
pub struct EventEmitter<'a> {
    sink: &'a mut dyn EventSink,
    enabled: bool,
}

impl<'a> EventEmitter<'a> {
    pub fn new(sink: &'a mut dyn EventSink, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    /// Publish `payload` stamped with `now`. Returns the event when one was
    /// actually produced.
    pub fn emit(&mut self, payload: Value, now: i64) -> Result<Option<Event>> {
        if !self.enabled {
            debug!("emit_events disabled, dropping event");
            return Ok(None);
        }
        let event = Event {
            created_at: now,
            payload,
        };
        self.sink.publish(&event)?;
        Ok(Some(event))
    }
}
