//! Transfer pipeline from a remote gallery into a local collection.
//!
//! [`Transfer`] drives the whole run on one thread; [`spawn`] runs it on a
//! worker thread and streams [`TransferEvent`]s back over a channel so the
//! caller's own loop stays responsive.

pub mod orchestrator;
pub mod worker;

use std::path::PathBuf;
use std::sync::mpsc;

use crate::error::Result;
use crate::piwigo::{RemoteCategory, RemoteImage};

pub use orchestrator::{Transfer, PAGE_SIZE};
pub use worker::{spawn, TransferHandle};

/// Source side of a transfer.
pub trait RemoteGallery {
    fn login(&mut self) -> Result<bool>;
    fn categories(&mut self) -> Result<Vec<RemoteCategory>>;
    fn images_in_category(
        &mut self,
        category_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteImage>>;
    fn download(&mut self, url: &str) -> Result<Vec<u8>>;
    /// Best effort; must not fail.
    fn logout(&mut self);
}

/// Destination side of a transfer.
pub trait LocalCollection {
    fn initialize(&mut self) -> Result<()>;
    fn save_image(
        &mut self,
        image: &RemoteImage,
        data: &[u8],
        category_path: &str,
    ) -> Result<PathBuf>;
}

/// Phase of a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    LoggingIn,
    Initializing,
    EnumeratingCategories,
    EnumeratingImages,
    Transferring,
    Completed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Aborted)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TransferState::Idle => "Idle",
            TransferState::LoggingIn => "Logging in",
            TransferState::Initializing => "Initializing catalog",
            TransferState::EnumeratingCategories => "Listing categories",
            TransferState::EnumeratingImages => "Listing images",
            TransferState::Transferring => "Transferring",
            TransferState::Completed => "Completed",
            TransferState::Aborted => "Aborted",
        }
    }
}

/// Counters for a run, emitted after every item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Display name of the item that was just completed
    pub current_item: Option<String>,
}

impl TransferProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Whole percent complete, rounded down.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            (self.processed.min(self.total) * 100 / self.total) as u8
        }
    }
}

/// One item that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub image_id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct TransferSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
}

/// Notifications sent over the channel by a spawned transfer.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    State(TransferState),
    Status(String),
    Progress(TransferProgress),
}

/// Receives notifications in the order the transfer produces them.
pub trait TransferObserver {
    fn on_state(&mut self, _state: TransferState) {}
    fn on_status(&mut self, message: &str);
    fn on_progress(&mut self, progress: &TransferProgress);
}

impl TransferObserver for mpsc::Sender<TransferEvent> {
    // A dropped receiver only means nobody is listening any more.
    fn on_state(&mut self, state: TransferState) {
        let _ = self.send(TransferEvent::State(state));
    }

    fn on_status(&mut self, message: &str) {
        let _ = self.send(TransferEvent::Status(message.to_string()));
    }

    fn on_progress(&mut self, progress: &TransferProgress) {
        let _ = self.send(TransferEvent::Progress(progress.clone()));
    }
}

/// Collects every notification; useful for callers that only want the record.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<TransferEvent>,
}

impl TransferObserver for EventLog {
    fn on_state(&mut self, state: TransferState) {
        self.events.push(TransferEvent::State(state));
    }

    fn on_status(&mut self, message: &str) {
        self.events.push(TransferEvent::Status(message.to_string()));
    }

    fn on_progress(&mut self, progress: &TransferProgress) {
        self.events.push(TransferEvent::Progress(progress.clone()));
    }
}

impl EventLog {
    pub fn progress(&self) -> Vec<&TransferProgress> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<TransferState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }
}
