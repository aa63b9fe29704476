//! Background worker running a transfer off the caller's thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{LocalCollection, RemoteGallery, Transfer, TransferEvent, TransferSummary};
use crate::config::Config;
use crate::digikam::DigikamExporter;
use crate::error::{Error, Result};
use crate::piwigo::PiwigoClient;

/// A running transfer and the channel its notifications arrive on.
pub struct TransferHandle {
    receiver: mpsc::Receiver<TransferEvent>,
    cancel_flag: Arc<AtomicBool>,
    thread: JoinHandle<Result<TransferSummary>>,
    started_at: Instant,
}

impl TransferHandle {
    /// Block on notifications until the worker finishes.
    pub fn events(&self) -> mpsc::Iter<'_, TransferEvent> {
        self.receiver.iter()
    }

    /// Drain whatever notifications are ready without blocking.
    pub fn poll_events(&self) -> Vec<TransferEvent> {
        self.receiver.try_iter().collect()
    }

    /// Ask the worker to stop before its next page or item.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<TransferSummary> {
        self.thread.join().unwrap_or(Err(Error::WorkerPanicked))
    }
}

/// Validate the configuration and start a Piwigo to digiKam transfer.
pub fn spawn(config: &Config) -> Result<TransferHandle> {
    config.validate()?;
    let gallery = PiwigoClient::from_config(&config.gallery);
    let collection = DigikamExporter::from_config(&config.collection)?;
    Ok(spawn_with(gallery, collection, config.gallery.page_size))
}

/// Start a transfer between any gallery and collection.
pub fn spawn_with<G, C>(gallery: G, collection: C, page_size: u32) -> TransferHandle
where
    G: RemoteGallery + Send + 'static,
    C: LocalCollection + Send + 'static,
{
    let (mut tx, rx) = mpsc::channel();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let mut transfer = Transfer::new(gallery, collection)
        .with_page_size(page_size)
        .with_cancel_flag(cancel_flag.clone());

    let thread = thread::spawn(move || transfer.run(&mut tx));

    TransferHandle {
        receiver: rx,
        cancel_flag,
        thread,
        started_at: Instant::now(),
    }
}
