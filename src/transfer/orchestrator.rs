//! Sequential transfer of every image in the gallery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::{
    ItemFailure, LocalCollection, RemoteGallery, TransferObserver, TransferProgress,
    TransferState, TransferSummary,
};
use crate::error::{Error, Result};
use crate::piwigo::RemoteImage;

/// Images requested per page when listing a category.
pub const PAGE_SIZE: u32 = 100;

/// Drives a [`RemoteGallery`] and a [`LocalCollection`] through one run.
pub struct Transfer<G, C> {
    gallery: G,
    collection: C,
    page_size: u32,
    cancel_flag: Arc<AtomicBool>,
    state: TransferState,
}

impl<G: RemoteGallery, C: LocalCollection> Transfer<G, C> {
    pub fn new(gallery: G, collection: C) -> Self {
        Self {
            gallery,
            collection,
            page_size: PAGE_SIZE,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            state: TransferState::Idle,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Share a cancellation flag; setting it stops the run before the next
    /// page or item.
    pub fn with_cancel_flag(mut self, cancel_flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = cancel_flag;
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn into_parts(self) -> (G, C) {
        (self.gallery, self.collection)
    }

    /// Run the transfer. Logout is always attempted before returning.
    ///
    /// Errors while logging in, initializing the catalog or listing the gallery
    /// abort the run; errors on a single image are counted and the run goes on.
    pub fn run(&mut self, observer: &mut dyn TransferObserver) -> Result<TransferSummary> {
        let result = self.run_phases(observer);

        self.gallery.logout();

        match result {
            Ok(summary) => {
                self.set_state(TransferState::Completed, observer);
                Ok(summary)
            }
            Err(e) => {
                observer.on_status(&format!("Error: {}", e));
                self.set_state(TransferState::Aborted, observer);
                Err(e)
            }
        }
    }

    fn set_state(&mut self, state: TransferState, observer: &mut dyn TransferObserver) {
        info!("Transfer state: {}", state.display_name());
        self.state = state;
        observer.on_state(state);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel_flag.load(Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn run_phases(&mut self, observer: &mut dyn TransferObserver) -> Result<TransferSummary> {
        self.set_state(TransferState::LoggingIn, observer);
        observer.on_status("Connecting to Piwigo...");
        if !self.gallery.login()? {
            return Err(Error::Authentication(
                "the server did not confirm the login, please check your credentials".to_string(),
            ));
        }

        self.set_state(TransferState::Initializing, observer);
        observer.on_status("Initializing digiKam database...");
        self.collection.initialize()?;

        let worklist = self.build_worklist(observer)?;
        observer.on_status(&format!("Total images to transfer: {}", worklist.len()));

        self.set_state(TransferState::Transferring, observer);
        let summary = self.transfer_all(&worklist, observer)?;

        observer.on_status(&format!(
            "Transfer completed! Success: {}, Failed: {}, Skipped: {}",
            summary.succeeded, summary.failed, summary.skipped
        ));
        Ok(summary)
    }

    /// Every (image, category path) pair in the gallery, category by category.
    fn build_worklist(
        &mut self,
        observer: &mut dyn TransferObserver,
    ) -> Result<Vec<(RemoteImage, String)>> {
        self.set_state(TransferState::EnumeratingCategories, observer);
        observer.on_status("Retrieving categories from Piwigo...");
        let categories = self.gallery.categories()?;
        observer.on_status(&format!("Found {} categories", categories.len()));

        self.set_state(TransferState::EnumeratingImages, observer);
        let mut worklist = Vec::new();
        for category in &categories {
            observer.on_status(&format!(
                "Retrieving images from category: {}",
                category.full_path
            ));

            let mut page = 0;
            loop {
                self.check_cancelled()?;
                let images = self
                    .gallery
                    .images_in_category(category.id, page, self.page_size)?;
                if images.is_empty() {
                    break;
                }
                worklist.extend(
                    images
                        .into_iter()
                        .map(|image| (image, category.full_path.clone())),
                );
                page += 1;
            }
        }

        Ok(worklist)
    }

    fn transfer_all(
        &mut self,
        worklist: &[(RemoteImage, String)],
        observer: &mut dyn TransferObserver,
    ) -> Result<TransferSummary> {
        let total = worklist.len();
        let mut progress = TransferProgress::new(total);
        let mut failures = Vec::new();

        for (image, category_path) in worklist {
            self.check_cancelled()?;
            let name = image.display_name();

            if !image.has_download_url() {
                observer.on_status(&format!(
                    "Skipping image {} ({}): No download URL available",
                    image.id, name
                ));
                progress.skipped += 1;
            } else {
                observer.on_status(&format!(
                    "Downloading image: {} ({}/{})",
                    name,
                    progress.processed + 1,
                    total
                ));
                match self.transfer_one(image, category_path, observer) {
                    Ok(()) => progress.succeeded += 1,
                    Err(e) => {
                        warn!("Failed to transfer image {}: {}", image.id, e);
                        observer.on_status(&format!(
                            "Failed to transfer image {} ({}): {}",
                            image.id, name, e
                        ));
                        failures.push(ItemFailure {
                            image_id: image.id,
                            name: name.clone(),
                            error: e.to_string(),
                        });
                        progress.failed += 1;
                    }
                }
            }

            progress.processed += 1;
            progress.current_item = Some(name);
            observer.on_progress(&progress);
        }

        Ok(TransferSummary {
            total,
            succeeded: progress.succeeded,
            failed: progress.failed,
            skipped: progress.skipped,
            failures,
        })
    }

    fn transfer_one(
        &mut self,
        image: &RemoteImage,
        category_path: &str,
        observer: &mut dyn TransferObserver,
    ) -> Result<()> {
        let data = self.gallery.download(&image.element_url)?;
        observer.on_status(&format!("Saving image: {}", image.display_name()));
        self.collection.save_image(image, &data, category_path)?;
        Ok(())
    }
}
