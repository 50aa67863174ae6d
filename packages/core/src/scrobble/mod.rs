//! Scrobble log archiving, parsing and submission.
//!
//! A log moves through `archived → parsed → submitted`; a parse or submit
//! failure rejects the whole log and nothing from it is submitted.

pub mod lastfm;
pub mod log;
pub mod processor;

pub use lastfm::LastFmClient;
pub use log::{ListenStatus, ScrobbleEvent, ScrobbleLog};
pub use processor::{ArchivedLog, ParsedLog, ScrobbleReport};

use crate::error::Result;

/// Remote service that accepts listen events.
pub trait Scrobbler {
    /// Submits `events` in order as one logical batch.
    fn submit_many(&self, events: &[ScrobbleEvent]) -> Result<()>;
}

impl<T: Scrobbler + ?Sized> Scrobbler for &T {
    fn submit_many(&self, events: &[ScrobbleEvent]) -> Result<()> {
        (**self).submit_many(events)
    }
}
