//! Where selected trails are shown
//!
//! The chart and drawer are not part of this crate. The controller hands
//! finished trail details to a [`Presentation`] and tells it when the panel
//! should close.

use serde::Serialize;
use std::io::Write;
use trailmap_lib::{ElevationProfile, ProfileStats};

/// Everything the trail panel shows for one selected trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailDetails {
    pub feature_id: String,
    pub name: String,
    pub description: String,
    pub stats: ProfileStats,
    pub profile: ElevationProfile,
}

pub trait Presentation {
    fn show_trail(&mut self, details: &TrailDetails);
    fn clear_trail(&mut self);
}

/// Writes each shown trail as one pretty-printed JSON document
#[derive(Debug)]
pub struct JsonPresentation<W: Write> {
    out: W,
}

impl<W: Write> JsonPresentation<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presentation for JsonPresentation<W> {
    fn show_trail(&mut self, details: &TrailDetails) {
        let written = serde_json::to_writer_pretty(&mut self.out, details)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            tracing::error!("Failed to write trail details: {}", e);
        }
    }

    fn clear_trail(&mut self) {
        tracing::debug!("Trail panel closed");
    }
}
