//! Layer segmentation by printed height.
//!
//! Section boundaries come from the accumulated height of the printed layers,
//! not from a layer count, because a section is rarely a whole number of
//! layers tall.

use serde::Serialize;
use tracing::debug;

use crate::error::{AutoTowersError, Result};
use crate::gcode::GcodeDocument;
use crate::height::Height;
use crate::tower::TowerProfile;

/// Where one printed-layer block sits in the tower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerPosition {
    /// Index of the block in the document.
    pub block_index: usize,
    /// Height of the top of this layer above the bed.
    pub cumulative_height: Height,
    /// Section this layer belongs to; `None` while still printing the base.
    pub section: Option<u32>,
    /// True for the first layer of a section.
    pub section_start: bool,
}

#[derive(Debug, Clone)]
pub struct LayerSegmenter {
    base_height: Height,
    section_height: Height,
    initial_layer_height: Height,
    layer_height: Height,
    cumulative: Height,
    printed_layers: usize,
    next_section: u32,
}

impl LayerSegmenter {
    pub fn new(profile: &TowerProfile) -> Result<Self> {
        if !profile.layer_height.is_positive() || !profile.initial_layer_height.is_positive() {
            return Err(AutoTowersError::config(format!(
                "layer heights must be positive (initial {} mm, layer {} mm)",
                profile.initial_layer_height, profile.layer_height
            )));
        }
        Ok(Self {
            base_height: profile.base_height,
            section_height: profile.section_height,
            initial_layer_height: profile.initial_layer_height,
            layer_height: profile.layer_height,
            cumulative: Height::ZERO,
            printed_layers: 0,
            next_section: 0,
        })
    }

    /// Height the print must exceed before section `section` begins.
    fn threshold(&self, section: u32) -> Height {
        self.base_height + self.section_height * section
    }

    /// Account for the next printed layer, stored at `block_index`.
    pub fn advance(&mut self, block_index: usize) -> LayerPosition {
        self.cumulative += if self.printed_layers == 0 {
            self.initial_layer_height
        } else {
            self.layer_height
        };
        self.printed_layers += 1;

        let section_start = self.cumulative > self.threshold(self.next_section);
        if section_start {
            debug!(
                "Section {} starts at block {} ({} mm)",
                self.next_section, block_index, self.cumulative
            );
            self.next_section += 1;
        }

        LayerPosition {
            block_index,
            cumulative_height: self.cumulative,
            section: self.next_section.checked_sub(1),
            section_start,
        }
    }

    pub fn sections_started(&self) -> u32 {
        self.next_section
    }
}

/// Positions of every printed-layer block in `document`.
pub fn segment(document: &GcodeDocument, profile: &TowerProfile) -> Result<Vec<LayerPosition>> {
    let mut segmenter = LayerSegmenter::new(profile)?;
    let first = profile.leading_blocks;
    let last = document.len().saturating_sub(1);
    Ok((first..last).map(|i| segmenter.advance(i)).collect())
}
