//! Extrusion-mode tracking across the whole document.
//!
//! Retraction rewrites depend on whether `E` is a delta (relative) or a
//! position (absolute), and in absolute mode on the last position the
//! extruder was driven to by a printing move.

use tracing::debug;

use crate::gcode::classify::{is_extrusion_command, is_retraction_command};
use crate::gcode::GcodeLine;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrusionState {
    pub relative: bool,
    /// Last `E` reached by an extrusion move in absolute mode; `None` until known.
    pub last_absolute_e: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ExtrusionTracker {
    state: ExtrusionState,
}

impl ExtrusionTracker {
    pub fn new(relative: bool) -> Self {
        Self {
            state: ExtrusionState {
                relative,
                last_absolute_e: None,
            },
        }
    }

    pub fn state(&self) -> ExtrusionState {
        self.state
    }

    /// Update the state from one line. Must be called in document order.
    pub fn observe(&mut self, line: &str) {
        let Some(cmd) = GcodeLine::parse(line) else {
            return;
        };

        if cmd.is("M83") || cmd.is("G91") {
            self.state.relative = true;
        } else if cmd.is("M82") || cmd.is("G90") {
            self.state.relative = false;
        } else if cmd.is("G92") {
            match cmd.number('E') {
                Some(Ok(e)) => self.state.last_absolute_e = Some(e),
                Some(Err(_)) => {
                    debug!("Unreadable extruder reset '{}', position unknown", line.trim());
                    self.state.last_absolute_e = None;
                }
                None => {}
            }
        } else if !self.state.relative
            && is_extrusion_command(&cmd)
            && !is_retraction_command(&cmd)
        {
            match cmd.number('E') {
                Some(Ok(e)) => self.state.last_absolute_e = Some(e),
                Some(Err(_)) => debug!("Unreadable extrusion '{}', keeping last position", line.trim()),
                None => {}
            }
        }
    }

    pub fn observe_block(&mut self, block: &str) {
        for line in block.lines() {
            self.observe(line);
        }
    }
}
