use tracing::{debug, warn};

use super::RewriteStrategy;
use crate::gcode::classify::{is_bridge_start, is_layer_start};
use crate::gcode::{format_number, marker, GcodeLine};
use crate::postprocess::extrusion::ExtrusionState;
use crate::tower::kind::fan_duty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Normal,
    AfterBridge,
}

/// Forces slicer fan commands to the section's fan speed.
///
/// With `maintain_during_bridge`, fan changes between a bridge marker and the
/// next `M107` are the slicer's bridge cooling and are kept as written. The
/// hold never outlives its layer.
pub struct FanSpeedStrategy {
    maintain_during_bridge: bool,
    state: BridgeState,
}

impl FanSpeedStrategy {
    pub fn new(maintain_during_bridge: bool) -> Self {
        Self {
            maintain_during_bridge,
            state: BridgeState::Normal,
        }
    }
}

impl RewriteStrategy for FanSpeedStrategy {
    fn rewrite_line(&mut self, line: &str, value: f64, _: &ExtrusionState) -> Option<String> {
        if is_bridge_start(line) {
            if self.maintain_during_bridge {
                self.state = BridgeState::AfterBridge;
            }
            return None;
        }
        if is_layer_start(line) {
            self.state = BridgeState::Normal;
            return None;
        }

        let mut cmd = GcodeLine::parse(line)?;
        if cmd.is("M107") {
            self.state = BridgeState::Normal;
            return None;
        }
        if !cmd.is("M106") || !cmd.has('S') {
            return None;
        }
        if self.state == BridgeState::AfterBridge {
            debug!("Keeping bridge fan command '{}'", line.trim());
            return None;
        }
        if let Some(Err(err)) = cmd.number('S') {
            warn!("Leaving malformed fan command '{}' unchanged: {}", line.trim(), err);
            return None;
        }

        let original = cmd.param('S').unwrap_or_default().to_string();
        let duty = fan_duty(value);
        cmd.set('S', duty.to_string());
        cmd.push_comment(&marker::tag(&format!(
            "fan {}% (was S{})",
            format_number(value, 3),
            original
        )));
        Some(cmd.to_line())
    }
}
