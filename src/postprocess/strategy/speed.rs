use tracing::warn;

use super::RewriteStrategy;
use crate::gcode::classify::is_speed_move_command;
use crate::gcode::{format_number, marker, GcodeLine};
use crate::postprocess::extrusion::ExtrusionState;
use crate::tower::ToweredParameterKind;

/// Rescales slicer feedrates so the reference speed maps to the section's speed.
///
/// Scaling (rather than overwriting) keeps the per-feature ratios the slicer
/// chose: `new F = old F * value / reference`. Print-speed towers touch `G1`
/// moves, travel-speed towers touch `G0` moves.
pub struct SpeedScaleStrategy {
    verb: &'static str,
    reference: f64,
}

impl SpeedScaleStrategy {
    pub fn new(kind: ToweredParameterKind, reference: f64) -> Self {
        let verb = match kind {
            ToweredParameterKind::TravelSpeed => "G0",
            _ => "G1",
        };
        Self { verb, reference }
    }
}

impl RewriteStrategy for SpeedScaleStrategy {
    fn rewrite_line(&mut self, line: &str, value: f64, _: &ExtrusionState) -> Option<String> {
        let mut cmd = GcodeLine::parse(line)?;
        if !cmd.is(self.verb) || !is_speed_move_command(&cmd) {
            return None;
        }
        let old = match cmd.number('F')? {
            Ok(f) => f,
            Err(err) => {
                warn!("Leaving malformed move '{}' unchanged: {}", line.trim(), err);
                return None;
            }
        };

        let new = (value * 60.0) * old / (self.reference * 60.0);
        let original = cmd.param('F').unwrap_or_default().to_string();
        cmd.set('F', format_number(new, 1));
        cmd.push_comment(&marker::tag(&format!(
            "speed {} (was F{})",
            format_number(value, 3),
            original
        )));
        Some(cmd.to_line())
    }
}
