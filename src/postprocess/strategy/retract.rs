use tracing::{debug, warn};

use super::RewriteStrategy;
use crate::gcode::classify::is_retraction_command;
use crate::gcode::{format_extrusion, format_number, marker, GcodeLine};
use crate::postprocess::extrusion::ExtrusionState;

/// Sets the length of every retraction to the section's distance.
///
/// Relative mode: a retract becomes `E-<distance>` and an un-retract
/// `E<distance>`. Absolute mode: a retract is a move below the last printed
/// position and becomes `<last> - <distance>`; the un-retract already returns
/// to `<last>` and is left alone.
pub struct RetractDistanceStrategy;

impl RewriteStrategy for RetractDistanceStrategy {
    fn rewrite_line(
        &mut self,
        line: &str,
        value: f64,
        extrusion: &ExtrusionState,
    ) -> Option<String> {
        let mut cmd = GcodeLine::parse(line)?;
        if !is_retraction_command(&cmd) {
            return None;
        }
        let e = match cmd.number('E')? {
            Ok(e) => e,
            Err(err) => {
                warn!("Leaving malformed retraction '{}' unchanged: {}", line.trim(), err);
                return None;
            }
        };

        let new_e = if extrusion.relative {
            if e < 0.0 {
                -value
            } else if e > 0.0 {
                value
            } else {
                return None;
            }
        } else {
            let Some(last) = extrusion.last_absolute_e else {
                debug!("Extruder position unknown, leaving '{}' unchanged", line.trim());
                return None;
            };
            if e < last {
                last - value
            } else {
                return None;
            }
        };

        let original = cmd.param('E').unwrap_or_default().to_string();
        cmd.set('E', format_extrusion(new_e));
        cmd.push_comment(&marker::tag(&format!(
            "retraction distance {} (was E{})",
            format_number(value, 3),
            original
        )));
        Some(cmd.to_line())
    }
}

/// Sets the feedrate of every retract and un-retract to the section's speed (mm/s).
pub struct RetractSpeedStrategy;

impl RewriteStrategy for RetractSpeedStrategy {
    fn rewrite_line(&mut self, line: &str, value: f64, _: &ExtrusionState) -> Option<String> {
        let mut cmd = GcodeLine::parse(line)?;
        if !is_retraction_command(&cmd) {
            return None;
        }
        if let Some(Err(err)) = cmd.number('F') {
            warn!("Leaving malformed retraction '{}' unchanged: {}", line.trim(), err);
            return None;
        }

        let original = cmd.param('F').unwrap_or_default().to_string();
        let feedrate = (value * 60.0).round();
        cmd.set('F', format_number(feedrate, 0));
        cmd.push_comment(&marker::tag(&format!(
            "retraction speed {} (was F{})",
            format_number(value, 3),
            original
        )));
        Some(cmd.to_line())
    }
}
