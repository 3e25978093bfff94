//! Line classifier.
//!
//! Stateless predicates over a single line. Comment-only lines never match a
//! command predicate, and letters inside a trailing comment are not parameters.

use super::line::GcodeLine;
use super::marker;

/// Layer-start marker written by the slicer at the top of every layer block.
pub const LAYER_MARKER: &str = ";LAYER:";

/// Structural comment emitted ahead of bridge extrusions.
pub const BRIDGE_MARKER: &str = ";BRIDGE";

fn command(line: &str) -> Option<GcodeLine> {
    GcodeLine::parse(line)
}

/// `M106` with an `S` value.
pub fn is_fan_speed(line: &str) -> bool {
    command(line).map_or(false, |c| c.is("M106") && c.has('S'))
}

/// `M107`.
pub fn is_fan_off(line: &str) -> bool {
    command(line).map_or(false, |c| c.is("M107"))
}

pub fn is_bridge_start(line: &str) -> bool {
    line.trim_start().starts_with(BRIDGE_MARKER)
}

pub fn is_layer_start(line: &str) -> bool {
    line.trim_start().starts_with(LAYER_MARKER)
}

/// Retract or un-retract: `G1` with `F` and `E` and no `X`, `Y` or `Z`.
pub fn is_retraction(line: &str) -> bool {
    command(line).map_or(false, |c| is_retraction_command(&c))
}

pub fn is_retraction_command(c: &GcodeLine) -> bool {
    c.is("G1") && c.has('F') && c.has('E') && !c.has('X') && !c.has('Y') && !c.has('Z')
}

/// `G0`/`G1` moving in `X` and `Y` while extruding.
pub fn is_extrusion(line: &str) -> bool {
    command(line).map_or(false, |c| is_extrusion_command(&c))
}

pub fn is_extrusion_command(c: &GcodeLine) -> bool {
    (c.is("G1") || c.is("G0")) && c.has('X') && c.has('Y') && c.has('E')
}

/// `G0`/`G1` with a feedrate and an `X`/`Y` move.
pub fn is_speed_move(line: &str) -> bool {
    command(line).map_or(false, |c| is_speed_move_command(&c))
}

pub fn is_speed_move_command(c: &GcodeLine) -> bool {
    (c.is("G1") || c.is("G0")) && c.has('F') && c.has('X') && c.has('Y')
}

/// `G91` or `M83`.
pub fn is_relative_mode(line: &str) -> bool {
    command(line).map_or(false, |c| c.is("G91") || c.is("M83"))
}

/// `G90` or `M82`.
pub fn is_absolute_mode(line: &str) -> bool {
    command(line).map_or(false, |c| c.is("G90") || c.is("M82"))
}

/// `G92` carrying an `E` reset.
pub fn is_reset_extruder(line: &str) -> bool {
    command(line).map_or(false, |c| c.is("G92") && c.has('E'))
}

pub fn is_already_processed(line: &str) -> bool {
    marker::is_processed(line)
}
