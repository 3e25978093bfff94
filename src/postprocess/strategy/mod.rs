//! Per-tower rewrite strategies.
//!
//! Every strategy sees the lines of the layers inside tower sections, in
//! document order, with the value of the current section. Lines already
//! carrying the marker never reach a strategy.

mod fan;
mod retract;
mod speed;

pub use fan::FanSpeedStrategy;
pub use retract::{RetractDistanceStrategy, RetractSpeedStrategy};
pub use speed::SpeedScaleStrategy;

use super::extrusion::ExtrusionState;
use crate::gcode::marker;
use crate::tower::{ToweredParameterKind, TowerProfile};

pub trait RewriteStrategy {
    /// Rewrite one line inside a section. `None` keeps the line as the slicer wrote it.
    fn rewrite_line(&mut self, line: &str, value: f64, extrusion: &ExtrusionState)
        -> Option<String>;
}

/// Strategy for kinds that only insert a command at each section start.
pub struct InsertOnly;

impl RewriteStrategy for InsertOnly {
    fn rewrite_line(&mut self, _: &str, _: f64, _: &ExtrusionState) -> Option<String> {
        None
    }
}

pub fn strategy_for(profile: &TowerProfile) -> Box<dyn RewriteStrategy> {
    match profile.kind {
        ToweredParameterKind::FanSpeed => {
            Box::new(FanSpeedStrategy::new(profile.maintain_during_bridge))
        }
        ToweredParameterKind::RetractDistance => Box::new(RetractDistanceStrategy),
        ToweredParameterKind::RetractSpeed => Box::new(RetractSpeedStrategy),
        ToweredParameterKind::PrintSpeed | ToweredParameterKind::TravelSpeed => {
            // Validation guarantees a reference for speed towers.
            let reference = profile.reference_value.unwrap_or(1.0);
            Box::new(SpeedScaleStrategy::new(profile.kind, reference))
        }
        ToweredParameterKind::Temperature
        | ToweredParameterKind::Flow
        | ToweredParameterKind::Acceleration
        | ToweredParameterKind::Jerk
        | ToweredParameterKind::Junction
        | ToweredParameterKind::LinearAdvance
        | ToweredParameterKind::PressureAdvance => Box::new(InsertOnly),
    }
}

/// Lines inserted after the layer marker of a section's first layer:
/// the firmware command, if the kind has one, then the LCD message.
pub fn section_start_lines(profile: &TowerProfile, value: f64) -> Vec<String> {
    let kind = profile.kind;
    let display = kind.display_value(value);
    let mut lines = Vec::with_capacity(2);
    if let Some(command) = kind.section_command(value) {
        lines.push(marker::tagged(
            &command,
            &format!("{} {}", kind.parameter_name(), display),
        ));
    }
    if profile.display_on_lcd {
        lines.push(marker::tagged(
            &format!("M117 {} {}", kind.lcd_label(), display),
            "",
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height::Height;

    fn profile(kind: ToweredParameterKind) -> TowerProfile {
        TowerProfile::new(
            kind,
            220.0,
            -5.0,
            Height::from_mm(0.8),
            Height::from_mm(8.0),
            Height::from_mm(0.2),
        )
    }

    #[test]
    fn test_section_start_lines_with_lcd() {
        let lines = section_start_lines(&profile(ToweredParameterKind::Temperature), 215.0);
        assert_eq!(
            lines,
            vec![
                "M104 S215 ;AutoTowersGenerator temperature 215".to_string(),
                "M117 TMP 215 ;AutoTowersGenerator".to_string(),
            ]
        );
    }

    #[test]
    fn test_section_start_lines_without_lcd() {
        let p = profile(ToweredParameterKind::PressureAdvance).with_lcd(false);
        let lines = section_start_lines(&p, 0.04);
        assert_eq!(
            lines,
            vec!["M572 D0 S0.040 ;AutoTowersGenerator pressure advance 0.040".to_string()]
        );
    }

    #[test]
    fn test_rewrite_only_kind_inserts_lcd_alone() {
        let lines = section_start_lines(&profile(ToweredParameterKind::RetractDistance), 2.0);
        assert_eq!(lines, vec!["M117 DST 2 ;AutoTowersGenerator".to_string()]);
    }

    #[test]
    fn test_insert_only_never_rewrites() {
        let state = ExtrusionState {
            relative: true,
            last_absolute_e: None,
        };
        let mut strategy = strategy_for(&profile(ToweredParameterKind::Temperature));
        assert!(strategy.rewrite_line("M104 S200", 215.0, &state).is_none());
        assert!(strategy.rewrite_line("G1 F1800 E-1", 215.0, &state).is_none());
    }
}
