//! Settings-changed report shown to the user after a tower is set up.

use serde::Serialize;

use crate::gcode::format_number;
use crate::tower::{MachineSettings, ToweredParameterKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingChange {
    pub label: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsReport {
    pub changes: Vec<SettingChange>,
}

fn on_off(value: bool) -> String {
    if value { "On" } else { "Off" }.to_string()
}

/// Host settings as (label, display value) pairs, in a stable order.
fn entries(settings: &MachineSettings) -> Vec<(&'static str, String)> {
    vec![
        ("Layer Height", format!("{} mm", settings.layer_height)),
        (
            "Initial Layer Height",
            format!("{} mm", settings.initial_layer_height),
        ),
        ("Line Width", format!("{} mm", format_number(settings.line_width, 3))),
        ("Relative Extrusion", on_off(settings.relative_extrusion)),
        (
            "Print Speed",
            format!("{} mm/s", format_number(settings.print_speed, 2)),
        ),
        (
            "Travel Speed",
            format!("{} mm/s", format_number(settings.travel_speed, 2)),
        ),
        ("Enable Retraction", on_off(settings.retraction_enabled)),
        ("Enable Print Cooling", on_off(settings.cooling_enabled)),
    ]
}

/// Host settings a tower needs in order to print what it sweeps.
///
/// Retraction towers are meaningless with retraction off, and a fan tower
/// needs part cooling enabled.
pub fn with_tower_overrides(
    settings: &MachineSettings,
    kind: ToweredParameterKind,
) -> MachineSettings {
    let mut out = settings.clone();
    match kind {
        ToweredParameterKind::RetractDistance | ToweredParameterKind::RetractSpeed => {
            out.retraction_enabled = true;
        }
        ToweredParameterKind::FanSpeed => out.cooling_enabled = true,
        _ => {}
    }
    out
}

impl SettingsReport {
    /// Every setting whose displayed value differs between `before` and `after`.
    pub fn between(before: &MachineSettings, after: &MachineSettings) -> Self {
        let changes = entries(before)
            .into_iter()
            .zip(entries(after))
            .filter(|((_, old), (_, new))| old != new)
            .map(|((label, old), (_, new))| SettingChange {
                label: label.to_string(),
                old_value: old,
                new_value: new,
            })
            .collect();
        Self { changes }
    }

    /// The same changes, undone.
    pub fn restored(&self) -> Self {
        Self {
            changes: self
                .changes
                .iter()
                .map(|c| SettingChange {
                    label: c.label.clone(),
                    old_value: c.new_value.clone(),
                    new_value: c.old_value.clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// One line per change, e.g. `Enable Retraction: Off -> On`.
    pub fn to_message(&self) -> String {
        self.changes
            .iter()
            .map(|c| format!("{}: {} -> {}", c.label, c.old_value, c.new_value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
