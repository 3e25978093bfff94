use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kind::ToweredParameterKind;
use crate::config::AutoTowersConfig;
use crate::error::{AutoTowersError, Result};
use crate::gcode::format_number;
use crate::height::Height;

/// Active machine/extruder settings, frozen when a tower is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    pub layer_height: Height,
    pub initial_layer_height: Height,
    pub line_width: f64,
    pub relative_extrusion: bool,
    /// Reference print speed in mm/s.
    pub print_speed: f64,
    /// Reference travel speed in mm/s.
    pub travel_speed: f64,
    pub retraction_enabled: bool,
    pub cooling_enabled: bool,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            layer_height: Height::from_mm(0.2),
            initial_layer_height: Height::from_mm(0.2),
            line_width: 0.4,
            relative_extrusion: false,
            print_speed: 50.0,
            travel_speed: 150.0,
            retraction_enabled: true,
            cooling_enabled: true,
        }
    }
}

/// A value passed to the CAD template as `-D name=value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeshParameter {
    Number(f64),
    Text(String),
}

/// Where the tower model comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MeshSource {
    /// Compile a CAD template with named parameters.
    Template {
        path: PathBuf,
        #[serde(default)]
        parameters: BTreeMap<String, MeshParameter>,
    },
    /// Use a prebuilt mesh from the preset library.
    Preset { name: String },
}

/// Values collected by the tower settings dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerRequest {
    pub kind: ToweredParameterKind,
    pub start_value: f64,
    #[serde(default)]
    pub end_value: Option<f64>,
    pub value_change: f64,
    pub base_height: Height,
    pub section_height: Height,
    #[serde(default)]
    pub reference_value: Option<f64>,
    #[serde(default)]
    pub display_on_lcd: Option<bool>,
    #[serde(default)]
    pub maintain_during_bridge: bool,
    #[serde(default)]
    pub mesh: Option<MeshSource>,
    #[serde(default)]
    pub machine: MachineSettings,
}

impl TowerRequest {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Give `change` the direction of travel from `start` to `end`.
///
/// Preset-driven runs have no end value, and an end equal to the start gives no
/// direction; in both cases the caller's sign is kept.
pub fn resolve_value_change(start: f64, end: Option<f64>, change: f64) -> f64 {
    match end {
        Some(end) if end > start => change.abs(),
        Some(end) if end < start => -change.abs(),
        _ => change,
    }
}

/// Immutable parameters of one calibration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerProfile {
    pub kind: ToweredParameterKind,
    pub start_value: f64,
    pub value_change: f64,
    pub base_height: Height,
    pub section_height: Height,
    pub initial_layer_height: Height,
    pub layer_height: Height,
    pub reference_value: Option<f64>,
    pub display_on_lcd: bool,
    pub maintain_during_bridge: bool,
    /// Extrusion mode in effect before the gcode selects one.
    pub relative_extrusion: bool,
    /// Synthetic blocks ahead of the first printed layer (header and start gcode).
    pub leading_blocks: usize,
}

impl TowerProfile {
    pub fn new(
        kind: ToweredParameterKind,
        start_value: f64,
        value_change: f64,
        base_height: Height,
        section_height: Height,
        layer_height: Height,
    ) -> Self {
        Self {
            kind,
            start_value,
            value_change,
            base_height,
            section_height,
            initial_layer_height: layer_height,
            layer_height,
            reference_value: None,
            display_on_lcd: true,
            maintain_during_bridge: false,
            relative_extrusion: false,
            leading_blocks: 2,
        }
    }

    pub fn with_initial_layer_height(mut self, height: Height) -> Self {
        self.initial_layer_height = height;
        self
    }

    pub fn with_reference_value(mut self, reference: f64) -> Self {
        self.reference_value = Some(reference);
        self
    }

    pub fn with_lcd(mut self, display: bool) -> Self {
        self.display_on_lcd = display;
        self
    }

    pub fn with_bridge_hold(mut self, maintain: bool) -> Self {
        self.maintain_during_bridge = maintain;
        self
    }

    pub fn with_relative_extrusion(mut self, relative: bool) -> Self {
        self.relative_extrusion = relative;
        self
    }

    pub fn with_leading_blocks(mut self, count: usize) -> Self {
        self.leading_blocks = count;
        self
    }

    /// Freeze a dialog request and the machine settings into a profile.
    pub fn from_request(request: &TowerRequest, config: &AutoTowersConfig) -> Result<Self> {
        let machine = &request.machine;
        let value_change =
            resolve_value_change(request.start_value, request.end_value, request.value_change);
        if value_change != request.value_change {
            debug!(
                "Corrected {} change from {} to {}",
                request.kind.parameter_name(),
                request.value_change,
                value_change
            );
        }

        let reference_value = match (request.reference_value, request.kind) {
            (Some(v), _) => Some(v),
            (None, ToweredParameterKind::PrintSpeed) => Some(machine.print_speed),
            (None, ToweredParameterKind::TravelSpeed) => Some(machine.travel_speed),
            (None, _) => None,
        };

        let profile = Self {
            kind: request.kind,
            start_value: request.start_value,
            value_change,
            base_height: request.base_height,
            section_height: request.section_height,
            initial_layer_height: machine.initial_layer_height,
            layer_height: machine.layer_height,
            reference_value,
            display_on_lcd: request.display_on_lcd.unwrap_or(config.display_on_lcd),
            maintain_during_bridge: request.maintain_during_bridge,
            relative_extrusion: machine.relative_extrusion,
            leading_blocks: config.leading_blocks,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Reject profiles that cannot be applied. Runs before any gcode is touched.
    pub fn validate(&self) -> Result<()> {
        if !self.layer_height.is_positive() {
            return Err(AutoTowersError::config(format!(
                "layer height must be positive, got {} mm",
                self.layer_height
            )));
        }
        if !self.initial_layer_height.is_positive() {
            return Err(AutoTowersError::config(format!(
                "initial layer height must be positive, got {} mm",
                self.initial_layer_height
            )));
        }
        if self.base_height < Height::ZERO {
            return Err(AutoTowersError::config(format!(
                "base height cannot be negative, got {} mm",
                self.base_height
            )));
        }
        if self.section_height < self.layer_height {
            return Err(AutoTowersError::config(format!(
                "section height {} mm is smaller than one {} mm layer",
                self.section_height, self.layer_height
            )));
        }
        if !self.start_value.is_finite() || !self.value_change.is_finite() {
            return Err(AutoTowersError::config("start and change values must be numbers"));
        }
        if self.value_change == 0.0 {
            return Err(AutoTowersError::config(format!(
                "{} change per section must not be zero",
                self.kind.parameter_name()
            )));
        }
        if self.kind.requires_reference() {
            match self.reference_value {
                Some(r) if r > 0.0 && r.is_finite() => {}
                Some(r) => {
                    return Err(AutoTowersError::config(format!(
                        "reference speed must be positive, got {}",
                        r
                    )))
                }
                None => {
                    return Err(AutoTowersError::config(format!(
                        "{} tower needs a reference speed",
                        self.kind
                    )))
                }
            }
        }
        if self.leading_blocks == 0 {
            return Err(AutoTowersError::config(
                "at least one leading block (the header) is required",
            ));
        }
        Ok(())
    }

    /// Parameter value printed in section `section` (0 is the first section above the base).
    pub fn value_at(&self, section: u32) -> f64 {
        self.start_value + section as f64 * self.value_change
    }

    /// Summary line written into the header block.
    pub fn summary_line(&self) -> String {
        let param = self.kind.parameter_name();
        format!(
            ";{} start {} = {}, {} change = {}",
            self.kind.tower_name(),
            param,
            format_number(self.start_value, 4),
            param,
            format_number(self.value_change, 4)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_profile() -> TowerProfile {
        TowerProfile::new(
            ToweredParameterKind::Temperature,
            220.0,
            -5.0,
            Height::from_mm(0.8),
            Height::from_mm(8.0),
            Height::from_mm(0.2),
        )
    }

    #[test]
    fn test_sign_correction() {
        assert_eq!(resolve_value_change(220.0, Some(180.0), 5.0), -5.0);
        assert_eq!(resolve_value_change(220.0, Some(180.0), -5.0), -5.0);
        assert_eq!(resolve_value_change(180.0, Some(220.0), -5.0), 5.0);
        assert_eq!(resolve_value_change(180.0, None, -5.0), -5.0);
        assert_eq!(resolve_value_change(200.0, Some(200.0), 5.0), 5.0);
    }

    #[test]
    fn test_value_at_section() {
        let p = temperature_profile();
        assert_eq!(p.value_at(0), 220.0);
        assert_eq!(p.value_at(1), 215.0);
        assert_eq!(p.value_at(8), 180.0);
    }

    #[test]
    fn test_validate_rejects_non_positive_layer_height() {
        let mut p = temperature_profile();
        p.layer_height = Height::ZERO;
        let err = p.validate().unwrap_err();
        assert!(matches!(err, AutoTowersError::Configuration(_)));
        assert!(err.to_string().contains("layer height"));
    }

    #[test]
    fn test_validate_requires_reference_for_speed() {
        let mut p = temperature_profile();
        p.kind = ToweredParameterKind::PrintSpeed;
        assert!(p.validate().is_err());
        let p = p.with_reference_value(60.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_change() {
        let mut p = temperature_profile();
        p.value_change = 0.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_summary_line() {
        let p = temperature_profile();
        assert_eq!(
            p.summary_line(),
            ";Temperature start temperature = 220, temperature change = -5"
        );
    }

    #[test]
    fn test_request_from_toml() {
        let toml = r#"
            kind = "temperature"
            start_value = 220
            end_value = 180
            value_change = 5
            base_height = 0.8
            section_height = 8.0

            [mesh]
            source = "preset"
            name = "temp_tower_pla"

            [machine]
            layer_height = 0.2
            initial_layer_height = 0.3
            relative_extrusion = true
        "#;
        let request = TowerRequest::from_toml(toml).unwrap();
        assert_eq!(
            request.mesh,
            Some(MeshSource::Preset {
                name: "temp_tower_pla".to_string()
            })
        );

        let profile = TowerProfile::from_request(&request, &AutoTowersConfig::default()).unwrap();
        assert_eq!(profile.value_change, -5.0);
        assert_eq!(profile.initial_layer_height, Height::from_mm(0.3));
        assert!(profile.relative_extrusion);
        assert!(profile.display_on_lcd);
        assert_eq!(profile.leading_blocks, 2);
    }

    #[test]
    fn test_speed_request_falls_back_to_machine_print_speed() {
        let toml = r#"
            kind = "print_speed"
            start_value = 40
            value_change = 10
            base_height = 0.8
            section_height = 8.0

            [machine]
            print_speed = 60
        "#;
        let request = TowerRequest::from_toml(toml).unwrap();
        let profile = TowerProfile::from_request(&request, &AutoTowersConfig::default()).unwrap();
        assert_eq!(profile.reference_value, Some(60.0));
    }

    #[test]
    fn test_travel_request_falls_back_to_machine_travel_speed() {
        let toml = r#"
            kind = "travel_speed"
            start_value = 150
            value_change = 25
            base_height = 0.8
            section_height = 8.0

            [machine]
            print_speed = 50
            travel_speed = 180
        "#;
        let request = TowerRequest::from_toml(toml).unwrap();
        let profile = TowerProfile::from_request(&request, &AutoTowersConfig::default()).unwrap();
        assert_eq!(
            profile.reference_value,
            Some(180.0),
            "travel moves scale against travel speed"
        );
    }

    #[test]
    fn test_template_mesh_parameters() {
        let toml = r#"
            kind = "fan_speed"
            start_value = 0
            value_change = 20
            base_height = 0.8
            section_height = 8.0

            [mesh]
            source = "template"
            path = "fan_tower.scad"

            [mesh.parameters]
            Starting_Value = 0
            Tower_Label = "PLA"
        "#;
        let request = TowerRequest::from_toml(toml).unwrap();
        match request.mesh {
            Some(MeshSource::Template { path, parameters }) => {
                assert_eq!(path, PathBuf::from("fan_tower.scad"));
                assert_eq!(parameters["Starting_Value"], MeshParameter::Number(0.0));
                assert_eq!(parameters["Tower_Label"], MeshParameter::Text("PLA".to_string()));
            }
            other => panic!("expected template mesh, got {:?}", other),
        }
    }
}
