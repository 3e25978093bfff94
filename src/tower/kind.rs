use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gcode::format_number;

/// The print parameter a tower sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToweredParameterKind {
    Temperature,
    FanSpeed,
    RetractDistance,
    RetractSpeed,
    Flow,
    PrintSpeed,
    TravelSpeed,
    Acceleration,
    Jerk,
    Junction,
    LinearAdvance,
    PressureAdvance,
}

impl ToweredParameterKind {
    pub const ALL: [ToweredParameterKind; 12] = [
        ToweredParameterKind::Temperature,
        ToweredParameterKind::FanSpeed,
        ToweredParameterKind::RetractDistance,
        ToweredParameterKind::RetractSpeed,
        ToweredParameterKind::Flow,
        ToweredParameterKind::PrintSpeed,
        ToweredParameterKind::TravelSpeed,
        ToweredParameterKind::Acceleration,
        ToweredParameterKind::Jerk,
        ToweredParameterKind::Junction,
        ToweredParameterKind::LinearAdvance,
        ToweredParameterKind::PressureAdvance,
    ];

    /// Tower name used in the document summary (`;<name> start ...`).
    pub fn tower_name(self) -> &'static str {
        match self {
            ToweredParameterKind::Temperature => "Temperature",
            ToweredParameterKind::FanSpeed => "FanSpeed",
            ToweredParameterKind::RetractDistance => "RetractDistance",
            ToweredParameterKind::RetractSpeed => "RetractSpeed",
            ToweredParameterKind::Flow => "Flow",
            ToweredParameterKind::PrintSpeed => "PrintSpeed",
            ToweredParameterKind::TravelSpeed => "TravelSpeed",
            ToweredParameterKind::Acceleration => "Acceleration",
            ToweredParameterKind::Jerk => "Jerk",
            ToweredParameterKind::Junction => "Junction",
            ToweredParameterKind::LinearAdvance => "LinearAdvance",
            ToweredParameterKind::PressureAdvance => "PressureAdvance",
        }
    }

    /// Lower-case parameter name used in summaries and rewrite comments.
    pub fn parameter_name(self) -> &'static str {
        match self {
            ToweredParameterKind::Temperature => "temperature",
            ToweredParameterKind::FanSpeed => "fan percent",
            ToweredParameterKind::RetractDistance => "retraction distance",
            ToweredParameterKind::RetractSpeed => "retraction speed",
            ToweredParameterKind::Flow => "flow rate",
            ToweredParameterKind::PrintSpeed => "print speed",
            ToweredParameterKind::TravelSpeed => "travel speed",
            ToweredParameterKind::Acceleration => "acceleration",
            ToweredParameterKind::Jerk => "jerk",
            ToweredParameterKind::Junction => "junction deviation",
            ToweredParameterKind::LinearAdvance => "linear advance",
            ToweredParameterKind::PressureAdvance => "pressure advance",
        }
    }

    /// Short label for `M117` messages; printer displays are narrow.
    pub fn lcd_label(self) -> &'static str {
        match self {
            ToweredParameterKind::Temperature => "TMP",
            ToweredParameterKind::FanSpeed => "FAN",
            ToweredParameterKind::RetractDistance => "DST",
            ToweredParameterKind::RetractSpeed => "RTS",
            ToweredParameterKind::Flow => "FLW",
            ToweredParameterKind::PrintSpeed => "SPD",
            ToweredParameterKind::TravelSpeed => "TRV",
            ToweredParameterKind::Acceleration => "ACC",
            ToweredParameterKind::Jerk => "JRK",
            ToweredParameterKind::Junction => "JD",
            ToweredParameterKind::LinearAdvance => "LA",
            ToweredParameterKind::PressureAdvance => "PA",
        }
    }

    /// Speed towers rescale slicer feedrates relative to this reference.
    pub fn requires_reference(self) -> bool {
        matches!(
            self,
            ToweredParameterKind::PrintSpeed | ToweredParameterKind::TravelSpeed
        )
    }

    /// Firmware command inserted at each section start, for kinds that insert one.
    ///
    /// Kinds that rewrite existing moves (retraction, print and travel speed)
    /// return `None`.
    pub fn section_command(self, value: f64) -> Option<String> {
        let cmd = match self {
            ToweredParameterKind::Temperature => format!("M104 S{}", format_number(value, 3)),
            ToweredParameterKind::FanSpeed => format!("M106 S{}", fan_duty(value)),
            ToweredParameterKind::Flow => format!("M221 S{}", format_number(value, 3)),
            ToweredParameterKind::Acceleration => format!("M204 S{}", format_number(value, 3)),
            ToweredParameterKind::Jerk => {
                let v = format_number(value, 3);
                format!("M205 X{} Y{}", v, v)
            }
            ToweredParameterKind::Junction => format!("M205 J{:.3}", value),
            ToweredParameterKind::LinearAdvance => format!("M900 K{:.3}", value),
            ToweredParameterKind::PressureAdvance => format!("M572 D0 S{:.3}", value),
            ToweredParameterKind::RetractDistance
            | ToweredParameterKind::RetractSpeed
            | ToweredParameterKind::PrintSpeed
            | ToweredParameterKind::TravelSpeed => return None,
        };
        Some(cmd)
    }

    /// Value formatting used in LCD messages and summaries.
    pub fn display_value(self, value: f64) -> String {
        match self {
            ToweredParameterKind::Junction
            | ToweredParameterKind::LinearAdvance
            | ToweredParameterKind::PressureAdvance => format!("{:.3}", value),
            _ => format_number(value, 3),
        }
    }
}

/// Fan percentage to the 0-255 PWM scale used by `M106`.
pub fn fan_duty(percent: f64) -> u8 {
    (percent * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for ToweredParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tower_name())
    }
}
