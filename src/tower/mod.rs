pub mod kind;
pub mod profile;

pub use kind::ToweredParameterKind;
pub use profile::{
    resolve_value_change, MachineSettings, MeshParameter, MeshSource, TowerProfile, TowerRequest,
};
