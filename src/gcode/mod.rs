pub mod classify;
pub mod document;
pub mod line;
pub mod marker;

pub use document::GcodeDocument;
pub use line::{format_extrusion, format_number, GcodeLine};
pub use marker::MARKER;
