//! Idempotence marker carried by every line this crate writes or rewrites.

/// Comment tag appended to inserted and rewritten lines.
pub const MARKER: &str = ";AutoTowersGenerator";

/// Prefixed to the end-gcode block once the document has been processed.
pub const COMPLETION_LINE: &str = ";AutoTowersGenerator post-processing complete";

pub fn is_processed(line: &str) -> bool {
    line.contains(MARKER)
}

pub fn block_is_processed(block: &str) -> bool {
    block.lines().any(is_processed)
}

/// Build the marker comment with a short description, e.g. `;AutoTowersGenerator M104 S215`.
pub fn tag(description: &str) -> String {
    if description.is_empty() {
        MARKER.to_string()
    } else {
        format!("{} {}", MARKER, description)
    }
}

/// Append the marker to a command line that has no comment of its own.
pub fn tagged(command: &str, description: &str) -> String {
    format!("{} {}", command, tag(description))
}
