//! Layered gcode document.
//!
//! Block layout: `0` header comments, `1` start gcode, `2..n-1` one block per
//! printed layer, `n-1` end gcode. Post-processing never changes the number of
//! blocks or their order.

use super::classify::LAYER_MARKER;

const TIME_ELAPSED_MARKER: &str = ";TIME_ELAPSED:";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GcodeDocument {
    blocks: Vec<String>,
}

impl GcodeDocument {
    pub fn new(blocks: Vec<String>) -> Self {
        Self { blocks }
    }

    /// Split a whole gcode file into header, start, per-layer and end blocks.
    ///
    /// The header is the run of comment and blank lines at the top of the file.
    /// Each `;LAYER:` line opens a layer block. The end block begins after the
    /// last `;TIME_ELAPSED:` line of the final layer, or is empty when the final
    /// layer carries no such line.
    pub fn from_gcode_text(text: &str) -> Self {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();

        let header_len = lines
            .iter()
            .take_while(|l| {
                let t = l.trim();
                t.is_empty() || t.starts_with(';')
            })
            .count();

        let layer_starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .skip(header_len)
            .filter(|(_, l)| l.trim_start().starts_with(LAYER_MARKER))
            .map(|(i, _)| i)
            .collect();

        let join = |range: &[&str]| range.concat();
        let mut blocks = vec![join(&lines[..header_len])];

        let Some(&first_layer) = layer_starts.first() else {
            blocks.push(join(&lines[header_len..]));
            blocks.push(String::new());
            return Self { blocks };
        };
        blocks.push(join(&lines[header_len..first_layer]));

        for pair in layer_starts.windows(2) {
            blocks.push(join(&lines[pair[0]..pair[1]]));
        }

        let last_start = layer_starts[layer_starts.len() - 1];
        let last_layer = &lines[last_start..];
        let end_at = last_layer
            .iter()
            .rposition(|l| l.trim_start().starts_with(TIME_ELAPSED_MARKER))
            .map_or(last_layer.len(), |i| i + 1);
        blocks.push(join(&last_layer[..end_at]));
        blocks.push(join(&last_layer[end_at..]));

        Self { blocks }
    }

    pub fn to_gcode_text(&self) -> String {
        self.blocks.concat()
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<String> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of printed-layer blocks, given the count of synthetic leading blocks.
    pub fn layer_count(&self, leading_blocks: usize) -> usize {
        self.blocks.len().saturating_sub(leading_blocks + 1)
    }
}

impl From<Vec<String>> for GcodeDocument {
    fn from(blocks: Vec<String>) -> Self {
        Self::new(blocks)
    }
}
