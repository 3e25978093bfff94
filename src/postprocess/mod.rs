//! Gcode post-processing for calibration towers.
//!
//! [`post_process`] walks the document once, front to back. Header and start
//! blocks only feed the extrusion tracker, base layers pass through, layers in
//! a tower section go through the kind's [`strategy::RewriteStrategy`], and the
//! end block is only prefixed with the completion line. Output is built into
//! fresh blocks so insertions never shift the lines still being read.

pub mod extrusion;
pub mod segmenter;
pub mod strategy;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AutoTowersError, Result};
use crate::gcode::classify::is_layer_start;
use crate::gcode::marker::{self, COMPLETION_LINE};
use crate::gcode::GcodeDocument;
use crate::tower::TowerProfile;

use extrusion::ExtrusionTracker;
use segmenter::{LayerPosition, LayerSegmenter};
use strategy::{section_start_lines, strategy_for, RewriteStrategy};

pub use extrusion::ExtrusionState;

/// Counters from one post-processing pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostProcessStats {
    pub layers: usize,
    pub sections: u32,
    pub inserted_lines: usize,
    pub rewritten_lines: usize,
    pub already_processed: bool,
}

/// Apply `profile` to a freshly sliced document.
///
/// Configuration errors are reported before anything is touched. Running this
/// on its own output returns the document unchanged.
pub fn post_process(document: GcodeDocument, profile: &TowerProfile) -> Result<GcodeDocument> {
    post_process_with_stats(document, profile).map(|(doc, _)| doc)
}

pub fn post_process_with_stats(
    document: GcodeDocument,
    profile: &TowerProfile,
) -> Result<(GcodeDocument, PostProcessStats)> {
    profile.validate()?;
    let mut segmenter = LayerSegmenter::new(profile)?;

    let leading = profile.leading_blocks;
    if document.len() < leading + 1 || document.blocks().iter().all(|b| b.trim().is_empty()) {
        return Err(AutoTowersError::EmptyDocument);
    }

    let mut stats = PostProcessStats::default();
    if marker::block_is_processed(&document.blocks()[0]) {
        info!("Gcode already post-processed for a tower, leaving it unchanged");
        stats.already_processed = true;
        return Ok((document, stats));
    }

    let mut tracker = ExtrusionTracker::new(profile.relative_extrusion);
    let mut strategy = strategy_for(profile);
    let blocks = document.into_blocks();
    let last = blocks.len() - 1;
    let mut output = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.into_iter().enumerate() {
        if index == last {
            output.push(format!("{}{}{}", COMPLETION_LINE, line_ending(&block), block));
        } else if index < leading {
            tracker.observe_block(&block);
            if index == 0 {
                output.push(append_summary(block, profile));
            } else {
                output.push(block);
            }
        } else {
            let position = segmenter.advance(index);
            stats.layers += 1;
            output.push(rewrite_layer(
                block,
                &position,
                profile,
                &mut tracker,
                strategy.as_mut(),
                &mut stats,
            ));
        }
    }
    stats.sections = segmenter.sections_started();

    info!(
        "Post-processed {} tower: {} layers, {} sections, {} lines inserted, {} rewritten",
        profile.kind, stats.layers, stats.sections, stats.inserted_lines, stats.rewritten_lines
    );
    Ok((GcodeDocument::new(output), stats))
}

/// Line ending used for lines added to `block`.
fn line_ending(block: &str) -> &'static str {
    if block.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn append_summary(mut header: String, profile: &TowerProfile) -> String {
    let newline = line_ending(&header);
    if !header.is_empty() && !header.ends_with('\n') {
        header.push_str(newline);
    }
    header.push_str(&marker::tag(&format!("{} tower", profile.kind)));
    header.push_str(newline);
    header.push_str(&profile.summary_line());
    header.push_str(newline);
    header
}

fn rewrite_layer(
    block: String,
    position: &LayerPosition,
    profile: &TowerProfile,
    tracker: &mut ExtrusionTracker,
    strategy: &mut dyn RewriteStrategy,
    stats: &mut PostProcessStats,
) -> String {
    let Some(section) = position.section else {
        tracker.observe_block(&block);
        return block;
    };
    let value = profile.value_at(section);

    let mut pending = if position.section_start {
        debug!(
            "Block {}: {} = {} from {} mm",
            position.block_index,
            profile.kind.parameter_name(),
            profile.kind.display_value(value),
            position.cumulative_height
        );
        section_start_lines(profile, value)
    } else {
        Vec::new()
    };

    let newline = line_ending(&block);
    let mut out = String::with_capacity(block.len() + 128);
    if !pending.is_empty() && !block.lines().any(is_layer_start) {
        // No marker to anchor on: the insertion opens the layer.
        emit_lines(&mut out, &mut pending, newline, stats);
    }

    for raw in block.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\r', '\n']);
        let ending = &raw[line.len()..];
        if marker::is_processed(line) {
            out.push_str(raw);
            continue;
        }

        let state = tracker.state();
        match strategy.rewrite_line(line, value, &state) {
            Some(rewritten) => {
                out.push_str(&rewritten);
                stats.rewritten_lines += 1;
            }
            None => out.push_str(line),
        }
        out.push_str(ending);
        tracker.observe(line);

        if !pending.is_empty() && is_layer_start(line) {
            if ending.is_empty() {
                out.push_str(newline);
                emit_lines(&mut out, &mut pending, newline, stats);
                out.truncate(out.len() - newline.len());
            } else {
                emit_lines(&mut out, &mut pending, newline, stats);
            }
        }
    }
    out
}

fn emit_lines(
    out: &mut String,
    lines: &mut Vec<String>,
    newline: &str,
    stats: &mut PostProcessStats,
) {
    for line in lines.drain(..) {
        out.push_str(&line);
        out.push_str(newline);
        stats.inserted_lines += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height::Height;
    use crate::tower::ToweredParameterKind;

    fn profile() -> TowerProfile {
        TowerProfile::new(
            ToweredParameterKind::Temperature,
            220.0,
            -5.0,
            Height::from_mm(0.4),
            Height::from_mm(0.4),
            Height::from_mm(0.2),
        )
    }

    fn document(layers: usize) -> GcodeDocument {
        let mut blocks = vec![";FLAVOR:Marlin\n".to_string(), "M82\nG92 E0\n".to_string()];
        for i in 0..layers {
            blocks.push(format!(";LAYER:{}\nG1 X1 Y1 E{}\n", i, i + 1));
        }
        blocks.push("M104 S0\n".to_string());
        GcodeDocument::new(blocks)
    }

    #[test]
    fn test_inserts_after_layer_marker() {
        let out = post_process(document(4), &profile().with_lcd(false)).unwrap();
        assert_eq!(out.blocks()[2], ";LAYER:0\nG1 X1 Y1 E1\n");
        assert_eq!(
            out.blocks()[4],
            ";LAYER:2\nM104 S220 ;AutoTowersGenerator temperature 220\nG1 X1 Y1 E3\n"
        );
        assert!(out.blocks()[5].starts_with(";LAYER:3\nG1"));
    }

    #[test]
    fn test_layer_without_marker_gets_insertion_first() {
        let mut blocks = document(3).into_blocks();
        blocks[4] = "G1 X1 Y1 E3\n".to_string();
        let out = post_process(GcodeDocument::new(blocks), &profile()).unwrap();
        assert_eq!(
            out.blocks()[4],
            "M104 S220 ;AutoTowersGenerator temperature 220\nM117 TMP 220 ;AutoTowersGenerator\nG1 X1 Y1 E3\n"
        );
    }

    #[test]
    fn test_header_and_end_blocks() {
        let out = post_process(document(3), &profile()).unwrap();
        assert_eq!(
            out.blocks()[0],
            ";FLAVOR:Marlin\n;AutoTowersGenerator Temperature tower\n;Temperature start temperature = 220, temperature change = -5\n"
        );
        assert_eq!(out.blocks()[1], "M82\nG92 E0\n");
        assert_eq!(
            out.blocks()[5],
            ";AutoTowersGenerator post-processing complete\nM104 S0\n"
        );
    }

    #[test]
    fn test_second_pass_is_noop() {
        let once = post_process(document(8), &profile()).unwrap();
        let (twice, stats) = post_process_with_stats(once.clone(), &profile()).unwrap();
        assert_eq!(once, twice);
        assert!(stats.already_processed);
    }

    #[test]
    fn test_empty_document_fails_closed() {
        let err = post_process(GcodeDocument::default(), &profile()).unwrap_err();
        assert!(matches!(err, AutoTowersError::EmptyDocument));
        let blank = GcodeDocument::new(vec![String::new(), String::new(), String::new()]);
        assert!(matches!(
            post_process(blank, &profile()),
            Err(AutoTowersError::EmptyDocument)
        ));
    }

    #[test]
    fn test_configuration_error_before_processing() {
        let mut p = profile();
        p.layer_height = Height::ZERO;
        assert!(matches!(
            post_process(document(3), &p),
            Err(AutoTowersError::Configuration(_))
        ));
    }

    #[test]
    fn test_crlf_line_endings_are_kept() {
        let blocks: Vec<String> = document(4)
            .into_blocks()
            .into_iter()
            .map(|b| b.replace('\n', "\r\n"))
            .collect();
        let out = post_process(GcodeDocument::new(blocks), &profile()).unwrap();
        assert_eq!(
            out.blocks()[4],
            ";LAYER:2\r\n\
             M104 S220 ;AutoTowersGenerator temperature 220\r\n\
             M117 TMP 220 ;AutoTowersGenerator\r\n\
             G1 X1 Y1 E3\r\n"
        );
        assert!(!out.to_gcode_text().replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_stats() {
        let (_, stats) = post_process_with_stats(document(6), &profile()).unwrap();
        assert_eq!(stats.layers, 6);
        // Sections start at layers 2 and 4 (0.6 mm > 0.4 mm, 1.0 mm > 0.8 mm).
        assert_eq!(stats.sections, 2);
        assert_eq!(stats.inserted_lines, 4);
        assert_eq!(stats.rewritten_lines, 0);
    }
}
