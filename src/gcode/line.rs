//! Gcode line tokenizer.
//!
//! A command line is split into a verb (`G1`, `M106` ...), an ordered list of
//! letter parameters and an optional trailing comment. Rewrites go through
//! [`GcodeLine::set`] and [`GcodeLine::to_line`], so a value is replaced in
//! exactly one token and every other token keeps its original text and order.

use std::num::ParseFloatError;

/// One `<letter><value>` word of a command, value kept as written.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub letter: char,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GcodeLine {
    verb: String,
    params: Vec<Param>,
    comment: Option<String>,
}

impl GcodeLine {
    /// Tokenize a raw line. Blank lines and comment-only lines yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            return None;
        }

        let (code, comment) = match trimmed.find(';') {
            Some(idx) => (&trimmed[..idx], Some(trimmed[idx..].trim_end().to_string())),
            None => (trimmed, None),
        };

        let mut words = code.split_whitespace();
        let verb = words.next()?.to_ascii_uppercase();
        let params = words
            .filter_map(|word| {
                let mut chars = word.chars();
                let letter = chars.next()?;
                Some(Param {
                    letter: letter.to_ascii_uppercase(),
                    value: chars.as_str().to_string(),
                })
            })
            .collect();

        Some(Self {
            verb,
            params,
            comment,
        })
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn is(&self, verb: &str) -> bool {
        self.verb.eq_ignore_ascii_case(verb)
    }

    pub fn has(&self, letter: char) -> bool {
        self.params.iter().any(|p| p.letter == letter)
    }

    /// Raw text following `letter`, if the parameter is present.
    pub fn param(&self, letter: char) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.letter == letter)
            .map(|p| p.value.as_str())
    }

    /// Numeric value of `letter`. `None` when absent, `Some(Err)` when malformed.
    pub fn number(&self, letter: char) -> Option<Result<f64, ParseFloatError>> {
        self.param(letter).map(|v| v.parse::<f64>())
    }

    /// Replace the value of the first `letter` parameter. Returns false when absent.
    pub fn set(&mut self, letter: char, value: String) -> bool {
        match self.params.iter_mut().find(|p| p.letter == letter) {
            Some(param) => {
                param.value = value;
                true
            }
            None => false,
        }
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Append a comment after any existing one.
    pub fn push_comment(&mut self, comment: &str) {
        self.comment = Some(match self.comment.take() {
            Some(existing) => format!("{} {}", existing, comment),
            None => comment.to_string(),
        });
    }

    /// Serialize back to a single line of text (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut out = self.verb.clone();
        for param in &self.params {
            out.push(' ');
            out.push(param.letter);
            out.push_str(&param.value);
        }
        if let Some(comment) = &self.comment {
            out.push(' ');
            out.push_str(comment);
        }
        out
    }
}

/// Format with at most `decimals` digits, dropping trailing zeros.
///
/// `220.0` becomes `220`, `0.0450` becomes `0.045`, and negative zero prints as `0`.
pub fn format_number(value: f64, decimals: usize) -> String {
    let mut s = format!("{:.*}", decimals, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Extruder axis values are always written with five decimals, as slicers do.
pub fn format_extrusion(value: f64) -> String {
    let s = format!("{:.5}", value);
    if s == "-0.00000" {
        "0.00000".to_string()
    } else {
        s
    }
}
