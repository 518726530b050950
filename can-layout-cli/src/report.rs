//! Text and JSON output, plus payload parsing
//!
//! Payloads are given as hex strings. Separators (spaces, `:`, `-`, `.`) and an
//! optional `0x` prefix are accepted. Frame files hold one frame per line in
//! `ID#PAYLOAD` or `ID PAYLOAD` form; blank lines and `#` comments are skipped.

use anyhow::{bail, Context, Result};
use can_layout::{Message, MultiplexedLayerRef, SignalDecoding, SignalLayoutRef};
use serde::Serialize;
use std::fmt::Write;

/// Parse a hex payload such as `01 0C FF` or `010CFF`
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let digits: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '.' | '\t'))
        .collect();

    if !digits.is_ascii() {
        bail!("Non-hex characters in payload {:?}", input);
    }
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits in payload {:?}", input);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

fn parse_can_id(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(hex, 16).with_context(|| format!("Invalid CAN id {:?}", input))
}

/// Parse one line of a frame file; `None` for blank lines and comments
pub fn parse_frame_line(line: &str) -> Result<Option<(u32, Vec<u8>)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (id, payload) = line
        .split_once('#')
        .or_else(|| line.split_once(char::is_whitespace))
        .with_context(|| format!("Expected ID#PAYLOAD, got {:?}", line))?;
    Ok(Some((parse_can_id(id)?, parse_hex(payload)?)))
}

pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One decoded frame as printed by the CLI
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub message: String,
    pub can_id: u32,
    pub payload: String,
    pub signals: Vec<SignalDecoding>,
}

impl FrameReport {
    pub fn new(message: &Message, data: &[u8]) -> Self {
        Self {
            message: message.name().to_string(),
            can_id: message.can_id(),
            payload: format_hex(data),
            signals: message.decode(data),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("{} (0x{:X}) [{}]\n", self.message, self.can_id, self.payload);
        for decoding in &self.signals {
            let _ = writeln!(out, "  {:<24} {:>16}  raw {}", decoding.name, value_text(decoding), decoding.raw_value);
        }
        out
    }
}

fn value_text(decoding: &SignalDecoding) -> String {
    match &decoding.unit {
        Some(unit) => format!("{} {}", decoding.value, unit),
        None => decoding.value.to_string(),
    }
}

/// Print reports as text or as a JSON array
pub fn render_frames(reports: &[FrameReport], json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(reports).context("Failed to serialize decodings");
    }
    Ok(reports.iter().map(FrameReport::to_text).collect::<Vec<_>>().join("\n"))
}

/// Tree view of a message's layouts and layers
pub fn describe_message(message: &Message) -> String {
    let mut out = format!("{}\n", message);
    describe_layout(&mut out, message.layout(), 1);
    out
}

fn describe_layout(out: &mut String, layout: SignalLayoutRef<'_>, depth: usize) {
    let indent = "  ".repeat(depth);
    let layers = layout.multiplexed_layers();
    for signal in layout.signals() {
        if signal.is_muxor() {
            continue;
        }
        let _ = writeln!(out, "{}{}", indent, signal);
    }
    for layer in layers {
        describe_layer(out, layer, depth);
    }
}

fn describe_layer(out: &mut String, layer: MultiplexedLayerRef<'_>, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{}{} -> {} layouts", indent, layer.muxor(), layer.layout_count());
    for (i, layout) in layer.layouts().into_iter().enumerate() {
        if layout.signal_count() == 0 {
            continue;
        }
        let _ = writeln!(out, "{}  [{}]", indent, i);
        describe_layout(out, layout, depth + 2);
    }
}
