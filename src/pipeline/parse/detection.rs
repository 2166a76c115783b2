use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_none_marker, non_empty_lines, section};
use crate::pipeline::render::CropRect;

/// Regions at or below this size (either side, in pixels) are discarded.
pub const MIN_REGION_PX: u32 = 50;

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)VISUAL_ELEMENTS_FOUND:\s*(\d+)").unwrap());
static COORDINATES_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)COORDINATES:\s*").unwrap());

/// A visual element located on a canvas, in canvas pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedRegion {
    /// Position of the coordinate line among the non-empty lines.
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub description: String,
}

impl DetectedRegion {
    pub fn rect(&self) -> CropRect {
        CropRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Parse a detection answer against a `canvas_width` x `canvas_height` canvas.
///
/// Lines are `x%,y%,w%,h%,description`; the description may itself contain
/// commas. Percentages become pixels via `floor(p / 100 * dim)`. A region
/// is kept only when it lies fully inside the canvas and is larger than
/// `MIN_REGION_PX` on both sides.
pub fn parse_detection_response(
    response: &str,
    canvas_width: u32,
    canvas_height: u32,
) -> Vec<DetectedRegion> {
    // Only whether the count is non-zero matters; its size is never used.
    let has_elements = COUNT
        .captures(response)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str().bytes().any(|b| b != b'0'));
    if !has_elements {
        return Vec::new();
    }

    let content = match section(response, &COORDINATES_START, None) {
        Some(c) if !c.is_empty() && !is_none_marker(c) => c,
        _ => return Vec::new(),
    };

    non_empty_lines(content)
        .enumerate()
        .filter_map(|(index, line)| parse_line(index, line, canvas_width, canvas_height))
        .collect()
}

fn parse_line(index: usize, line: &str, canvas_width: u32, canvas_height: u32) -> Option<DetectedRegion> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 5 {
        return None;
    }

    let to_px = |part: &str, dim: u32| -> Option<f64> {
        let percent = leading_number(part)?;
        Some((percent / 100.0 * dim as f64).floor())
    };

    let x = to_px(parts[0], canvas_width)?;
    let y = to_px(parts[1], canvas_height)?;
    let width = to_px(parts[2], canvas_width)?;
    let height = to_px(parts[3], canvas_height)?;

    let fits = x >= 0.0
        && y >= 0.0
        && x + width <= canvas_width as f64
        && y + height <= canvas_height as f64
        && width > MIN_REGION_PX as f64
        && height > MIN_REGION_PX as f64;
    if !fits {
        return None;
    }

    Some(DetectedRegion {
        index,
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
        description: parts[4..].join(",").trim().to_string(),
    })
}

/// Longest numeric prefix of `s` (after whitespace), e.g. `"15%"` gives 15.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
