//! Deterministic text metrics.
//!
//! Text boxes are sized with a fixed per-character advance instead of real
//! font metrics so that bounds, ports and exports do not depend on the fonts
//! installed on the host.

use crate::model::{TextAlign, TextStyle};

const ADVANCE_REGULAR: f32 = 0.6;
const ADVANCE_BOLD: f32 = 0.64;
const TAB_WIDTH: usize = 4;

pub fn lines(text: &str) -> Vec<&str> {
    text.split('\n').map(|l| l.trim_end_matches('\r')).collect()
}

pub fn visual_char_count(line: &str) -> usize {
    line.chars()
        .map(|c| match c {
            '\t' => TAB_WIDTH,
            c if c.is_control() => 0,
            _ => 1,
        })
        .sum()
}

pub fn line_width(line: &str, style: &TextStyle) -> f32 {
    let advance = if style.bold {
        ADVANCE_BOLD
    } else {
        ADVANCE_REGULAR
    };
    visual_char_count(line) as f32 * style.font_size * advance
}

pub fn line_height(style: &TextStyle) -> f32 {
    style.font_size * style.line_height
}

/// Unscaled `(width, height)` of a text block. Empty text still reserves one
/// character cell so the object stays pickable.
pub fn measure(text: &str, style: &TextStyle) -> (f32, f32) {
    let lines = lines(text);
    let width = lines
        .iter()
        .map(|l| line_width(l, style))
        .fold(0.0_f32, f32::max)
        .max(style.font_size * ADVANCE_REGULAR);
    let height = lines.len().max(1) as f32 * line_height(style);
    (width, height)
}

/// Horizontal anchor of a line inside a text box of `box_width`.
pub fn anchor_x(box_width: f32, align: TextAlign) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => box_width * 0.5,
        TextAlign::Right => box_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_longest_line() {
        let style = TextStyle {
            font_size: 10.0,
            line_height: 1.5,
            ..TextStyle::default()
        };
        let (w, h) = measure("ab\nabcd", &style);
        assert!((w - 24.0).abs() < 1e-4);
        assert!((h - 30.0).abs() < 1e-4);
    }

    #[test]
    fn tabs_count_as_four_cells() {
        assert_eq!(visual_char_count("\tx"), 5);
    }

    #[test]
    fn empty_text_keeps_one_cell() {
        let style = TextStyle::default();
        let (w, h) = measure("", &style);
        assert!(w > 0.0);
        assert!(h > 0.0);
    }
}
