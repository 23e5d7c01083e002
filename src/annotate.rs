// src/annotate.rs
//
// CPU drawing primitives for annotated frames: boxes, bars, a small
// 5x7 bitmap font, and JPEG encode/decode helpers.

use crate::types::LightState;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::io::Cursor;

pub const GLYPH_ADVANCE: i32 = 6;

/// Box/label palette per signal phase.
pub fn box_color_for(phase: LightState) -> Rgb<u8> {
    match phase {
        LightState::Green => Rgb([80, 230, 0]),
        LightState::Yellow => Rgb([220, 180, 0]),
        LightState::Red => Rgb([220, 20, 20]),
    }
}

fn set_px(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < image.width() as i32 && y < image.height() as i32 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_rect_1px(image: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    if x2 < x1 || y2 < y1 {
        return;
    }
    for x in x1..=x2 {
        set_px(image, x, y1, color);
        set_px(image, x, y2, color);
    }
    for y in y1..=y2 {
        set_px(image, x1, y, color);
        set_px(image, x2, y, color);
    }
}

pub fn draw_rect(
    image: &mut RgbImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    color: Rgb<u8>,
    thickness: i32,
) {
    for t in 0..thickness.max(1) {
        draw_rect_1px(image, x1 + t, y1 + t, x2 - t, y2 - t, color);
    }
}

pub fn fill_rect(image: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    if x2 < x1 || y2 < y1 {
        return;
    }
    for y in y1..=y2 {
        for x in x1..=x2 {
            set_px(image, x, y, color);
        }
    }
}

pub fn draw_hline(image: &mut RgbImage, x1: i32, x2: i32, y: i32, color: Rgb<u8>, thickness: i32) {
    for t in 0..thickness.max(1) {
        for x in x1..=x2 {
            set_px(image, x, y + t, color);
        }
    }
}

pub fn draw_vline(image: &mut RgbImage, x: i32, y1: i32, y2: i32, color: Rgb<u8>, thickness: i32) {
    for t in 0..thickness.max(1) {
        for y in y1..=y2 {
            set_px(image, x + t, y, color);
        }
    }
}

pub fn fill_circle(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                set_px(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// One-pixel ring, drawn as a thin annulus.
pub fn draw_circle(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let outer = radius * radius;
    let inner = (radius - 1) * (radius - 1);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 > inner && d2 <= outer {
                set_px(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Pixel width of a label at the given scale, used to size backing
/// bars and right-align text.
pub fn label_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE * scale.max(1)
}

/// Renders uppercase 5x7 glyphs. Unknown characters advance without
/// drawing.
pub fn draw_label(image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: i32) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = pen_x + col * scale;
                        let py = y + row as i32 * scale;
                        fill_rect(image, px, py, px + scale - 1, py + scale - 1, color);
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    if image.write_with_encoder(encoder).is_ok() {
        Some(buf.into_inner())
    } else {
        None
    }
}

pub fn decode_image(bytes: &[u8]) -> Option<RgbImage> {
    image::load_from_memory(bytes).ok().map(|img| img.to_rgb8())
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'B' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
        'C' => Some([0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        'D' => Some([0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100]),
        'E' => Some([0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111]),
        'F' => Some([0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000]),
        'G' => Some([0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
        'H' => Some([0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'I' => Some([0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        'J' => Some([0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
        'K' => Some([0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'L' => Some([0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
        'M' => Some([0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
        'N' => Some([0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001]),
        'O' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'P' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
        'Q' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
        'R' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
        'S' => Some([0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110]),
        'T' => Some([0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        'U' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'V' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
        'W' => Some([0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
        'X' => Some([0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b01010, 0b10001]),
        'Y' => Some([0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
        'Z' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        ':' => Some([0b00000, 0b00110, 0b00110, 0b00000, 0b00110, 0b00110, 0b00000]),
        '-' => Some([0b00000, 0b00000, 0b00000, 0b01110, 0b00000, 0b00000, 0b00000]),
        '.' => Some([0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00110]),
        '/' => Some([0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000]),
        '%' => Some([0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000]),
        '|' => Some([0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}
