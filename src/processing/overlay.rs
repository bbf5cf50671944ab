use crate::frame::PixelBuffer;
use chrono_tz::Tz;
use image::Rgba;
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::sync::Arc;
use tracing::debug;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FOREGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Resolve configured timezone, falling back to UTC on parse errors
pub fn resolve_timestamp_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(
                "Invalid timestamp timezone '{}', falling back to UTC",
                tz_name
            );
            chrono_tz::UTC
        }
    }
}

/// Draw `text` in the bottom-left corner with a dark outline.
///
/// Copy-on-write: a buffer still referenced elsewhere is cloned before
/// drawing, so other holders never observe the stamp.
pub(crate) fn stamp_text(
    mut image: PixelBuffer,
    text: &str,
    font: &Font<'static>,
    font_size: f32,
    inset: u32,
) -> PixelBuffer {
    let scale = Scale::uniform(font_size);
    let (_, text_height) = text_size(scale, font, text);

    let canvas = Arc::make_mut(&mut image);
    let x = inset as i32;
    let y = canvas
        .height()
        .saturating_sub(inset)
        .saturating_sub(text_height.max(0) as u32) as i32;

    let thickness = ((font_size / 25.0).round() as i32).max(1);
    for dy in -thickness..=thickness {
        for dx in -thickness..=thickness {
            if dx != 0 || dy != 0 {
                draw_text_mut(&mut *canvas, OUTLINE, x + dx, y + dy, scale, font, text);
            }
        }
    }
    draw_text_mut(&mut *canvas, FOREGROUND, x, y, scale, font, text);

    debug!("Stamped '{}' at ({}, {})", text, x, y);
    image
}
