// src/synthetic.rs
//
// Animated placeholder scene used when no real frame source is
// available. Time-seeded so consecutive frames visibly move.

use crate::annotate::{
    draw_hline, draw_label, draw_rect, fill_circle, fill_rect,
};
use image::{Rgb, RgbImage};

const PLATE_BG: Rgb<u8> = Rgb([50, 220, 220]);
const PLATE_TEXT: Rgb<u8> = Rgb([20, 20, 20]);
const WHEEL: Rgb<u8> = Rgb([20, 20, 20]);

/// Road scene with two moving vehicles and one parked at the stop
/// line, each with a painted plate so OCR demos have text to find.
pub fn demo_scene(width: u32, height: u32, t: f64) -> RgbImage {
    let mut frame = RgbImage::new(width, height);
    let w = width as i32;
    let h = height as i32;
    let wf = width as f64;
    let hf = height as f64;

    // Sky gradient over the top 55%, dark road below.
    let sky_rows = (hf * 0.55) as i32;
    for y in 0..sky_rows {
        let v = 28 - ((y as f64 / sky_rows.max(1) as f64) * 18.0) as i32;
        let color = Rgb([
            (v + 4).max(16) as u8,
            v.max(8) as u8,
            (v - 2).max(4) as u8,
        ]);
        fill_rect(&mut frame, 0, y, w - 1, y, color);
    }
    fill_rect(&mut frame, 0, sky_rows, w - 1, h - 1, Rgb([34, 26, 20]));

    // Dashed lane divider and road edge.
    let lane_y = (hf * 0.70) as i32;
    let mut x = 0;
    while x < w {
        draw_hline(&mut frame, x, (x + 50).min(w - 1), lane_y, Rgb([65, 55, 45]), 2);
        x += 100;
    }
    draw_hline(&mut frame, 0, w - 1, (hf * 0.58) as i32, Rgb([55, 45, 35]), 1);

    // Vehicle 1: car crossing the full road width.
    let vx1 = (wf * 0.05 + (t * 90.0) % (wf * 0.82)) as i32;
    let vy1 = (hf * 0.65) as i32;
    fill_rect(&mut frame, vx1 - 42, vy1 - 24, vx1 + 42, vy1 + 24, Rgb([185, 85, 45]));
    draw_rect(&mut frame, vx1 - 42, vy1 - 24, vx1 + 42, vy1 + 24, Rgb([220, 120, 70]), 1);
    fill_rect(&mut frame, vx1 - 28, vy1 - 38, vx1 + 28, vy1 - 20, Rgb([150, 65, 35]));
    fill_rect(&mut frame, vx1 - 22, vy1 - 36, vx1 + 22, vy1 - 22, Rgb([160, 90, 60]));
    fill_circle(&mut frame, vx1 - 28, vy1 + 24, 8, WHEEL);
    fill_circle(&mut frame, vx1 + 28, vy1 + 24, 8, WHEEL);
    fill_rect(&mut frame, vx1 - 26, vy1 + 8, vx1 + 26, vy1 + 22, PLATE_BG);
    draw_label(&mut frame, vx1 - 26, vy1 + 11, "51B-12345", PLATE_TEXT, 1);

    // Vehicle 2: motorbike in the nearer lane.
    let vx2 = (wf * 0.55 + (t * 60.0) % (wf * 0.38)) as i32;
    let vy2 = (hf * 0.70) as i32;
    fill_rect(&mut frame, vx2 - 22, vy2 - 20, vx2 + 22, vy2 + 20, Rgb([35, 35, 140]));
    draw_rect(&mut frame, vx2 - 22, vy2 - 20, vx2 + 22, vy2 + 20, Rgb([60, 60, 190]), 1);
    fill_circle(&mut frame, vx2 - 14, vy2 + 20, 7, WHEEL);
    fill_circle(&mut frame, vx2 + 14, vy2 + 20, 7, WHEEL);
    fill_rect(&mut frame, vx2 - 14, vy2 + 6, vx2 + 14, vy2 + 18, PLATE_BG);
    draw_label(&mut frame, vx2 - 13, vy2 + 8, "30A-99001", PLATE_TEXT, 1);

    // Vehicle 3: parked at the stop line with a foreign plate.
    let vx3 = (wf * 0.40) as i32;
    let vy3 = (hf * 0.74) as i32;
    fill_rect(&mut frame, vx3 - 38, vy3 - 20, vx3 + 38, vy3 + 20, Rgb([60, 140, 60]));
    draw_rect(&mut frame, vx3 - 38, vy3 - 20, vx3 + 38, vy3 + 20, Rgb([80, 180, 80]), 1);
    fill_rect(&mut frame, vx3 - 25, vy3 - 32, vx3 + 25, vy3 - 18, Rgb([50, 110, 50]));
    fill_rect(&mut frame, vx3 - 26, vy3 + 5, vx3 + 26, vy3 + 19, Rgb([240, 240, 240]));
    draw_rect(&mut frame, vx3 - 26, vy3 + 5, vx3 + 26, vy3 + 19, Rgb([180, 40, 40]), 2);
    draw_label(&mut frame, vx3 - 24, vy3 + 8, "ABC 1234", PLATE_TEXT, 1);

    // Watermark so nobody mistakes this for a live feed.
    draw_label(
        &mut frame,
        (wf * 0.24) as i32,
        (hf * 0.38) as i32,
        "DEMO MODE - NO CAMERA",
        Rgb([48, 24, 12]),
        3,
    );
    draw_label(
        &mut frame,
        (wf * 0.22) as i32,
        (hf * 0.44) as i32,
        "CONNECT A REMOTE CAMERA TO GO LIVE",
        Rgb([120, 60, 20]),
        1,
    );

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honors_requested_dimensions() {
        let frame = demo_scene(1280, 720, 0.0);
        assert_eq!(frame.dimensions(), (1280, 720));
        let small = demo_scene(320, 240, 0.0);
        assert_eq!(small.dimensions(), (320, 240));
    }

    #[test]
    fn is_deterministic_for_a_fixed_time() {
        let a = demo_scene(320, 240, 7.5);
        let b = demo_scene(320, 240, 7.5);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn animation_progresses_over_time() {
        let a = demo_scene(320, 240, 0.0);
        let b = demo_scene(320, 240, 2.0);
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn road_band_is_drawn_below_the_sky() {
        let frame = demo_scene(640, 480, 0.0);
        // Sample a road pixel away from any vehicle sprite.
        assert_eq!(*frame.get_pixel(620, 470), Rgb([34, 26, 20]));
    }
}
