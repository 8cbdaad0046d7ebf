//! Drawing boxes, the counting line and zones onto output frames.

use headcount_models::{BoundingBox, Line, Point, Zone};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ZONE_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
const BOX_THICKNESS: i32 = 2;

/// Overlay settings for one run.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    line: Option<Line>,
    zones: Vec<Zone>,
}

impl Annotator {
    pub fn new(line: Option<Line>, zones: Vec<Zone>) -> Self {
        Self { line, zones }
    }

    pub fn draw(&self, image: &mut RgbImage, boxes: &[BoundingBox]) {
        for zone in &self.zones {
            draw_polygon(image, zone.points(), ZONE_COLOR);
        }
        if let Some(line) = &self.line {
            draw_segment(image, line.start, line.end, LINE_COLOR);
        }
        for bbox in boxes {
            draw_box(image, bbox, BOX_COLOR);
        }
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    let x1 = bbox.x1.clamp(0.0, w as f64) as i32;
    let y1 = bbox.y1.clamp(0.0, h as f64) as i32;
    let x2 = bbox.x2.clamp(0.0, w as f64) as i32;
    let y2 = bbox.y2.clamp(0.0, h as f64) as i32;
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    for offset in 0..BOX_THICKNESS {
        let width = (x2 - x1 + offset * 2) as u32;
        let height = (y2 - y1 + offset * 2) as u32;
        let rect = Rect::at(x1 - offset, y1 - offset).of_size(width.max(1), height.max(1));
        draw_hollow_rect_mut(image, rect, color);
    }
}

fn draw_segment(image: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>) {
    draw_line_segment_mut(
        image,
        (a.x as f32, a.y as f32),
        (b.x as f32, b.y as f32),
        color,
    );
}

fn draw_polygon(image: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_segment(image, *a, b, color);
    }
}
