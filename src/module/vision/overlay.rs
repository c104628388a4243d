//! Draws detections onto an enlarged copy of the input image.

use image::{imageops::FilterType, Rgb, RgbImage};

use super::detector::Detection;

/// Instance colors, cycled in detection order.
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([0, 114, 189]),
    Rgb([217, 83, 25]),
    Rgb([237, 177, 32]),
    Rgb([126, 47, 142]),
    Rgb([119, 172, 48]),
    Rgb([77, 190, 238]),
    Rgb([162, 20, 47]),
    Rgb([255, 128, 0]),
];

const TEXT: Rgb<u8> = Rgb([255, 255, 255]);

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// 5x7 bitmaps, one row per byte, bit 4 is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        ' ' => [0; 7],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Color for the `i`-th detection.
pub fn instance_color(i: usize) -> Rgb<u8> {
    PALETTE[i % PALETTE.len()]
}

/// Caption drawn above a box, e.g. `MT 92%`.
pub fn caption(det: &Detection) -> String {
    format!("{} {:.0}%", det.label(), det.prob * 100.0)
}

/// Returns `img` scaled by `scale` with every detection's box and caption drawn on it.
pub fn render(img: &RgbImage, dets: &[Detection], scale: f32) -> RgbImage {
    let w = ((img.width() as f32 * scale).round() as u32).max(1);
    let h = ((img.height() as f32 * scale).round() as u32).max(1);
    let mut out = image::imageops::resize(img, w, h, FilterType::Triangle);

    let thickness = ((2.0 * scale).round() as u32).max(1);
    let px = ((1.5 * scale).round() as u32).max(1);
    for (i, det) in dets.iter().enumerate() {
        let color = instance_color(i);
        let x1 = (det.x1 * scale).round() as i64;
        let y1 = (det.y1 * scale).round() as i64;
        let x2 = (det.x2 * scale).round() as i64;
        let y2 = (det.y2 * scale).round() as i64;
        draw_hollow_rect(&mut out, (x1, y1, x2, y2), thickness, color);

        // Caption sits above the box, or inside it when there's no room.
        let text = caption(det);
        let tag_h = (GLYPH_H * px + 2 * px) as i64;
        let tag_w = (text.chars().count() as u32 * (GLYPH_W + 1) * px + px) as i64;
        let ty = if y1 - tag_h >= 0 { y1 - tag_h } else { y1 };
        fill_rect(&mut out, (x1, ty, x1 + tag_w, ty + tag_h), color);
        draw_text(&mut out, &text, x1 + px as i64, ty + px as i64, px, TEXT);
    }
    out
}

/// Fills `[x1, x2) x [y1, y2)`, clipped to the image.
fn fill_rect(img: &mut RgbImage, (x1, y1, x2, y2): (i64, i64, i64, i64), color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y1.max(0)..y2.min(h) {
        for x in x1.max(0)..x2.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_hollow_rect(img: &mut RgbImage, (x1, y1, x2, y2): (i64, i64, i64, i64), t: u32, color: Rgb<u8>) {
    let t = t as i64;
    fill_rect(img, (x1, y1, x2, y1 + t), color);
    fill_rect(img, (x1, y2 - t, x2, y2), color);
    fill_rect(img, (x1, y1, x1 + t, y2), color);
    fill_rect(img, (x2 - t, y1, x2, y2), color);
}

fn draw_text(img: &mut RgbImage, text: &str, x: i64, y: i64, px: u32, color: Rgb<u8>) {
    let px = px as i64;
    for (n, c) in text.chars().enumerate() {
        let ox = x + n as i64 * (GLYPH_W as i64 + 1) * px;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W as i64 {
                if bits & (0x10 >> col) != 0 {
                    let gx = ox + col * px;
                    let gy = y + row as i64 * px;
                    fill_rect(img, (gx, gy, gx + px, gy + px), color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, cls: u32, prob: f32) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            cls,
            prob,
        }
    }

    #[test]
    fn caption_format() {
        assert_eq!(caption(&det(0.0, 0.0, 1.0, 1.0, 1, 0.923)), "MT 92%");
        assert_eq!(caption(&det(0.0, 0.0, 1.0, 1.0, 2, 1.0)), "WT 100%");
    }

    #[test]
    fn scales_output() {
        let img = RgbImage::new(100, 60);
        let out = render(&img, &[], 1.5);
        assert_eq!(out.dimensions(), (150, 90));
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn draws_box_edges_in_instance_color() {
        let img = RgbImage::new(200, 200);
        let dets = [
            det(40.0, 80.0, 120.0, 160.0, 0, 0.9),
            det(10.0, 10.0, 20.0, 20.0, 2, 0.95),
        ];
        let out = render(&img, &dets, 1.5);
        // Bottom edge of the first box at y2 * 1.5 - 1.
        assert_eq!(*out.get_pixel(120, 239), instance_color(0));
        // Left edge.
        assert_eq!(*out.get_pixel(60, 200), instance_color(0));
        // Interior stays untouched.
        assert_eq!(*out.get_pixel(120, 200), Rgb([0, 0, 0]));
        // Second box sits at the top, its caption goes inside it.
        assert_eq!(*out.get_pixel(15, 29), instance_color(1));
    }

    #[test]
    fn boxes_off_canvas_are_clipped() {
        let img = RgbImage::new(10, 10);
        let out = render(&img, &[det(-5.0, -5.0, 50.0, 50.0, 1, 0.9)], 1.0);
        assert_eq!(out.dimensions(), (10, 10));
    }
}
