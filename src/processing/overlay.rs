//! Crosshair overlay drawn at the centre of every captured frame.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radius of the ring used by the `x-circle` style.
const X_CIRCLE_RADIUS: u32 = 15;
/// Half-length of the cross arms used by the `x-circle` style.
const X_CIRCLE_ARM: u32 = 20;

/// Shape of the crosshair marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrosshairStyle {
    Simple,
    Circle,
    XCircle,
    Dot,
}

impl CrosshairStyle {
    pub const NAMES: [&'static str; 4] = ["simple", "circle", "x-circle", "dot"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrosshairStyle::Simple => "simple",
            CrosshairStyle::Circle => "circle",
            CrosshairStyle::XCircle => "x-circle",
            CrosshairStyle::Dot => "dot",
        }
    }
}

impl FromStr for CrosshairStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(CrosshairStyle::Simple),
            "circle" => Ok(CrosshairStyle::Circle),
            "x-circle" => Ok(CrosshairStyle::XCircle),
            "dot" => Ok(CrosshairStyle::Dot),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CrosshairStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour of the crosshair marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrosshairColor {
    Red,
    Green,
    Blue,
}

impl CrosshairColor {
    pub const NAMES: [&'static str; 3] = ["red", "green", "blue"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrosshairColor::Red => "red",
            CrosshairColor::Green => "green",
            CrosshairColor::Blue => "blue",
        }
    }

    pub fn to_rgb(self) -> Rgb<u8> {
        match self {
            CrosshairColor::Red => Rgb([255, 0, 0]),
            CrosshairColor::Green => Rgb([0, 255, 0]),
            CrosshairColor::Blue => Rgb([0, 0, 255]),
        }
    }
}

impl FromStr for CrosshairColor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(CrosshairColor::Red),
            "green" => Ok(CrosshairColor::Green),
            "blue" => Ok(CrosshairColor::Blue),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CrosshairColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crosshair overlay configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crosshair {
    pub style: CrosshairStyle,
    pub color: CrosshairColor,
    /// Stroke width in pixels (1-10)
    pub thickness: u32,
}

impl Default for Crosshair {
    fn default() -> Self {
        Self {
            style: CrosshairStyle::Simple,
            color: CrosshairColor::Red,
            thickness: 1,
        }
    }
}

impl Crosshair {
    /// Draw the crosshair onto `frame` in place, centred on the frame.
    pub fn draw(&self, frame: &mut RgbImage) {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let cx = (width / 2) as i64;
        let cy = (height / 2) as i64;
        let color = self.color.to_rgb();
        let t = self.thickness.max(1) as i64;

        match self.style {
            CrosshairStyle::Simple => {
                horizontal_line(frame, 0, width as i64 - 1, cy, t, color);
                vertical_line(frame, cx, 0, height as i64 - 1, t, color);
            }
            CrosshairStyle::Circle => {
                ring(frame, cx, cy, 3 * t, t, color);
            }
            CrosshairStyle::XCircle => {
                let arm = X_CIRCLE_ARM as i64;
                ring(frame, cx, cy, X_CIRCLE_RADIUS as i64, t, color);
                horizontal_line(frame, cx - arm, cx + arm, cy, t, color);
                vertical_line(frame, cx, cy - arm, cy + arm, t, color);
            }
            CrosshairStyle::Dot => {
                disc(frame, cx, cy, t, color);
            }
        }
    }
}

/// Rows covered by a stroke of width `t` centred on `c`.
fn stroke_span(c: i64, t: i64) -> (i64, i64) {
    let start = c - (t - 1) / 2;
    (start, start + t - 1)
}

fn fill_rect(frame: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (width, height) = frame.dimensions();
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(width as i64 - 1);
    let y1 = y1.min(height as i64 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn horizontal_line(frame: &mut RgbImage, x0: i64, x1: i64, y: i64, t: i64, color: Rgb<u8>) {
    let (y0, y1) = stroke_span(y, t);
    fill_rect(frame, x0, y0, x1, y1, color);
}

fn vertical_line(frame: &mut RgbImage, x: i64, y0: i64, y1: i64, t: i64, color: Rgb<u8>) {
    let (x0, x1) = stroke_span(x, t);
    fill_rect(frame, x0, y0, x1, y1, color);
}

/// Circle outline of the given radius with stroke width `t`.
fn ring(frame: &mut RgbImage, cx: i64, cy: i64, radius: i64, t: i64, color: Rgb<u8>) {
    let half = t as f64 / 2.0;
    let reach = radius + t;
    let (width, height) = frame.dimensions();

    for y in (cy - reach).max(0)..=(cy + reach).min(height as i64 - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(width as i64 - 1) {
            let dx = (x - cx) as f64;
            let dy = (y - cy) as f64;
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius as f64).abs() <= half {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Filled circle.
fn disc(frame: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let (width, height) = frame.dimensions();
    let r2 = radius * radius;

    for y in (cy - radius).max(0)..=(cy + radius).min(height as i64 - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(width as i64 - 1) {
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= r2 {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, BLACK)
    }

    fn touched(frame: &RgbImage) -> Vec<(u32, u32)> {
        frame
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != BLACK)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn test_simple_touches_only_centre_row_and_column() {
        let mut frame = blank(64, 48);
        Crosshair::default().draw(&mut frame);

        let pixels = touched(&frame);
        assert!(!pixels.is_empty());
        for (x, y) in &pixels {
            assert!(*x == 32 || *y == 24, "unexpected pixel at ({}, {})", x, y);
        }
        // Full width and full height
        assert_eq!(pixels.iter().filter(|(_, y)| *y == 24).count(), 64);
        assert_eq!(pixels.iter().filter(|(x, _)| *x == 32).count(), 48);
        assert_eq!(*frame.get_pixel(0, 24), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_simple_thickness_stays_within_stroke() {
        let mut frame = blank(40, 40);
        let ch = Crosshair {
            thickness: 3,
            color: CrosshairColor::Green,
            ..Default::default()
        };
        ch.draw(&mut frame);

        for (x, y) in touched(&frame) {
            assert!((19..=21).contains(&x) || (19..=21).contains(&y));
        }
        assert_eq!(*frame.get_pixel(0, 19), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(0, 21), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_circle_radius_scales_with_thickness() {
        let mut frame = blank(100, 100);
        let ch = Crosshair {
            style: CrosshairStyle::Circle,
            color: CrosshairColor::Blue,
            thickness: 2,
        };
        ch.draw(&mut frame);

        // Radius 6: point on the ring is drawn, centre is untouched
        assert_eq!(*frame.get_pixel(56, 50), Rgb([0, 0, 255]));
        assert_eq!(*frame.get_pixel(50, 50), BLACK);
        assert_eq!(*frame.get_pixel(60, 50), BLACK);
    }

    #[test]
    fn test_x_circle_fixed_geometry() {
        for thickness in [1, 5] {
            let mut frame = blank(100, 100);
            let ch = Crosshair {
                style: CrosshairStyle::XCircle,
                color: CrosshairColor::Red,
                thickness,
            };
            ch.draw(&mut frame);

            assert_ne!(*frame.get_pixel(65, 50), BLACK); // ring
            assert_ne!(*frame.get_pixel(70, 50), BLACK); // arm end
            assert_ne!(*frame.get_pixel(50, 30), BLACK);
            assert_eq!(*frame.get_pixel(75, 50), BLACK); // beyond the arm
            assert_eq!(*frame.get_pixel(50, 80), BLACK);
        }
    }

    #[test]
    fn test_dot_is_filled_disc() {
        let mut frame = blank(30, 30);
        let ch = Crosshair {
            style: CrosshairStyle::Dot,
            color: CrosshairColor::Red,
            thickness: 4,
        };
        ch.draw(&mut frame);

        assert_ne!(*frame.get_pixel(15, 15), BLACK);
        assert_ne!(*frame.get_pixel(19, 15), BLACK);
        assert_eq!(*frame.get_pixel(20, 15), BLACK);
        for (x, y) in touched(&frame) {
            let dx = x as i64 - 15;
            let dy = y as i64 - 15;
            assert!(dx * dx + dy * dy <= 16);
        }
    }

    #[test]
    fn test_drawing_clips_on_tiny_frames() {
        let mut frame = blank(3, 2);
        let ch = Crosshair {
            style: CrosshairStyle::XCircle,
            color: CrosshairColor::Green,
            thickness: 10,
        };
        ch.draw(&mut frame);
        assert_eq!(frame.dimensions(), (3, 2));
    }

    #[test]
    fn test_style_names_round_trip() {
        for name in CrosshairStyle::NAMES {
            let style: CrosshairStyle = name.parse().unwrap();
            assert_eq!(style.as_str(), name);
        }
        assert!("triangle".parse::<CrosshairStyle>().is_err());
        assert!("purple".parse::<CrosshairColor>().is_err());
    }
}
