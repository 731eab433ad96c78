//! 简单光栅化. 坐标均为 `(y, x)`, 仅绘制在 `bounds = (高, 宽)` 以内的像素.

use crate::Idx2d;
use image::{Rgb, RgbImage};
use itertools::Itertools;

/// 若 `(y, x)` 落在 `bounds` 内则着色.
#[inline]
fn plot(canvas: &mut RgbImage, (y, x): (i64, i64), color: Rgb<u8>, (h, w): Idx2d) {
    if y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham 直线. 端点四舍五入到最近像素.
pub(super) fn line(
    canvas: &mut RgbImage,
    from: (f32, f32),
    to: (f32, f32),
    color: Rgb<u8>,
    bounds: Idx2d,
) {
    let (mut y0, mut x0) = (from.0.round() as i64, from.1.round() as i64);
    let (y1, x1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        plot(canvas, (y0, x0), color, bounds);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// 闭合多边形轮廓.
pub(super) fn polygon(canvas: &mut RgbImage, vertices: &[(f32, f32)], color: Rgb<u8>, bounds: Idx2d) {
    if let [only] = vertices {
        line(canvas, *only, *only, color, bounds);
        return;
    }
    for (&from, &to) in vertices.iter().circular_tuple_windows() {
        line(canvas, from, to, color, bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn red_count(canvas: &RgbImage) -> usize {
        canvas.pixels().filter(|p| **p == RED).count()
    }

    #[test]
    fn test_line_endpoints_and_length() {
        let mut canvas = RgbImage::new(8, 8);
        line(&mut canvas, (0.0, 0.0), (0.0, 5.0), RED, (8, 8));
        assert_eq!(red_count(&canvas), 6);
        assert_eq!(*canvas.get_pixel(5, 0), RED);
    }

    #[test]
    fn test_polygon_clipped() {
        let mut canvas = RgbImage::new(8, 4);
        // 只允许画在左半边 4x4 区域.
        polygon(&mut canvas, &[(0.0, 0.0), (0.0, 7.0), (3.0, 7.0), (3.0, 0.0)], RED, (4, 4));
        assert!(canvas.enumerate_pixels().all(|(x, _, p)| x < 4 || *p != RED));
        assert_eq!(*canvas.get_pixel(0, 3), RED);
    }
}
