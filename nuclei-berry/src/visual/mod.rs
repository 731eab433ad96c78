//! 预测结果可视化.
//!
//! 生成左右两栏的对比图: 左栏为灰度原图叠加每个实例的星凸多边形轮廓,
//! 右栏为灰度原图叠加半透明的实例标签.

mod cmap;
mod draw;

pub use cmap::LabelColormap;

use crate::data::{InstanceMask, NucleiImage};
use crate::error::{Result, ShapeError};
use crate::model::PredictionDetails;
use image::{Rgb, RgbImage};
use std::path::Path;

/// 标签叠加时的不透明度.
const LABEL_ALPHA: f32 = 0.5;

/// 将 `image` 的展示通道拉伸为 8-bit 灰度并绘制到 `canvas` 的 `(0, x_offset)` 处.
fn paint_gray(canvas: &mut RgbImage, image: &NucleiImage, x_offset: u32) {
    let (lo, hi) = image.min_max().unwrap_or((0.0, 0.0));
    for ((h, w), &v) in image.display_channel().indexed_iter() {
        let g = crate::data::stretch(v, lo, hi);
        canvas.put_pixel(w as u32 + x_offset, h as u32, Rgb([g, g, g]));
    }
}

/// 混合两个颜色.
#[inline]
fn blend(under: Rgb<u8>, over: Rgb<u8>, alpha: f32) -> Rgb<u8> {
    let mix = |a: u8, b: u8| (a as f32 * (1.0 - alpha) + b as f32 * alpha).round() as u8;
    Rgb([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ])
}

/// 渲染一张预测对比图.
///
/// - 左栏: 灰度原图, 每个实例按 `details.coord` 绘制闭合多边形.
///   若 `show_dist` 为 `true`, 还会从实例中心 `details.points` 向每个顶点画射线.
/// - 右栏: 灰度原图, 实例像素与其标签颜色按 0.5 透明度混合, 实例轮廓不透明.
///
/// `labels` 的尺寸必须与 `image` 的空间尺寸一致.
pub fn render_example(
    image: &NucleiImage,
    labels: &InstanceMask,
    details: &PredictionDetails,
    cmap: &LabelColormap,
    show_dist: bool,
) -> Result<RgbImage> {
    image.check_aligned(labels)?;
    check_details(details)?;
    let (height, width) = image.spatial_shape();
    let mut canvas = RgbImage::new(2 * width as u32, height as u32);
    paint_gray(&mut canvas, image, 0);
    paint_gray(&mut canvas, image, width as u32);

    let bounds = (height, width);
    for (i, polygon) in details.coord.iter().enumerate() {
        let color = cmap.color(details.label(i));
        draw::polygon(&mut canvas, polygon, color, bounds);
        if show_dist {
            if let Some(&center) = details.points.get(i) {
                for &vertex in polygon {
                    draw::line(&mut canvas, center, vertex, color, bounds);
                }
            }
        }
    }

    for ((h, w), &label) in labels.indexed_iter() {
        if label == crate::consts::label::BACKGROUND {
            continue;
        }
        let (x, y) = ((w + width) as u32, h as u32);
        let color = cmap.color(label);
        let mixed = if labels.is_contour((h, w)) {
            color
        } else {
            blend(*canvas.get_pixel(x, y), color, LABEL_ALPHA)
        };
        canvas.put_pixel(x, y, mixed);
    }
    Ok(canvas)
}

/// 渲染并保存到 `path`.
pub fn save_example<P: AsRef<Path>>(
    path: P,
    image: &NucleiImage,
    labels: &InstanceMask,
    details: &PredictionDetails,
    cmap: &LabelColormap,
) -> Result<()> {
    let canvas = render_example(image, labels, details, cmap, true)?;
    canvas.save(path.as_ref())?;
    log::debug!("overlay written to {}", path.as_ref().display());
    Ok(())
}

/// 检查预测细节与标签数量是否匹配. 多边形数与中心数不同, 或给出的标签数与多边形数不同时返回错误.
pub fn check_details(details: &PredictionDetails) -> Result<()> {
    if details.coord.len() != details.points.len() {
        return Err(ShapeError::LengthMismatch(details.coord.len(), details.points.len()).into());
    }
    if !details.labels.is_empty() && details.labels.len() != details.coord.len() {
        return Err(ShapeError::LengthMismatch(details.coord.len(), details.labels.len()).into());
    }
    Ok(())
}
