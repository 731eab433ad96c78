//! 图像的持久化存储.

use super::{InstanceMask, NucleiImage};
use crate::consts::gray::{BLACK, WHITE};
use crate::visual::LabelColormap;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use image::{ImageResult, Luma};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 对于 `InstanceMask`, 每个实例会被映射为一种随机但稳定的颜色;
/// 对于 `NucleiImage`, 像素值按最小/最大值线性拉伸到 8-bit 灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 实例掩码按 16-bit 灰度保存, 标签超过 `u16::MAX` 时返回错误.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 将 `v` 从 `[lo, hi]` 线性映射到 `[0, 255]`.
#[inline]
pub(crate) fn stretch(v: f32, lo: f32, hi: f32) -> u8 {
    if hi <= lo || !v.is_finite() {
        return BLACK;
    }
    let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    // 255, not 256.
    (t * WHITE as f32).round() as u8
}

fn label_overflow(label: u32) -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::Generic(format!(
        "label {label} does not fit into 16 bits"
    ))))
}

impl ImgWriteVis for InstanceMask {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let cmap = LabelColormap::default();
        let (height, width) = self.shape();
        let mut buf = image::RgbImage::new(width as u32, height as u32);
        for ((h, w), &label) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, cmap.color(label));
        }
        buf.save(path)
    }
}

impl ImgWriteRaw for InstanceMask {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::ImageBuffer::<Luma<u16>, Vec<u16>>::new(width as u32, height as u32);
        for ((h, w), &label) in self.indexed_iter() {
            let v = u16::try_from(label).map_err(|_| label_overflow(label))?;
            buf.put_pixel(w as u32, h as u32, Luma([v]));
        }
        buf.save(path)
    }
}

/// 多通道图像只保存第一个通道.
impl ImgWriteVis for NucleiImage {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.spatial_shape();
        let (lo, hi) = self.min_max().unwrap_or((0.0, 0.0));
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &v) in self.display_channel().indexed_iter() {
            buf.put_pixel(w as u32, h as u32, Luma([stretch(v, lo, hi)]));
        }
        buf.save(path)
    }
}
