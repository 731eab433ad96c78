//! 按比例因子缩放图像与掩码.
//!
//! 采样坐标的约定与 OpenCV `cv2.resize(src, None, fx=f, fy=f)` 一致:
//! 输出尺寸为 `round(dim * f)`, 缩放比例取 `1 / f` 而非按输出尺寸反算.

use crate::data::{InstanceMask, NucleiImage};
use crate::error::ConfigError;
use ndarray::{Array3, ArrayView3, Axis};
use std::fmt;
use std::str::FromStr;

/// 插值方式.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// 最近邻.
    Nearest,
    /// 双线性.
    #[default]
    Linear,
    /// 缩小时按像素面积加权平均, 放大时退化为一种双线性.
    Area,
}

impl Interpolation {
    /// OpenCV 中的常量名.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "INTER_NEAREST",
            Self::Linear => "INTER_LINEAR",
            Self::Area => "INTER_AREA",
        }
    }
}

impl FromStr for Interpolation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTER_NEAREST" => Ok(Self::Nearest),
            "INTER_LINEAR" => Ok(Self::Linear),
            "INTER_AREA" => Ok(Self::Area),
            other => Err(ConfigError::UnknownInterpolation(other.to_string())),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 缩放后的长度, 至少为 1. 恰好落在 `.5` 时取偶数, 与 `cvRound` 一致.
#[inline]
pub fn scaled_len(len: usize, factor: f64) -> usize {
    ((len as f64 * factor).round_ties_even() as usize).max(1)
}

/// 输出下标 -> 若干 (源下标, 权重). 每个输出位置的权重之和为 1.
type Taps = Vec<Vec<(usize, f32)>>;

fn nearest_taps(src: usize, dst: usize, scale: f64) -> Taps {
    (0..dst)
        .map(|d| {
            let s = ((d as f64 * scale).floor() as usize).min(src - 1);
            vec![(s, 1.0)]
        })
        .collect()
}

/// 两点插值. `frac` 给出采样位置 (整数部分, 小数部分).
fn two_point_taps(src: usize, dst: usize, frac: impl Fn(usize) -> (isize, f64)) -> Taps {
    (0..dst)
        .map(|d| {
            let (mut s, mut f) = frac(d);
            if s < 0 {
                s = 0;
                f = 0.0;
            }
            if s as usize >= src - 1 {
                s = (src - 1) as isize;
                f = 0.0;
            }
            let s = s as usize;
            if f == 0.0 {
                vec![(s, 1.0)]
            } else {
                vec![(s, (1.0 - f) as f32), (s + 1, f as f32)]
            }
        })
        .collect()
}

fn linear_taps(src: usize, dst: usize, scale: f64) -> Taps {
    two_point_taps(src, dst, |d| {
        let pos = (d as f64 + 0.5) * scale - 0.5;
        let s = pos.floor();
        (s as isize, pos - s)
    })
}

/// 放大时的面积插值.
fn area_up_taps(src: usize, dst: usize, scale: f64) -> Taps {
    let inv = 1.0 / scale;
    two_point_taps(src, dst, |d| {
        let s = (d as f64 * scale).floor();
        let f = (d as f64 + 1.0) - (s + 1.0) * inv;
        let f = if f <= 0.0 { 0.0 } else { f - f.floor() };
        (s as isize, f)
    })
}

/// 缩小时的面积插值: 每个输出像素覆盖源坐标 `[d * scale, (d + 1) * scale)`,
/// 按覆盖比例加权.
fn area_down_taps(src: usize, dst: usize, scale: f64) -> Taps {
    (0..dst)
        .map(|d| {
            let fs1 = d as f64 * scale;
            let fs2 = fs1 + scale;
            let cell = scale.min(src as f64 - fs1);
            let s2 = (fs2.floor() as usize).min(src - 1);
            let s1 = (fs1.ceil() as usize).min(s2);
            let mut taps = Vec::new();
            if s1 as f64 - fs1 > 1e-3 {
                taps.push((s1 - 1, ((s1 as f64 - fs1) / cell) as f32));
            }
            for s in s1..s2 {
                taps.push((s, (1.0 / cell) as f32));
            }
            if fs2 - (s2 as f64) > 1e-3 {
                let w = (fs2 - s2 as f64).min(1.0).min(cell);
                taps.push((s2, (w / cell) as f32));
            }
            taps
        })
        .collect()
}

fn taps(src: usize, dst: usize, factor: f64, interp: Interpolation) -> Taps {
    let scale = 1.0 / factor;
    match interp {
        Interpolation::Nearest => nearest_taps(src, dst, scale),
        Interpolation::Linear => linear_taps(src, dst, scale),
        Interpolation::Area if scale >= 1.0 => area_down_taps(src, dst, scale),
        Interpolation::Area => area_up_taps(src, dst, scale),
    }
}

/// 沿 `axis` 应用插值表.
fn resample_axis(src: ArrayView3<f32>, axis: usize, taps: &Taps) -> Array3<f32> {
    let mut shape = [src.shape()[0], src.shape()[1], src.shape()[2]];
    shape[axis] = taps.len();
    let mut out = Array3::zeros(shape);
    for (d, tap) in taps.iter().enumerate() {
        let mut lane = out.index_axis_mut(Axis(axis), d);
        for &(s, w) in tap {
            lane.scaled_add(w, &src.index_axis(Axis(axis), s));
        }
    }
    out
}

/// 以比例因子 `factor` 缩放图像的两个空间轴, 通道轴不变.
///
/// `factor` 必须为正. 空图像原样返回.
pub fn resize_image(image: &NucleiImage, factor: f64, interp: Interpolation) -> NucleiImage {
    let (h, w) = image.spatial_shape();
    if h == 0 || w == 0 {
        return image.clone();
    }
    let src = image.to_hwc();
    let (nh, nw) = (scaled_len(h, factor), scaled_len(w, factor));
    let rows = resample_axis(src.view(), 0, &taps(h, nh, factor, interp));
    let out = resample_axis(rows.view(), 1, &taps(w, nw, factor, interp));

    if image.ndim() == 2 {
        NucleiImage::from_gray(out.index_axis_move(Axis(2), 0))
    } else {
        NucleiImage::from_channels(out)
    }
}

/// 以比例因子 `factor` 缩放实例掩码. 总是使用最近邻插值, 不会产生新的标签值.
pub fn resize_mask(mask: &InstanceMask, factor: f64) -> InstanceMask {
    let (h, w) = mask.shape();
    if h == 0 || w == 0 {
        return mask.clone();
    }
    let scale = 1.0 / factor;
    let index = |src: usize, dst: usize| -> Vec<usize> {
        nearest_taps(src, dst, scale).into_iter().map(|t| t[0].0).collect()
    };
    let rows = index(h, scaled_len(h, factor));
    let cols = index(w, scaled_len(w, factor));
    let data = mask.array_view().select(Axis(0), &rows).select(Axis(1), &cols);
    InstanceMask::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array2};

    fn gray(data: Array2<f32>) -> NucleiImage {
        NucleiImage::from_gray(data)
    }

    #[test]
    fn test_parse_interpolation() {
        assert_eq!("INTER_AREA".parse::<Interpolation>(), Ok(Interpolation::Area));
        assert_eq!(Interpolation::default(), Interpolation::Linear);
        assert_eq!(
            "INTER_LANCZOS9".parse::<Interpolation>(),
            Err(ConfigError::UnknownInterpolation("INTER_LANCZOS9".into()))
        );
    }

    #[test]
    fn test_scaled_len() {
        assert_eq!(scaled_len(100, 2.0), 200);
        assert_eq!(scaled_len(7, 0.5), 4);
        assert_eq!(scaled_len(1, 0.1), 1);
    }

    #[test]
    fn test_upscale_by_two_doubles_shape() {
        // 20x -> 40x
        let image = gray(Array2::from_shape_fn((5, 3), |(y, x)| (y + x) as f32));
        for interp in [Interpolation::Nearest, Interpolation::Linear, Interpolation::Area] {
            let out = resize_image(&image, 2.0, interp);
            assert_eq!(out.shape(), &[10, 6]);
        }
        let mask = InstanceMask::new(Array2::from_shape_fn((5, 3), |(y, _)| y as u32));
        let out = resize_mask(&mask, 2.0);
        assert_eq!(out.shape(), (10, 6));
        assert_eq!(out.labels(), mask.labels());
    }

    #[test]
    fn test_linear_matches_half_pixel_convention() {
        let image = gray(arr2(&[[0.0, 10.0]]));
        let out = resize_image(&image, 2.0, Interpolation::Linear);
        assert_eq!(out.shape(), &[2, 4]);
        // 源坐标 -0.25, 0.25, 0.75, 1.25. 单行源图像放大后两行相同.
        let v: Vec<f32> = out.data().iter().copied().collect();
        assert_eq!(v, [0.0, 2.5, 7.5, 10.0, 0.0, 2.5, 7.5, 10.0]);
    }

    #[test]
    fn test_scaled_len_rounds_half_to_even() {
        assert_eq!(scaled_len(5, 0.5), 2);
        assert_eq!(scaled_len(7, 0.5), 4);
        assert_eq!(scaled_len(3, 0.5), 2);
        assert_eq!(scaled_len(4, 0.5), 2);
        assert_eq!(scaled_len(1, 0.25), 1);
        assert_eq!(scaled_len(5, 2.0), 10);
    }

    #[test]
    fn test_odd_downscale_shape() {
        // 40x -> 20x, 奇数边长.
        let image = gray(Array2::from_shape_fn((5, 7), |(y, x)| (y * 7 + x) as f32));
        for interp in [Interpolation::Nearest, Interpolation::Linear, Interpolation::Area] {
            assert_eq!(resize_image(&image, 0.5, interp).shape(), &[2, 4]);
        }
        let mask = InstanceMask::new(Array2::from_shape_fn((5, 7), |(y, _)| y as u32));
        assert_eq!(resize_mask(&mask, 0.5).shape(), (2, 4));
    }

    #[test]
    fn test_nearest_duplicates() {
        let image = gray(arr2(&[[1.0, 2.0], [3.0, 4.0]]));
        let out = resize_image(&image, 2.0, Interpolation::Nearest);
        assert_eq!(out.data().iter().copied().collect::<Vec<f32>>(), [
            1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 3.0, 3.0, 4.0, 4.0
        ]);
    }

    #[test]
    fn test_area_downscale_is_block_mean() {
        let image = gray(Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32));
        let out = resize_image(&image, 0.5, Interpolation::Area);
        assert_eq!(out.shape(), &[2, 2]);
        assert_abs_diff_eq!(out.data()[[0, 0]], (0.0 + 1.0 + 4.0 + 5.0) / 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.data()[[1, 1]], (10.0 + 11.0 + 14.0 + 15.0) / 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_color_channels_resized_independently() {
        let data = Array3::from_shape_fn((2, 2, 3), |(_, _, c)| c as f32);
        let out = resize_image(&NucleiImage::from_channels(data), 1.5, Interpolation::Linear);
        assert_eq!(out.shape(), &[3, 3, 3]);
        for ((_, _, c), v) in out.data().into_dimensionality::<ndarray::Ix3>().unwrap().indexed_iter() {
            assert_abs_diff_eq!(*v, c as f32, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mask_downscale_keeps_labels_subset() {
        let mask = InstanceMask::new(Array2::from_shape_fn((6, 6), |(y, x)| ((y / 2) * 3 + x / 2) as u32));
        let out = resize_mask(&mask, 0.5);
        assert_eq!(out.shape(), (3, 3));
        assert!(out.labels().is_subset(&mask.labels()));
    }
}
