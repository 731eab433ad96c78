use super::InstanceMask;
use crate::consts::gray::{WEIGHT_B, WEIGHT_G, WEIGHT_R};
use crate::error::ShapeError;
use crate::Idx2d;
use ndarray::{Array2, Array3, ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn};
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde-array")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的显微图像.
///
/// 底层为 `f32` 动态维数组, 只允许两种布局:
///
/// 1. `(H, W)`: 单通道灰度图;
/// 2. `(H, W, C)`: 多通道图像, 通道轴永远位于最后.
///
/// 像素值不做范围约束. 原始读入时通常在 `[0, 255]` 或 `[0, 65535]`,
/// 归一化以后通常在 `[0, 1]` 附近.
#[cfg_attr(feature = "serde-array", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct NucleiImage {
    data: ArrayD<f32>,
}

impl NucleiImage {
    /// 从任意维数组创建图像. 维数不是 2 或 3 时返回错误.
    pub fn new(data: ArrayD<f32>) -> Result<Self, ShapeError> {
        match data.ndim() {
            2 | 3 => Ok(Self { data }),
            n => Err(ShapeError::UnsupportedNdim(n)),
        }
    }

    /// 从二维灰度数组创建图像.
    #[inline]
    pub fn from_gray(data: Array2<f32>) -> Self {
        Self {
            data: data.into_dyn(),
        }
    }

    /// 从 `(H, W, C)` 数组创建多通道图像.
    #[inline]
    pub fn from_channels(data: Array3<f32>) -> Self {
        Self {
            data: data.into_dyn(),
        }
    }

    /// 维数, 2 或 3.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// 完整形状.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 空间分辨率 (高, 宽).
    #[inline]
    pub fn spatial_shape(&self) -> Idx2d {
        let sh = self.data.shape();
        (sh[0], sh[1])
    }

    /// 图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.spatial_shape().0
    }

    /// 图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.spatial_shape().1
    }

    /// 通道数. 二维图像视为单通道.
    #[inline]
    pub fn channels(&self) -> usize {
        match self.data.shape() {
            [_, _, c] => *c,
            _ => 1,
        }
    }

    /// 是否为二维灰度图.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.ndim() == 2
    }

    /// 获得底层数据的不可变视图.
    #[inline]
    pub fn data(&self) -> ArrayViewD<f32> {
        self.data.view()
    }

    /// 获得底层数据的可变视图.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMutD<f32> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> ArrayD<f32> {
        self.data
    }

    /// 复制出用于展示的二维数组. 多通道图像取第一个通道.
    pub fn display_channel(&self) -> Array2<f32> {
        self.channel(0)
    }

    /// 复制出第 `c` 个通道. 二维图像只有通道 0.
    fn channel(&self, c: usize) -> Array2<f32> {
        let data = &self.data;
        match self.ndim() {
            2 => Array2::from_shape_fn(self.spatial_shape(), |(y, x)| data[[y, x]]),
            _ => Array2::from_shape_fn(self.spatial_shape(), |(y, x)| data[[y, x, c]]),
        }
    }

    /// 复制为 `(H, W, C)` 布局, 二维图像视为 `C = 1`.
    pub fn to_hwc(&self) -> Array3<f32> {
        let (h, w) = self.spatial_shape();
        let data = &self.data;
        match self.ndim() {
            2 => Array3::from_shape_fn((h, w, 1), |(y, x, _)| data[[y, x]]),
            _ => Array3::from_shape_fn((h, w, self.channels()), |(y, x, c)| data[[y, x, c]]),
        }
    }

    /// 转换为单通道灰度图.
    ///
    /// - 3 通道或 4 通道图像按 `0.299 R + 0.587 G + 0.114 B` 加权 (忽略 alpha);
    /// - `(H, W, 1)` 图像直接去掉通道轴;
    /// - 二维图像原样返回.
    ///
    /// 其余通道数无法解释为颜色, 返回错误.
    pub fn to_grayscale(self) -> Result<Self, ShapeError> {
        match self.channels() {
            _ if self.is_gray() => Ok(self),
            1 => Ok(Self {
                data: self.data.index_axis_move(Axis(2), 0),
            }),
            3 | 4 => {
                let (h, w) = self.spatial_shape();
                let gray = Array2::from_shape_fn((h, w), |(y, x)| {
                    WEIGHT_R * self.data[[y, x, 0]]
                        + WEIGHT_G * self.data[[y, x, 1]]
                        + WEIGHT_B * self.data[[y, x, 2]]
                });
                Ok(Self::from_gray(gray))
            }
            c => Err(ShapeError::UnsupportedChannels(c)),
        }
    }

    /// 沿空间轴 `axis` (0 为行, 1 为列) 翻转图像. 不复制数据.
    #[inline]
    pub fn flip(&mut self, axis: usize) {
        debug_assert!(axis < 2);
        self.data.invert_axis(Axis(axis));
    }

    /// 按 `perm` 置换前 `perm.len()` 个轴, 剩余 (通道) 轴保持原有位置.
    ///
    /// 若 `perm.len()` 大于图像维数, 返回错误.
    pub fn permute_leading(self, perm: &[usize]) -> Result<Self, ShapeError> {
        let ndim = self.ndim();
        if perm.len() > ndim {
            return Err(ShapeError::UnsupportedNdim(ndim));
        }
        let axes: Vec<usize> = perm.iter().copied().chain(perm.len()..ndim).collect();
        Ok(Self {
            data: self.data.permuted_axes(IxDyn(&axes)),
        })
    }

    /// 对每个像素就地执行 `f`.
    #[inline]
    pub fn map_inplace(&mut self, f: impl FnMut(f32) -> f32) {
        self.data.mapv_inplace(f);
    }

    /// 检查图像空间尺寸是否与 `mask` 一致.
    pub fn check_aligned(&self, mask: &InstanceMask) -> Result<(), ShapeError> {
        let (h, w) = mask.shape();
        let sh = self.shape();
        if sh.len() < 2 || sh[..2] != [h, w] {
            return Err(ShapeError::Misaligned(sh.to_vec(), vec![h, w]));
        }
        Ok(())
    }

    /// 像素最小值和最大值. 空图像返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

impl Index<&[usize]> for NucleiImage {
    type Output = f32;

    #[inline]
    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<&[usize]> for NucleiImage {
    #[inline]
    fn index_mut(&mut self, index: &[usize]) -> &mut Self::Output {
        &mut self.data[index]
    }
}
