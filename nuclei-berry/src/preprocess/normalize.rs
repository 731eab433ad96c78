//! 基于百分位的强度归一化.

use crate::data::NucleiImage;
use ordered_float::OrderedFloat;

/// 百分位归一化参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalizeParams {
    /// 下百分位, `[0, 100]`.
    pub pmin: f64,
    /// 上百分位, `[0, 100]`.
    pub pmax: f64,
    /// 是否将结果截断到 `[0, 1]`.
    pub clip: bool,
    /// 分母上的平滑项.
    pub eps: f32,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        use crate::consts::preprocess::*;
        Self {
            pmin: DEFAULT_PMIN,
            pmax: DEFAULT_PMAX,
            clip: false,
            eps: DEFAULT_EPS,
        }
    }
}

/// 已升序排列的数据上的线性插值百分位. `sorted` 为空时返回 `None`.
///
/// 位置 `p / 100 * (n - 1)` 落在两个样本之间时, 在两者间线性插值.
pub fn percentile_sorted(sorted: &[OrderedFloat<f32>], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = (p / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (sorted[lo].0 as f64, sorted[hi].0 as f64);
    Some(a + (b - a) * (pos - lo as f64))
}

/// 计算一组百分位. `NaN` 不参与计算.
pub fn percentiles(image: &NucleiImage, ps: &[f64]) -> Option<Vec<f64>> {
    let mut sorted: Vec<OrderedFloat<f32>> = image
        .data()
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| OrderedFloat(v))
        .collect();
    sorted.sort_unstable();
    ps.iter().map(|&p| percentile_sorted(&sorted, p)).collect()
}

/// 在整幅图像 (所有轴) 上做百分位归一化:
/// `(x - P[pmin]) / (P[pmax] - P[pmin] + eps)`, 可选截断到 `[0, 1]`.
///
/// 空图像原样返回.
pub fn normalize(mut image: NucleiImage, params: &NormalizeParams) -> NucleiImage {
    let Some(ps) = percentiles(&image, &[params.pmin, params.pmax]) else {
        return image;
    };
    let (mi, ma) = (ps[0] as f32, ps[1] as f32);
    let denom = ma - mi + params.eps;
    if params.clip {
        image.map_inplace(|v| ((v - mi) / denom).clamp(0.0, 1.0));
    } else {
        image.map_inplace(|v| (v - mi) / denom);
    }
    image
}
