use crate::consts::label::is_instance;
use crate::data::InstanceMask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::TAU;

/// 由掩码推出多边形时默认的射线数.
pub const DEFAULT_N_RAYS: usize = 32;

/// 星凸多边形预测的几何细节. 坐标均为 `(y, x)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionDetails {
    /// 每个实例的多边形顶点.
    pub coord: Vec<Vec<(f32, f32)>>,
    /// 每个实例的中心.
    pub points: Vec<(f32, f32)>,
    /// 每个实例的目标概率.
    pub prob: Vec<f32>,
    /// 每个实例在预测掩码中的标签. 为空时按 `1..=n` 顺序对应.
    #[serde(default)]
    pub labels: Vec<u32>,
}

impl PredictionDetails {
    /// 实例数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否不含任何实例.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 第 `i` 个实例在掩码中的标签.
    #[inline]
    pub fn label(&self, i: usize) -> u32 {
        self.labels.get(i).copied().unwrap_or(i as u32 + 1)
    }

    /// 从已有的实例掩码推出细节, 按标签升序排列, 概率均为 1.
    ///
    /// 每个实例以像素质心为中心, 沿 `n_rays` 个等角方向步进到实例边界,
    /// 得到一个星凸多边形. 质心不在实例内部时, 多边形退化为质心一点.
    pub fn from_mask(mask: &InstanceMask, n_rays: usize) -> Self {
        let mut sums: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();
        for ((y, x), &label) in mask.indexed_iter() {
            if is_instance(label) {
                let e = sums.entry(label).or_insert((0.0, 0.0, 0));
                e.0 += y as f64;
                e.1 += x as f64;
                e.2 += 1;
            }
        }

        let mut ans = Self::default();
        for (label, (sy, sx, n)) in sums {
            let center = ((sy / n as f64) as f32, (sx / n as f64) as f32);
            let polygon = (0..n_rays)
                .map(|k| {
                    let phi = TAU * k as f32 / n_rays as f32;
                    let (dy, dx) = (phi.sin(), phi.cos());
                    let d = ray_length(mask, label, center, (dy, dx));
                    (center.0 + d * dy, center.1 + d * dx)
                })
                .collect();
            ans.coord.push(polygon);
            ans.points.push(center);
            ans.prob.push(1.0);
            ans.labels.push(label);
        }
        ans
    }
}

/// 从 `center` 沿单位方向 `dir` 以 1 像素步长前进, 返回最后一个仍属于 `label` 的距离.
fn ray_length(mask: &InstanceMask, label: u32, center: (f32, f32), dir: (f32, f32)) -> f32 {
    let at = |d: f32| -> Option<u32> {
        let y = (center.0 + d * dir.0).round();
        let x = (center.1 + d * dir.1).round();
        if y < 0.0 || x < 0.0 {
            return None;
        }
        mask.get((y as usize, x as usize)).copied()
    };
    let mut d = 0.0;
    while at(d + 1.0) == Some(label) {
        d += 1.0;
    }
    d
}
