//! 实例分割匹配统计.
//!
//! 真值与预测实例之间以 IoU 为匹配分数, 在分数矩阵上求最优一对一指派,
//! 分数不低于阈值的配对计为真阳性.

use super::assign::linear_sum_assignment;
use crate::consts::eval::*;
use crate::data::InstanceMask;
use crate::error::ShapeError;
use serde::Serialize;
use ndarray::{Array2, Zip};

/// `x / y`, 当 `|y|` 不超过 [`SAFE_DIVIDE_EPS`] 时为 0.
#[inline]
pub fn safe_divide(x: f64, y: f64) -> f64 {
    if y.abs() > SAFE_DIVIDE_EPS {
        x / y
    } else {
        0.0
    }
}

/// 某个阈值下的匹配统计.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct MatchingStats {
    /// IoU 阈值.
    pub thresh: f64,
    /// 真阳性数.
    pub tp: usize,
    /// 假阳性数.
    pub fp: usize,
    /// 假阴性数.
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// `tp / (tp + fp)`.
    pub precision: f64,
    /// `tp / (tp + fn)`.
    pub recall: f64,
    /// `tp / (tp + fp + fn)`.
    pub accuracy: f64,
    /// `2 tp / (2 tp + fp + fn)`.
    pub f1: f64,
    /// 真值实例数.
    pub n_true: usize,
    /// 预测实例数.
    pub n_pred: usize,
    /// 匹配分数之和 / `n_true`.
    pub mean_true_score: f64,
    /// 匹配分数之和 / `tp`.
    pub mean_matched_score: f64,
    /// 匹配分数之和 / `(tp + fp / 2 + fn / 2)`.
    pub panoptic_quality: f64,
}

/// 可累加的计数. 所有比率都由它推出.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct MatchCounts {
    pub(crate) tp: usize,
    pub(crate) n_true: usize,
    pub(crate) n_pred: usize,
    /// 真阳性配对的 IoU 之和.
    pub(crate) sum_matched: f64,
}

impl MatchCounts {
    fn add(&mut self, other: &MatchCounts) {
        self.tp += other.tp;
        self.n_true += other.n_true;
        self.n_pred += other.n_pred;
        self.sum_matched += other.sum_matched;
    }

    pub(crate) fn stats(&self, thresh: f64) -> MatchingStats {
        let tp = self.tp;
        let fp = self.n_pred - tp;
        let fn_ = self.n_true - tp;
        let (tpf, fpf, fnf) = (tp as f64, fp as f64, fn_ as f64);
        MatchingStats {
            thresh,
            tp,
            fp,
            fn_,
            precision: safe_divide(tpf, tpf + fpf),
            recall: safe_divide(tpf, tpf + fnf),
            accuracy: safe_divide(tpf, tpf + fpf + fnf),
            f1: safe_divide(2.0 * tpf, 2.0 * tpf + fpf + fnf),
            n_true: self.n_true,
            n_pred: self.n_pred,
            mean_true_score: safe_divide(self.sum_matched, self.n_true as f64),
            mean_matched_score: safe_divide(self.sum_matched, tpf),
            panoptic_quality: safe_divide(self.sum_matched, tpf + fpf / 2.0 + fnf / 2.0),
        }
    }
}

/// 一对掩码之间的 IoU 矩阵 (`n_true × n_pred`, 不含背景).
///
/// 同一对掩码在多个阈值下评估时只需计算一次.
#[derive(Clone, Debug, PartialEq)]
pub struct IouMatrix {
    scores: Array2<f64>,
}

impl IouMatrix {
    /// 计算 IoU 矩阵. 两个掩码形状不一致时返回错误.
    pub fn new(y_true: &InstanceMask, y_pred: &InstanceMask) -> Result<Self, ShapeError> {
        y_true.check_same_shape(y_pred)?;
        let (t, n_true) = y_true.relabel_sequential();
        let (p, n_pred) = y_pred.relabel_sequential();

        let mut overlap = Array2::<u64>::zeros((n_true + 1, n_pred + 1));
        Zip::from(&t).and(&p).for_each(|&a, &b| overlap[(a, b)] += 1);

        let true_sizes: Vec<u64> = overlap.rows().into_iter().map(|r| r.sum()).collect();
        let pred_sizes: Vec<u64> = overlap.columns().into_iter().map(|c| c.sum()).collect();
        let scores = Array2::from_shape_fn((n_true, n_pred), |(i, j)| {
            let o = overlap[(i + 1, j + 1)] as f64;
            safe_divide(o, (true_sizes[i + 1] + pred_sizes[j + 1]) as f64 - o)
        });
        Ok(Self { scores })
    }

    /// 真值实例数.
    #[inline]
    pub fn n_true(&self) -> usize {
        self.scores.nrows()
    }

    /// 预测实例数.
    #[inline]
    pub fn n_pred(&self) -> usize {
        self.scores.ncols()
    }

    /// 第 `i` 个真值实例与第 `j` 个预测实例 (均从 0 开始, 按原标签升序) 的 IoU.
    #[inline]
    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.scores[(i, j)]
    }

    /// 阈值 `thresh` 下的计数.
    ///
    /// 代价为 `-(score >= thresh) - score / (2 n_matched)`: 先最大化达到阈值的配对数,
    /// 再在此前提下最大化分数之和.
    pub(crate) fn counts(&self, thresh: f64) -> MatchCounts {
        let n_matched = self.n_true().min(self.n_pred());
        let mut ans = MatchCounts {
            tp: 0,
            n_true: self.n_true(),
            n_pred: self.n_pred(),
            sum_matched: 0.0,
        };
        if n_matched == 0 || !self.scores.iter().any(|&s| s >= thresh) {
            return ans;
        }

        let denom = 2.0 * n_matched as f64;
        let costs = self
            .scores
            .mapv(|s| -(if s >= thresh { 1.0 } else { 0.0 }) - s / denom);
        for (i, j) in linear_sum_assignment(costs.view()) {
            let s = self.scores[(i, j)];
            if s >= thresh {
                ans.tp += 1;
                ans.sum_matched += s;
            }
        }
        ans
    }

    /// 阈值 `thresh` 下的匹配统计.
    #[inline]
    pub fn stats(&self, thresh: f64) -> MatchingStats {
        self.counts(thresh).stats(thresh)
    }
}

/// 单幅图像的匹配统计.
pub fn matching(y_true: &InstanceMask, y_pred: &InstanceMask, thresh: f64) -> crate::Result<MatchingStats> {
    Ok(IouMatrix::new(y_true, y_pred)?.stats(thresh))
}

/// 计算每对掩码的 IoU 矩阵. 两侧数量不一致时返回错误.
pub(crate) fn iou_matrices<'a, I, J>(trues: I, preds: J) -> crate::Result<Vec<IouMatrix>>
where
    I: IntoIterator<Item = &'a InstanceMask>,
    J: IntoIterator<Item = &'a InstanceMask>,
{
    let trues: Vec<_> = trues.into_iter().collect();
    let preds: Vec<_> = preds.into_iter().collect();
    if trues.len() != preds.len() {
        return Err(ShapeError::LengthMismatch(trues.len(), preds.len()).into());
    }
    trues
        .into_iter()
        .zip(preds)
        .map(|(t, p)| Ok(IouMatrix::new(t, p)?))
        .collect()
}

/// 在阈值 `thresh` 下汇总整个数据集: 先累加各图像的计数与匹配分数之和, 再统一计算比率.
pub fn matching_dataset_from(matrices: &[IouMatrix], thresh: f64) -> MatchingStats {
    let mut acc = MatchCounts::default();
    for m in matrices {
        acc.add(&m.counts(thresh));
    }
    acc.stats(thresh)
}

/// 整个数据集的匹配统计. `trues` 与 `preds` 按位置一一对应.
pub fn matching_dataset<'a, I, J>(trues: I, preds: J, thresh: f64) -> crate::Result<MatchingStats>
where
    I: IntoIterator<Item = &'a InstanceMask>,
    J: IntoIterator<Item = &'a InstanceMask>,
{
    let matrices = iou_matrices(trues, preds)?;
    Ok(matching_dataset_from(&matrices, thresh))
}
