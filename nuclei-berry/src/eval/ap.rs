//! 平均精度 (AP) 与按类别的平均精度均值 (mAP).

use super::matching::{iou_matrices, matching_dataset_from};
use crate::data::InstanceMask;
use crate::dataset::MetaTable;
use crate::error::{LookupError, ShapeError};
use std::collections::BTreeMap;

/// 闭区间 `[start, stop]` 上 `n` 个等距点, 首尾精确等于端点. `n = 0` 时为空.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i + 1 == n { stop } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// 由 (精度, 召回率) 曲线计算 AP: `Σ_i precision[i] * (recall[i] - recall[i + 1])`.
///
/// 最后一个点不贡献面积, 所以少于两个点时 AP 为 0.
pub fn average_precision_from_curve(precisions: &[f64], recalls: &[f64]) -> Result<f64, ShapeError> {
    if precisions.len() != recalls.len() {
        return Err(ShapeError::LengthMismatch(precisions.len(), recalls.len()));
    }
    Ok(precisions
        .iter()
        .zip(recalls.windows(2))
        .map(|(p, r)| p * (r[0] - r[1]))
        .sum())
}

/// 在一组 IoU 阈值上计算一批图像的 AP. `preds` 与 `trues` 按位置一一对应.
///
/// 每个阈值下的精度与召回率都由整批图像汇总得到.
pub fn average_precision<'a, I, J>(preds: I, trues: J, thresholds: &[f64]) -> crate::Result<f64>
where
    I: IntoIterator<Item = &'a InstanceMask>,
    J: IntoIterator<Item = &'a InstanceMask>,
{
    let matrices = iou_matrices(trues, preds)?;
    let (precisions, recalls): (Vec<f64>, Vec<f64>) = thresholds
        .iter()
        .map(|&t| {
            let s = matching_dataset_from(&matrices, t);
            (s.precision, s.recall)
        })
        .unzip();
    Ok(average_precision_from_curve(&precisions, &recalls)?)
}

/// 按类别分组的 mAP.
///
/// 元数据表按类别分组 (类别按名称排序), 每组在 `linspace(0, 1, n_thresholds)`
/// 上计算 AP, 最后对各类别取不加权平均. 表中的名称在 `preds` 或 `trues`
/// 中缺失时返回 [`LookupError`].
pub fn mean_average_precision(
    preds: &BTreeMap<String, InstanceMask>,
    trues: &BTreeMap<String, InstanceMask>,
    table: &MetaTable,
    n_thresholds: usize,
) -> crate::Result<f64> {
    let thresholds = linspace(0.0, 1.0, n_thresholds);
    let groups = table.groups_by_class();
    if groups.is_empty() {
        return Err(LookupError::NoClasses.into());
    }

    let mut ap_sum = 0.0;
    for (class, names) in groups.iter() {
        let mut p = Vec::with_capacity(names.len());
        let mut t = Vec::with_capacity(names.len());
        for &name in names {
            p.push(preds.get(name).ok_or_else(|| LookupError::Prediction(name.to_string()))?);
            t.push(trues.get(name).ok_or_else(|| LookupError::Mask(name.to_string()))?);
        }
        let ap = average_precision(p, t, &thresholds)?;
        log::debug!("AP[{class}] = {ap:.4} over {} images", names.len());
        ap_sum += ap;
    }
    Ok(ap_sum / groups.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetaRow;
    use crate::error::Error;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), [0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1), [0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        let v = linspace(0.0, 1.0, 10);
        assert_eq!(v.len(), 10);
        assert_eq!(v[9], 1.0);
    }

    #[test]
    fn test_ap_from_curve() {
        let ap = average_precision_from_curve(&[0.8, 0.6, 0.2], &[1.0, 0.7, 0.1]).unwrap();
        assert_abs_diff_eq!(ap, 0.60, epsilon = 1e-12);
        assert_eq!(average_precision_from_curve(&[0.5], &[0.5]).unwrap(), 0.0);
        assert!(average_precision_from_curve(&[0.5], &[]).is_err());
    }

    fn square() -> InstanceMask {
        InstanceMask::new(arr2(&[[1, 1, 0], [1, 1, 0], [0, 0, 0]]))
    }

    #[test]
    fn test_perfect_prediction_ap() {
        let m = square();
        // 阈值 0, 0.5, 1 下 precision = recall = 1: AP = 1*(1-1) + 1*(1-1) = 0.
        let ap = average_precision([&m], [&m], &linspace(0.0, 1.0, 3)).unwrap();
        assert_eq!(ap, 0.0);
    }

    #[test]
    fn test_ap_with_partial_overlap() {
        let t = square();
        // IoU = 2 / 4.
        let p = InstanceMask::new(arr2(&[[1, 1, 0], [0, 0, 0], [0, 0, 0]]));
        let ap = average_precision([&p], [&t], &[0.0, 0.5, 0.75]).unwrap();
        // precision = recall = 1, 1, 0.
        assert_abs_diff_eq!(ap, 1.0, epsilon = 1e-12);
    }

    fn table(rows: &[(&str, &str)]) -> MetaTable {
        rows.iter()
            .map(|&(name, class)| MetaRow {
                name: name.into(),
                magnification: "40x".parse().unwrap(),
                class: class.into(),
            })
            .collect()
    }

    #[test]
    fn test_map_is_unweighted_over_classes() {
        let t = square();
        let half = InstanceMask::new(arr2(&[[1, 1, 0], [0, 0, 0], [0, 0, 0]]));
        let trues = BTreeMap::from([("a".to_string(), t.clone()), ("b".to_string(), t.clone()), ("c".to_string(), t)]);
        let preds = BTreeMap::from([
            ("a".to_string(), half.clone()),
            ("b".to_string(), half),
            ("c".to_string(), InstanceMask::background((3, 3))),
        ]);
        // 类别 x 含 a, b: 3 个阈值 0, 0.5, 1 下 precision = recall = 1, 1, 0 => AP = 1.
        // 类别 y 含 c: 无预测, AP = 0.
        let tbl = table(&[("a", "x"), ("b", "x"), ("c", "y")]);
        let map = mean_average_precision(&preds, &trues, &tbl, 3).unwrap();
        assert_abs_diff_eq!(map, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_single_class_map_equals_class_ap() {
        let half = InstanceMask::new(arr2(&[[1, 1, 0], [0, 0, 0], [0, 0, 0]]));
        let shifted = InstanceMask::new(arr2(&[[0, 0, 0], [0, 2, 2], [0, 2, 2]]));
        let trues = BTreeMap::from([
            ("a".to_string(), square()),
            ("b".to_string(), square()),
            ("c".to_string(), square()),
        ]);
        let preds = BTreeMap::from([
            ("a".to_string(), square()),
            ("b".to_string(), half),
            ("c".to_string(), shifted),
        ]);
        let tbl = table(&[("a", "only"), ("b", "only"), ("c", "only")]);
        for n in [1, 2, 3, 5, 10] {
            let map = mean_average_precision(&preds, &trues, &tbl, n).unwrap();
            let ap = average_precision(preds.values(), trues.values(), &linspace(0.0, 1.0, n)).unwrap();
            assert_abs_diff_eq!(map, ap, epsilon = 1e-12);
        }
        // 单个阈值时曲线只有一个点.
        assert_eq!(mean_average_precision(&preds, &trues, &tbl, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_map_lookup_errors() {
        let trues = BTreeMap::from([("a".to_string(), square())]);
        let preds = BTreeMap::new();
        let err = mean_average_precision(&preds, &trues, &table(&[("a", "x")]), 3).unwrap_err();
        assert!(matches!(err, Error::Lookup(LookupError::Prediction(n)) if n == "a"));

        let err = mean_average_precision(&trues, &trues, &MetaTable::default(), 3).unwrap_err();
        assert!(matches!(err, Error::Lookup(LookupError::NoClasses)));
    }
}
