//! 按名称配置的评估指标.

use super::ap::mean_average_precision;
use super::matching::matching_dataset;
use crate::consts::eval::DEFAULT_IOU_THRESHOLD;
use crate::data::InstanceMask;
use crate::dataset::MetaTable;
use crate::error::{ConfigError, LookupError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 评估指标.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// IoU 阈值 0.5 下的 F1.
    DiceCoefficient,
    /// IoU 阈值 0.5 下的 `tp / (tp + fp + fn)`.
    IntersectionOverUnion,
    /// 按类别的 mAP.
    MeanAveragePrecision,
}

impl Metric {
    /// 配置中使用的名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiceCoefficient => "DiceCoefficient",
            Self::IntersectionOverUnion => "IntersectionOverUnion",
            Self::MeanAveragePrecision => "MeanAveragePrecision",
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DiceCoefficient" => Ok(Self::DiceCoefficient),
            "IntersectionOverUnion" => Ok(Self::IntersectionOverUnion),
            "MeanAveragePrecision" => Ok(Self::MeanAveragePrecision),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
struct RawEvaluationMetrics {
    names: Vec<Metric>,
    #[serde(default)]
    n_thresholds: Option<usize>,
}

/// 评估配置: 要计算的指标, 以及 mAP 使用的阈值个数.
///
/// 请求了 `MeanAveragePrecision` 却未给出 `n_thresholds` 时反序列化失败.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationMetrics {
    names: Vec<Metric>,
    n_thresholds: usize,
}

impl<'de> Deserialize<'de> for EvaluationMetrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEvaluationMetrics::deserialize(deserializer)?;
        let n_thresholds = match raw.n_thresholds {
            Some(n) => n,
            None if raw.names.contains(&Metric::MeanAveragePrecision) => {
                return Err(serde::de::Error::custom(ConfigError::MissingField("n_thresholds")))
            }
            None => 0,
        };
        Ok(Self {
            names: raw.names,
            n_thresholds,
        })
    }
}

impl EvaluationMetrics {
    /// 直接创建.
    pub fn new(names: Vec<Metric>, n_thresholds: usize) -> Self {
        Self { names, n_thresholds }
    }

    /// 要计算的指标, 按配置顺序.
    #[inline]
    pub fn names(&self) -> &[Metric] {
        &self.names
    }

    /// mAP 使用的阈值个数.
    #[inline]
    pub fn n_thresholds(&self) -> usize {
        self.n_thresholds
    }
}

/// 计算配置中的所有指标.
///
/// 以 `trues` 的键为准逐一查找预测, 缺失时返回 [`LookupError::Prediction`].
/// `table` 只用于 mAP 的类别分组.
pub fn calc_metrics(
    table: &MetaTable,
    preds: &BTreeMap<String, InstanceMask>,
    trues: &BTreeMap<String, InstanceMask>,
    config: &EvaluationMetrics,
) -> crate::Result<BTreeMap<Metric, f64>> {
    let paired = trues
        .keys()
        .map(|name| {
            preds
                .get(name)
                .ok_or_else(|| LookupError::Prediction(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let stats = matching_dataset(trues.values(), paired, DEFAULT_IOU_THRESHOLD)?;

    let mut ans = BTreeMap::new();
    for &metric in config.names() {
        let value = match metric {
            Metric::DiceCoefficient => stats.f1,
            Metric::IntersectionOverUnion => stats.accuracy,
            Metric::MeanAveragePrecision => {
                mean_average_precision(preds, trues, table, config.n_thresholds())?
            }
        };
        ans.insert(metric, value);
    }
    log::info!("metrics: {ans:?}");
    Ok(ans)
}
