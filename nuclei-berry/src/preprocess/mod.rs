//! 图像与实例掩码的预处理.
//!
//! 每个划分先统一转为灰度图, 再按配置顺序依次执行各步骤. 配置在加载时即被校验,
//! 任何未知的变换名都不会等到处理数据时才暴露.

mod normalize;
mod resize;

pub use normalize::{normalize, percentile_sorted, percentiles, NormalizeParams};
pub use resize::{resize_image, resize_mask, scaled_len, Interpolation};

use crate::config::entry::{split_entry, Param, Params};
use crate::consts::preprocess::*;
use crate::dataset::{Dataset, Magnification, SplitRecord};
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 单个预处理步骤.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PreprocessStep {
    /// 填补每个实例内部的背景空洞. 只作用于掩码.
    FillLabelHoles,

    /// 百分位归一化. 只作用于图像.
    Normalize(NormalizeParams),

    /// 缩放到目标放大倍率. 同时作用于图像与掩码, 掩码总是使用最近邻插值.
    Rescale {
        /// 目标放大倍率.
        magnification: Magnification,
        /// 图像的插值方式.
        interpolation: Interpolation,
    },
}

const NORMALIZE_SIGNATURE: &[Param] = &[
    ("pmin", &[]),
    ("pmax", &[]),
    ("axis", &[]),
    ("clip", &[]),
    ("eps", &[]),
];
const RESCALE_SIGNATURE: &[Param] = &[("magnification", &[]), ("interpolation", &[])];

impl PreprocessStep {
    /// 配置中使用的名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FillLabelHoles => "fill_label_holes",
            Self::Normalize(_) => "normalize",
            Self::Rescale { .. } => "rescale",
        }
    }

    /// 从一个配置条目解析.
    ///
    /// `fill_label_holes` 只接受裸名称; `normalize` 与 `rescale` 必须带参数.
    pub fn from_value(entry: &Value) -> Result<Self, ConfigError> {
        let (name, raw) = split_entry(entry)?;
        let needs_params = || {
            ConfigError::InvalidParams(name.to_string(), "expected a parameter mapping or list".into())
        };
        match (name, entry.is_string()) {
            ("fill_label_holes", true) => Ok(Self::FillLabelHoles),
            ("normalize", false) => {
                let params = Params::resolve(name, raw, NORMALIZE_SIGNATURE)?;
                params.require_null("axis")?;
                let pmin = params.f64_or("pmin", DEFAULT_PMIN)?;
                let pmax = params.f64_or("pmax", DEFAULT_PMAX)?;
                for p in [pmin, pmax] {
                    if !(0.0..=100.0).contains(&p) {
                        return Err(ConfigError::InvalidParams(
                            name.to_string(),
                            format!("percentile {p} is outside [0, 100]"),
                        ));
                    }
                }
                Ok(Self::Normalize(NormalizeParams {
                    pmin,
                    pmax,
                    clip: params.bool_or("clip", false)?,
                    eps: params.f64_or("eps", DEFAULT_EPS as f64)? as f32,
                }))
            }
            ("rescale", false) => {
                let params = Params::resolve(name, raw, RESCALE_SIGNATURE)?;
                let magnification = params
                    .str_opt("magnification")?
                    .ok_or(ConfigError::MissingField("magnification"))?
                    .parse()?;
                let interpolation = match params.str_opt("interpolation")? {
                    Some(s) => s.parse()?,
                    None => Interpolation::default(),
                };
                Ok(Self::Rescale {
                    magnification,
                    interpolation,
                })
            }
            ("normalize" | "rescale", true) | ("fill_label_holes", false) => Err(needs_params()),
            (unknown, _) => Err(ConfigError::UnknownTransform(unknown.to_string())),
        }
    }
}

/// 有序的预处理配置.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreprocessConfig {
    steps: Vec<PreprocessStep>,
}

impl PreprocessConfig {
    /// 直接从步骤序列创建.
    #[inline]
    pub fn new(steps: Vec<PreprocessStep>) -> Self {
        Self { steps }
    }

    /// 步骤序列.
    #[inline]
    pub fn steps(&self) -> &[PreprocessStep] {
        &self.steps
    }

    /// 从 JSON 数组解析.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let Some(entries) = value.as_array() else {
            return Err(ConfigError::MalformedEntry(value.to_string()));
        };
        let steps = entries
            .iter()
            .map(PreprocessStep::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl<'de> Deserialize<'de> for PreprocessConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// 训练集与测试集各自的预处理配置.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PreprocessParams {
    /// 训练集.
    pub train: PreprocessConfig,
    /// 测试集.
    pub test: PreprocessConfig,
}

/// 对每个值执行 `op`. 启用 `rayon` 时并行执行, 结果与顺序执行一致.
fn try_map_values<V, F>(map: BTreeMap<String, V>, op: F) -> crate::Result<BTreeMap<String, V>>
where
    V: Send,
    F: Fn(&str, V) -> crate::Result<V> + Sync + Send,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            map.into_par_iter()
                .map(|(name, v)| Ok((name.clone(), op(&name, v)?)))
                .collect()
        } else {
            map.into_iter()
                .map(|(name, v)| Ok((name.clone(), op(&name, v)?)))
                .collect()
        }
    }
}

/// 预处理一个划分.
///
/// 先将所有图像转为灰度图, 再依次执行 `config` 中的步骤.
/// `rescale` 按名称在元数据表中查找原始放大倍率, 缺行时返回 [`crate::LookupError`].
pub fn preprocess_split(split: SplitRecord, config: &PreprocessConfig) -> crate::Result<SplitRecord> {
    let SplitRecord {
        mut images,
        mut masks,
        table,
    } = split;

    images = try_map_values(images, |_, image| Ok(image.to_grayscale()?))?;

    for step in config.steps() {
        log::debug!("preprocess: {} on {} images", step.name(), images.len());
        match *step {
            PreprocessStep::FillLabelHoles => {
                masks = try_map_values(masks, |_, mask| Ok(mask.fill_label_holes()))?;
            }
            PreprocessStep::Normalize(params) => {
                images = try_map_values(images, |_, image| Ok(normalize(image, &params)))?;
            }
            PreprocessStep::Rescale {
                magnification,
                interpolation,
            } => {
                let factor = |name: &str| -> crate::Result<f64> {
                    Ok(table.magnification(name)?.factor_to(magnification))
                };
                images = try_map_values(images, |name, image| {
                    Ok(resize_image(&image, factor(name)?, interpolation))
                })?;
                masks = try_map_values(masks, |name, mask| Ok(resize_mask(&mask, factor(name)?)))?;
            }
        }
    }

    Ok(SplitRecord {
        images,
        masks,
        table,
    })
}

impl Dataset {
    /// 分别预处理训练集与测试集.
    pub fn preprocess(self, params: &PreprocessParams) -> crate::Result<Dataset> {
        Ok(Dataset {
            train: preprocess_split(self.train, &params.train)?,
            test: preprocess_split(self.test, &params.test)?,
        })
    }
}
