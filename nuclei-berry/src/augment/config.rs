use crate::config::entry::{split_entry, Param, Params};
use crate::consts::augment::*;
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// 单个数据增强步骤. 参数在加载配置时就已确定.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AugmentStep {
    /// 以 `probability` 的概率分别沿行轴、列轴翻转.
    RandomFlip {
        /// 每个轴独立的触发概率.
        probability: f64,
    },

    /// 以 `probability` 的概率随机置换空间轴.
    RandomRotate {
        /// 触发概率.
        probability: f64,
    },

    /// 随机线性变换像素强度: `image * scale + bias`.
    RandomIntensityChange {
        /// 缩放因子的闭区间.
        scale_range: (f32, f32),
        /// 偏置的闭区间.
        bias_range: (f32, f32),
    },
}

const FLIP_SIGNATURE: &[Param] = &[("probability", &[])];
const ROTATE_SIGNATURE: &[Param] = &[("probability", &[])];
const INTENSITY_SIGNATURE: &[Param] = &[
    ("scale_range", &["img_intensity_scale_range"]),
    ("bias_range", &["img_intensity_bias_range"]),
];

impl AugmentStep {
    /// 配置中使用的名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomFlip { .. } => "random_flip",
            Self::RandomRotate { .. } => "random_rotate",
            Self::RandomIntensityChange { .. } => "random_intensity_change",
        }
    }

    /// 从一个配置条目解析.
    pub fn from_value(entry: &Value) -> Result<Self, ConfigError> {
        let (name, raw) = split_entry(entry)?;
        match name {
            "random_flip" => {
                let params = Params::resolve(name, raw, FLIP_SIGNATURE)?;
                Ok(Self::RandomFlip {
                    probability: params.probability_or("probability", DEFAULT_PROBABILITY)?,
                })
            }
            "random_rotate" => {
                let params = Params::resolve(name, raw, ROTATE_SIGNATURE)?;
                Ok(Self::RandomRotate {
                    probability: params.probability_or("probability", DEFAULT_PROBABILITY)?,
                })
            }
            "random_intensity_change" => {
                let params = Params::resolve(name, raw, INTENSITY_SIGNATURE)?;
                Ok(Self::RandomIntensityChange {
                    scale_range: params.range_or("scale_range", DEFAULT_SCALE_RANGE)?,
                    bias_range: params.range_or("bias_range", DEFAULT_BIAS_RANGE)?,
                })
            }
            unknown => Err(ConfigError::UnknownTransform(unknown.to_string())),
        }
    }
}

/// 有序的数据增强配置. 步骤严格按给定顺序执行.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AugmentConfig {
    steps: Vec<AugmentStep>,
}

impl AugmentConfig {
    /// 直接从步骤序列创建.
    #[inline]
    pub fn new(steps: Vec<AugmentStep>) -> Self {
        Self { steps }
    }

    /// 步骤序列.
    #[inline]
    pub fn steps(&self) -> &[AugmentStep] {
        &self.steps
    }

    /// 从 JSON 数组解析. 任何一个条目不合法都会使整个配置失败.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let Some(entries) = value.as_array() else {
            return Err(ConfigError::MalformedEntry(value.to_string()));
        };
        let steps = entries
            .iter()
            .map(AugmentStep::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl FromStr for AugmentConfig {
    type Err = crate::Error;

    /// 从 JSON 文本解析.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s)?;
        Ok(Self::from_value(&value)?)
    }
}

impl<'de> Deserialize<'de> for AugmentConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_forms() {
        let config = AugmentConfig::from_value(&json!([
            "random_flip",
            {"random_rotate": [0.25]},
            {"random_intensity_change": {"scale_range": [1.0, 1.0], "bias_range": [0.0, 0.0]}},
        ]))
        .unwrap();
        assert_eq!(
            config.steps(),
            &[
                AugmentStep::RandomFlip { probability: 0.5 },
                AugmentStep::RandomRotate { probability: 0.25 },
                AugmentStep::RandomIntensityChange {
                    scale_range: (1.0, 1.0),
                    bias_range: (0.0, 0.0)
                },
            ]
        );
    }

    #[test]
    fn test_alias_keyword_names() {
        let step = AugmentStep::from_value(&json!({
            "random_intensity_change": {"img_intensity_scale_range": [0.5, 1.5]}
        }))
        .unwrap();
        assert_eq!(
            step,
            AugmentStep::RandomIntensityChange {
                scale_range: (0.5, 1.5),
                bias_range: DEFAULT_BIAS_RANGE,
            }
        );
    }

    #[test]
    fn test_unknown_name_fails_fast() {
        let err = AugmentConfig::from_value(&json!(["random_flip", "random_warp"])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownTransform("random_warp".into()));
    }

    #[test]
    fn test_bad_params() {
        assert!(AugmentStep::from_value(&json!({"random_flip": {"probability": 1.5}})).is_err());
        assert!(AugmentStep::from_value(&json!({"random_flip": [0.1, 0.2]})).is_err());
        assert!(AugmentConfig::from_value(&json!({"random_flip": []})).is_err());
    }

    #[test]
    fn test_from_str() {
        let config: AugmentConfig = r#"["random_rotate"]"#.parse().unwrap();
        assert_eq!(config.steps().len(), 1);
        assert!("[\"nope\"]".parse::<AugmentConfig>().is_err());
    }
}
