//! 流水线配置.
//!
//! 一份 JSON 文件描述整条流水线. 所有声明式条目都在加载时解析为强类型记录,
//! 未知名称或非法参数会让 [`PipelineConfig::open`] 直接失败.

pub(crate) mod entry;

use crate::augment::AugmentConfig;
use crate::dataset::{DataSource, DataSourceConfig};
use crate::error::Result;
use crate::eval::EvaluationMetrics;
use crate::model::{ModelConfig, ModelSource, TrainingParams};
use crate::preprocess::PreprocessParams;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 整条流水线的配置.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// 训练时的数据增强.
    #[serde(default)]
    pub augmentations: AugmentConfig,

    /// 训练集与测试集的预处理.
    #[serde(default)]
    pub preprocessing: PreprocessParams,

    /// 评估指标.
    pub evaluation_metrics: EvaluationMetrics,

    /// 模型来源.
    #[serde(default)]
    pub model: ModelConfig,

    /// 训练参数.
    #[serde(default)]
    pub training: TrainingParams,

    /// 数据来源. 缺省时认为数据集已在本地.
    #[serde(default)]
    pub data_source: Option<DataSourceConfig>,
}

impl FromStr for PipelineConfig {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl PipelineConfig {
    /// 从 JSON 文件读取并校验.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = text.parse()?;
        log::debug!("pipeline config loaded from {}", path.as_ref().display());
        Ok(config)
    }

    /// 校验反序列化阶段无法检查的组合约束.
    pub fn validate(&self) -> Result<()> {
        self.model_source()?;
        self.data_source()?;
        Ok(())
    }

    /// 模型来源.
    pub fn model_source(&self) -> Result<ModelSource> {
        Ok(self.model.source()?)
    }

    /// 数据来源.
    pub fn data_source(&self) -> Result<Option<DataSource>> {
        match &self.data_source {
            Some(c) => Ok(Some(c.resolve()?)),
            None => Ok(None),
        }
    }
}
