//! 分割模型协作者.
//!
//! 网络本身不在本 crate 中实现, 只通过 [`SegmentationModel`] 描述它需要提供的能力.

mod details;
mod precomputed;

pub use details::{PredictionDetails, DEFAULT_N_RAYS};
pub use precomputed::PrecomputedModel;

use crate::augment::Augmenter;
use crate::consts::model::*;
use crate::data::{InstanceMask, NucleiImage};
use crate::dataset::SplitRecord;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 单幅图像的预测: 实例掩码与几何细节.
pub type Prediction = (InstanceMask, PredictionDetails);

/// 后处理阈值.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// 目标概率阈值.
    pub prob: f64,
    /// 非极大值抑制的重叠阈值.
    pub nms: f64,
}

/// 训练参数.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TrainingParams {
    /// 是否在给定数据上继续训练. 为 `false` 时直接使用模型现有权重.
    #[serde(default)]
    pub finetune: bool,

    /// 其余参数原样交给模型实现.
    #[serde(flatten)]
    pub backend: Map<String, Value>,
}

/// 星凸多边形实例分割模型.
pub trait SegmentationModel {
    /// 对单幅图像预测实例.
    fn predict(&self, image: &NucleiImage) -> Result<Prediction>;

    /// 已知图像名称时的预测. 默认忽略名称.
    fn predict_named(&self, name: &str, image: &NucleiImage) -> Result<Prediction> {
        let _ = name;
        self.predict(image)
    }

    /// 在训练集上训练, 每个样本对先经过 `augmenter`.
    fn train(
        &mut self,
        train: &SplitRecord,
        augmenter: &mut Augmenter,
        validation: Option<&SplitRecord>,
        params: &TrainingParams,
    ) -> Result<()>;

    /// 在验证集上搜索最优的后处理阈值.
    fn optimize_thresholds(&mut self, validation: &SplitRecord) -> Result<Thresholds>;
}

/// 模型配置.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    /// 是否使用预训练模型.
    #[serde(default)]
    pub pretrained: bool,

    /// 模型名称.
    #[serde(default)]
    pub name: Option<String>,

    /// 新建模型的存放目录.
    #[serde(default)]
    pub basedir: Option<PathBuf>,
}

/// 校验后的模型来源.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    /// 按名称获取预训练模型.
    Pretrained {
        /// 预训练模型名称.
        name: String,
    },
    /// 新建模型.
    Fresh {
        /// 模型名称.
        name: String,
        /// 存放目录.
        basedir: PathBuf,
    },
}

impl ModelConfig {
    /// 校验配置. 预训练模型必须给出名称.
    pub fn source(&self) -> std::result::Result<ModelSource, ConfigError> {
        if self.pretrained {
            let name = self.name.clone().ok_or(ConfigError::MissingField("name"))?;
            return Ok(ModelSource::Pretrained { name });
        }
        Ok(ModelSource::Fresh {
            name: self.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string()),
            basedir: self.basedir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_BASEDIR)),
        })
    }
}

/// 仅当 `params.finetune` 为 `true` 时训练. 返回是否进行了训练.
pub fn train_model<M: SegmentationModel + ?Sized>(
    model: &mut M,
    train: &SplitRecord,
    augmenter: &mut Augmenter,
    validation: Option<&SplitRecord>,
    params: &TrainingParams,
) -> Result<bool> {
    if !params.finetune {
        log::info!("finetune disabled, keeping current weights");
        return Ok(false);
    }
    log::info!("training on {} images", train.len());
    model.train(train, augmenter, validation, params)?;
    Ok(true)
}

/// 一个划分上的全部预测.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predictions {
    /// 预测掩码, 按图像名称索引.
    pub masks: BTreeMap<String, InstanceMask>,
    /// 预测细节, 按图像名称索引.
    pub details: BTreeMap<String, PredictionDetails>,
}

/// 对划分中的每幅图像预测, 按名称升序进行.
pub fn make_predictions<M: SegmentationModel + ?Sized>(model: &M, split: &SplitRecord) -> Result<Predictions> {
    let mut ans = Predictions::default();
    for (name, image) in split.images.iter() {
        let (mask, details) = model.predict_named(name, image)?;
        image.check_aligned(&mask)?;
        ans.masks.insert(name.clone(), mask);
        ans.details.insert(name.clone(), details);
    }
    log::debug!("predicted {} images", ans.masks.len());
    Ok(ans)
}
