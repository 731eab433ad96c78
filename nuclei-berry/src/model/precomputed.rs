use super::{Prediction, PredictionDetails, SegmentationModel, Thresholds, TrainingParams, DEFAULT_N_RAYS};
use crate::augment::Augmenter;
use crate::data::{InstanceMask, NucleiImage};
use crate::dataset::{index_dir, SplitRecord};
use crate::error::{Error, LookupError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// 由事先算好的预测掩码构成的模型. 训练为空操作.
///
/// 只能通过 [`SegmentationModel::predict_named`] 按名称预测.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrecomputedModel {
    masks: BTreeMap<String, InstanceMask>,
    thresholds: Option<Thresholds>,
}

impl FromIterator<(String, InstanceMask)> for PrecomputedModel {
    fn from_iter<I: IntoIterator<Item = (String, InstanceMask)>>(iter: I) -> Self {
        Self {
            masks: iter.into_iter().collect(),
            thresholds: None,
        }
    }
}

impl PrecomputedModel {
    /// 读取目录下所有掩码文件 (`.npy` 或图像), 以不含扩展名的文件名为键.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut masks = BTreeMap::new();
        for (name, path) in index_dir(dir.as_ref())? {
            masks.insert(name, InstanceMask::open(path)?);
        }
        log::info!("loaded {} precomputed predictions from {:?}", masks.len(), dir.as_ref());
        Ok(Self {
            masks,
            thresholds: None,
        })
    }

    /// 指定 [`SegmentationModel::optimize_thresholds`] 报告的阈值.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// 预测掩码个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// 是否没有任何预测.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

impl SegmentationModel for PrecomputedModel {
    fn predict(&self, _: &NucleiImage) -> Result<Prediction> {
        Err(Error::Model("precomputed predictions are looked up by image name".into()))
    }

    fn predict_named(&self, name: &str, _: &NucleiImage) -> Result<Prediction> {
        let mask = self
            .masks
            .get(name)
            .ok_or_else(|| LookupError::Prediction(name.to_string()))?;
        Ok((mask.clone(), PredictionDetails::from_mask(mask, DEFAULT_N_RAYS)))
    }

    fn train(&mut self, _: &SplitRecord, _: &mut Augmenter, _: Option<&SplitRecord>, _: &TrainingParams) -> Result<()> {
        log::warn!("precomputed model cannot be trained, ignoring");
        Ok(())
    }

    fn optimize_thresholds(&mut self, _: &SplitRecord) -> Result<Thresholds> {
        self.thresholds
            .ok_or_else(|| Error::Model("precomputed model has no thresholds".into()))
    }
}
