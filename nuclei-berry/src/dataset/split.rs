use super::MetaTable;
use crate::data::{InstanceMask, NucleiImage};
use crate::error::LookupError;
use std::collections::BTreeMap;

/// 一个数据划分 (训练集或测试集): 按名称索引的图像、掩码与元数据表.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitRecord {
    /// 图像, 按名称索引.
    pub images: BTreeMap<String, NucleiImage>,

    /// 实例掩码, 按名称索引.
    pub masks: BTreeMap<String, InstanceMask>,

    /// 元数据表.
    pub table: MetaTable,
}

impl SplitRecord {
    /// 直接初始化, 并检查一致性.
    pub fn new(
        images: BTreeMap<String, NucleiImage>,
        masks: BTreeMap<String, InstanceMask>,
        table: MetaTable,
    ) -> crate::Result<Self> {
        let ans = Self {
            images,
            masks,
            table,
        };
        ans.validate()?;
        Ok(ans)
    }

    /// 按名称获取图像.
    pub fn image(&self, name: &str) -> Result<&NucleiImage, LookupError> {
        self.images
            .get(name)
            .ok_or_else(|| LookupError::Image(name.to_string()))
    }

    /// 按名称获取掩码.
    pub fn mask(&self, name: &str) -> Result<&InstanceMask, LookupError> {
        self.masks
            .get(name)
            .ok_or_else(|| LookupError::Mask(name.to_string()))
    }

    /// 图像名称, 升序.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// 图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// 是否不含任何图像.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 按名称升序遍历 (名称, 图像, 掩码).
    ///
    /// 任一图像缺少掩码时, 对应项为 `Err`.
    pub fn pairs(&self) -> impl Iterator<Item = Result<(&str, &NucleiImage, &InstanceMask), LookupError>> {
        self.images
            .iter()
            .map(|(name, image)| Ok((name.as_str(), image, self.mask(name)?)))
    }

    /// 检查一致性:
    ///
    /// 1. 每张图像都有掩码, 每个掩码都有图像;
    /// 2. 每个名称都出现在元数据表中;
    /// 3. 图像与掩码空间尺寸一致.
    pub fn validate(&self) -> crate::Result<()> {
        for name in self.masks.keys() {
            self.image(name)?;
        }
        for pair in self.pairs() {
            let (name, image, mask) = pair?;
            self.table.row(name)?;
            image.check_aligned(mask)?;
        }
        Ok(())
    }
}
