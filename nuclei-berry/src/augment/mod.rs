//! 训练样本对 (图像, 实例掩码) 的随机数据增强.
//!
//! 所有变换都保证图像与掩码在空间上始终对齐. 随机数的消耗顺序是固定的,
//! 因此在相同种子下结果可复现.

mod config;

pub use config::{AugmentConfig, AugmentStep};

use crate::consts::augment::*;
use crate::data::{InstanceMask, NucleiImage};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// 一个 (图像, 实例掩码) 样本对.
pub type Pair = (NucleiImage, InstanceMask);

/// 数据增强器. 持有一份增强配置和一个随机源.
///
/// 变换以值传递方式消费输入, 调用方不应假设输入数组在增强后仍然保持原样.
#[derive(Debug, Clone)]
pub struct Augmenter<R = StdRng> {
    config: AugmentConfig,
    rng: R,
}

impl Augmenter<StdRng> {
    /// 以系统熵初始化随机源.
    pub fn new(config: AugmentConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// 以固定种子初始化随机源.
    pub fn seeded(config: AugmentConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Augmenter<R> {
    /// 使用给定的随机源.
    #[inline]
    pub fn with_rng(config: AugmentConfig, rng: R) -> Self {
        Self { config, rng }
    }

    /// 增强配置.
    #[inline]
    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// 一次伯努利试验. `p = 0` 永不触发, `p = 1` 必定触发.
    #[inline]
    fn hit(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    /// 以 `probability` 的概率沿行轴翻转, 再独立地以 `probability`
    /// 的概率沿列轴翻转. 行轴的随机数一定先于列轴抽取.
    pub fn random_flip(
        &mut self,
        mut image: NucleiImage,
        mut mask: InstanceMask,
        probability: f64,
    ) -> Pair {
        for axis in 0..2 {
            if self.hit(probability) {
                image.flip(axis);
                mask.flip(axis);
            }
        }
        (image, mask)
    }

    /// 以 `probability` 的概率随机置换掩码的轴, 并对图像的前导空间轴应用同一置换.
    /// 图像末尾的通道轴保持原位.
    pub fn random_rotate(
        &mut self,
        image: NucleiImage,
        mask: InstanceMask,
        probability: f64,
    ) -> Result<Pair> {
        if !self.hit(probability) {
            return Ok((image, mask));
        }
        let mut perm = [0, 1];
        perm.shuffle(&mut self.rng);
        log::trace!("random_rotate: permutation {perm:?}");
        Ok((image.permute_leading(&perm)?, mask.permuted(perm)))
    }

    /// 从闭区间 `scale_range` 抽取缩放, 再从闭区间 `bias_range` 抽取偏置,
    /// 将图像变换为 `image * scale + bias`. 掩码不变.
    pub fn random_intensity_change(
        &mut self,
        mut image: NucleiImage,
        mask: InstanceMask,
        scale_range: (f32, f32),
        bias_range: (f32, f32),
    ) -> Pair {
        let scale = self.rng.gen_range(scale_range.0..=scale_range.1);
        let bias = self.rng.gen_range(bias_range.0..=bias_range.1);
        log::trace!("random_intensity_change: scale {scale}, bias {bias}");
        image.map_inplace(|v| v * scale + bias);
        (image, mask)
    }

    /// 执行单个步骤.
    pub fn apply_step(&mut self, step: AugmentStep, image: NucleiImage, mask: InstanceMask) -> Result<Pair> {
        match step {
            AugmentStep::RandomFlip { probability } => Ok(self.random_flip(image, mask, probability)),
            AugmentStep::RandomRotate { probability } => self.random_rotate(image, mask, probability),
            AugmentStep::RandomIntensityChange {
                scale_range,
                bias_range,
            } => Ok(self.random_intensity_change(image, mask, scale_range, bias_range)),
        }
    }

    /// 按配置顺序依次执行所有步骤.
    ///
    /// 图像与掩码的空间尺寸不一致时, 在触碰任何数据之前返回错误.
    pub fn apply(&mut self, image: NucleiImage, mask: InstanceMask) -> Result<Pair> {
        image.check_aligned(&mask)?;
        let steps = self.config.steps().to_vec();
        let mut pair = (image, mask);
        for step in steps {
            pair = self.apply_step(step, pair.0, pair.1)?;
        }
        Ok(pair)
    }
}

/// 使用默认参数的便捷方法.
impl<R: Rng> Augmenter<R> {
    /// 默认概率 0.5 的 [`Self::random_flip`].
    #[inline]
    pub fn random_flip_default(&mut self, image: NucleiImage, mask: InstanceMask) -> Pair {
        self.random_flip(image, mask, DEFAULT_PROBABILITY)
    }

    /// 默认区间的 [`Self::random_intensity_change`].
    #[inline]
    pub fn random_intensity_change_default(&mut self, image: NucleiImage, mask: InstanceMask) -> Pair {
        self.random_intensity_change(image, mask, DEFAULT_SCALE_RANGE, DEFAULT_BIAS_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3, Axis};
    use serde_json::json;

    fn sample() -> Pair {
        let image = NucleiImage::from_channels(Array3::from_shape_fn((3, 4, 2), |(y, x, c)| {
            (y * 100 + x * 10 + c) as f32
        }));
        let mask = InstanceMask::new(Array2::from_shape_fn((3, 4), |(y, x)| (y * 4 + x) as u32));
        (image, mask)
    }

    fn empty() -> Augmenter {
        Augmenter::seeded(AugmentConfig::default(), 7)
    }

    #[test]
    fn test_flip_probability_zero_is_identity() {
        let mut aug = empty();
        for _ in 0..20 {
            let (image, mask) = sample();
            let (i2, m2) = aug.random_flip(image.clone(), mask.clone(), 0.0);
            assert_eq!(i2, image);
            assert_eq!(m2, mask);
        }
    }

    #[test]
    fn test_flip_probability_one_flips_both_axes() {
        let mut aug = empty();
        let (image, mask) = sample();
        let (i2, m2) = aug.random_flip(image.clone(), mask.clone(), 1.0);

        let mut want = mask.into_raw();
        want.invert_axis(Axis(0));
        want.invert_axis(Axis(1));
        assert_eq!(m2.array_view(), want.view());

        // 图像与掩码逐像素对齐.
        let (h, w) = m2.shape();
        for y in 0..h {
            for x in 0..w {
                let label = m2[(y, x)] as usize;
                let (oy, ox) = (label / 4, label % 4);
                assert_eq!(i2[&[y, x, 1][..]], image[&[oy, ox, 1][..]]);
            }
        }
    }

    #[test]
    fn test_rotate_is_consistent_and_invertible() {
        let mut aug = empty();
        for _ in 0..10 {
            let (image, mask) = sample();
            let (i2, m2) = aug.random_rotate(image.clone(), mask.clone(), 1.0).unwrap();
            assert_eq!(i2.shape()[2], 2);
            let transposed = m2.shape() != mask.shape();
            let (h, w) = m2.shape();
            for y in 0..h {
                for x in 0..w {
                    let label = m2[(y, x)] as usize;
                    let (oy, ox) = (label / 4, label % 4);
                    assert_eq!(i2[&[y, x, 0][..]], image[&[oy, ox, 0][..]]);
                }
            }
            // 逆置换还原掩码. 二维时置换即为自身的逆.
            let restored = if transposed { m2.permuted([1, 0]) } else { m2 };
            assert_eq!(restored, mask);
        }
    }

    #[test]
    fn test_rotate_gray_image() {
        let mut aug = empty();
        let image = NucleiImage::from_gray(Array2::from_shape_fn((2, 5), |(y, x)| (y * 5 + x) as f32));
        let mask = InstanceMask::background((2, 5));
        let (i2, m2) = aug.random_rotate(image, mask, 1.0).unwrap();
        assert_eq!(i2.spatial_shape(), m2.shape());
    }

    #[test]
    fn test_intensity_change_exact() {
        let mut aug = empty();
        let (image, mask) = sample();
        let (i2, m2) = aug.random_intensity_change(image.clone(), mask.clone(), (2.0, 2.0), (0.5, 0.5));
        assert_eq!(m2, mask);
        for (a, b) in image.data().iter().zip(i2.data().iter()) {
            assert_eq!(a * 2.0 + 0.5, *b);
        }
    }

    #[test]
    fn test_intensity_change_seeded_draw() {
        let (image, mask) = sample();
        let mut a = empty();
        let (out, _) = a.random_intensity_change(image.clone(), mask, (0.6, 2.0), (-0.2, 2.0));

        let mut rng = StdRng::seed_from_u64(7);
        let scale: f32 = rng.gen_range(0.6..=2.0);
        let bias: f32 = rng.gen_range(-0.2..=2.0);
        for (a, b) in image.data().iter().zip(out.data().iter()) {
            assert_eq!(a * scale + bias, *b);
        }
    }

    #[test]
    fn test_identity_intensity_config_keeps_values() {
        let config = AugmentConfig::from_value(&json!([
            "random_flip",
            {"random_intensity_change": {"scale_range": [1.0, 1.0], "bias_range": [0.0, 0.0]}},
        ]))
        .unwrap();
        let mut aug = Augmenter::seeded(config, 123);
        let (image, mask) = sample();
        let (i2, _) = aug.apply(image.clone(), mask).unwrap();

        let mut before: Vec<f32> = image.data().iter().copied().collect();
        let mut after: Vec<f32> = i2.data().iter().copied().collect();
        before.sort_by(f32::total_cmp);
        after.sort_by(f32::total_cmp);
        assert_eq!(before, after);
    }

    #[test]
    fn test_apply_rejects_misaligned() {
        let mut aug = Augmenter::seeded(AugmentConfig::new(vec![AugmentStep::RandomFlip { probability: 1.0 }]), 0);
        let image = NucleiImage::from_gray(Array2::zeros((3, 3)));
        let mask = InstanceMask::background((3, 4));
        assert!(aug.apply(image, mask).is_err());
    }

    #[test]
    fn test_order_matters() {
        let flip_then_rotate = AugmentConfig::new(vec![
            AugmentStep::RandomFlip { probability: 1.0 },
            AugmentStep::RandomRotate { probability: 1.0 },
        ]);
        let (image, mask) = sample();
        let mut aug = Augmenter::seeded(flip_then_rotate, 99);
        let (_, m2) = aug.apply(image, mask.clone()).unwrap();
        // 两步之后标签集合不变, 仅位置改变.
        assert_eq!(m2.labels(), mask.labels());
    }

    #[test]
    fn test_apply_runs_steps_in_order() {
        let steps = vec![
            AugmentStep::RandomFlip { probability: 0.5 },
            AugmentStep::RandomRotate { probability: 0.5 },
            AugmentStep::RandomIntensityChange {
                scale_range: (0.5, 1.5),
                bias_range: (-1.0, 1.0),
            },
        ];
        let (image, mask) = sample();
        let mut whole = Augmenter::seeded(AugmentConfig::new(steps.clone()), 5);
        let got = whole.apply(image.clone(), mask.clone()).unwrap();

        let mut manual = Augmenter::seeded(AugmentConfig::default(), 5);
        let mut want = (image, mask);
        for step in steps {
            want = manual.apply_step(step, want.0, want.1).unwrap();
        }
        assert_eq!(got, want);
        assert_eq!(whole.config().steps().len(), 3);
    }
}
