use image::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 随机但稳定的实例标签色表.
///
/// 同一 `seed` 下, 同一标签永远得到同一颜色; 背景 (0) 永远为黑色.
/// 颜色在 HLS 空间中采样: 色相 `[0, 1)`, 亮度 `[0.4, 1)`, 饱和度 `[0.2, 0.8)`.
#[derive(Copy, Clone, Debug)]
pub struct LabelColormap {
    seed: u64,
}

impl Default for LabelColormap {
    #[inline]
    fn default() -> Self {
        Self::new(42)
    }
}

/// HLS 分量转换辅助函数.
fn hls_channel(m1: f32, m2: f32, hue: f32) -> f32 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// HLS 转 RGB, 各分量均在 `[0, 1]`.
pub(crate) fn hls_to_rgb(h: f32, l: f32, s: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l, l, l];
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    [
        hls_channel(m1, m2, h + 1.0 / 3.0),
        hls_channel(m1, m2, h),
        hls_channel(m1, m2, h - 1.0 / 3.0),
    ]
}

impl LabelColormap {
    /// 以 `seed` 创建色表.
    #[inline]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// 标签 `label` 对应的颜色.
    pub fn color(&self, label: u32) -> Rgb<u8> {
        if label == crate::consts::label::BACKGROUND {
            return Rgb([0, 0, 0]);
        }
        let mut rng = StdRng::seed_from_u64(
            self.seed ^ (label as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let h: f32 = rng.gen_range(0.0..1.0);
        let l: f32 = rng.gen_range(0.4..1.0);
        let s: f32 = rng.gen_range(0.2..0.8);
        Rgb(hls_to_rgb(h, l, s).map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    }
}
