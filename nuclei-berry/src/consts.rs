//! 通用常量.

/// 实例标签相关.
pub mod label {
    /// 实例掩码中背景的像素值. 所有正整数均代表某个独立的细胞核实例.
    pub const BACKGROUND: u32 = 0;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u32) -> bool {
        p == BACKGROUND
    }

    /// 像素是否属于某个实例?
    #[inline]
    pub const fn is_instance(p: u32) -> bool {
        p != BACKGROUND
    }
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// RGB 转灰度时红色通道的权重 (ITU-R BT.601).
    pub const WEIGHT_R: f32 = 0.299;

    /// RGB 转灰度时绿色通道的权重.
    pub const WEIGHT_G: f32 = 0.587;

    /// RGB 转灰度时蓝色通道的权重.
    pub const WEIGHT_B: f32 = 0.114;
}

/// 数据增强默认参数.
pub mod augment {
    /// `random_flip` 和 `random_rotate` 的默认触发概率.
    pub const DEFAULT_PROBABILITY: f64 = 0.5;

    /// `random_intensity_change` 默认的缩放区间 (闭区间).
    pub const DEFAULT_SCALE_RANGE: (f32, f32) = (0.6, 2.0);

    /// `random_intensity_change` 默认的偏置区间 (闭区间).
    pub const DEFAULT_BIAS_RANGE: (f32, f32) = (-0.2, 2.0);
}

/// 预处理默认参数.
pub mod preprocess {
    /// 百分位归一化的默认下百分位.
    pub const DEFAULT_PMIN: f64 = 3.0;

    /// 百分位归一化的默认上百分位.
    pub const DEFAULT_PMAX: f64 = 99.8;

    /// 百分位归一化分母上的默认平滑项.
    pub const DEFAULT_EPS: f32 = 1e-20;
}

/// 评估默认参数.
pub mod eval {
    /// 计算 Dice 系数和 IoU 时使用的默认 IoU 匹配阈值.
    pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

    /// 安全除法中视为 "零" 的分母上界.
    pub const SAFE_DIVIDE_EPS: f64 = 1e-10;
}

/// 模型默认参数.
pub mod model {
    /// 新建模型的默认名称.
    pub const DEFAULT_NAME: &str = "stardist";

    /// 新建模型的默认存放目录.
    pub const DEFAULT_BASEDIR: &str = "data/06_models";
}
