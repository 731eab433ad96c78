//! 运行时错误.
//!
//! 所有错误都会立即中止当前步骤, 不做任何重试.

use thiserror::Error;

/// 配置错误. 在配置加载阶段 (而非数据处理阶段) 抛出.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// 未知的数据增强或预处理变换名.
    #[error("unknown transformation `{0}`")]
    UnknownTransform(String),

    /// 未知的评估指标名.
    #[error("unknown evaluation metric `{0}`")]
    UnknownMetric(String),

    /// 未知的插值方式.
    #[error("unknown interpolation `{0}`")]
    UnknownInterpolation(String),

    /// 变换参数不合法. 第一个参数为变换名, 第二个参数为具体原因.
    #[error("invalid parameters for `{0}`: {1}")]
    InvalidParams(String, String),

    /// 配置条目的结构不合法 (既不是字符串也不是单键映射).
    #[error("malformed config entry: {0}")]
    MalformedEntry(String),

    /// 缺少必需字段.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// 放大倍率字符串无法解析, 如 `"x20"`.
    #[error("invalid magnification `{0}`")]
    InvalidMagnification(String),

    /// 不支持的数据源.
    #[error("unsupported data source `{0}`, supported clouds: {1:?}")]
    UnsupportedSource(String, &'static [&'static str]),
}

/// 查找错误: 请求的键在数据集中不存在.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// 缺少图像.
    #[error("image `{0}` not found")]
    Image(String),

    /// 缺少掩码.
    #[error("mask `{0}` not found")]
    Mask(String),

    /// 元数据表中缺少对应行.
    #[error("metadata row `{0}` not found")]
    MetaRow(String),

    /// 缺少预测结果.
    #[error("prediction `{0}` not found")]
    Prediction(String),

    /// 元数据表中没有任何类别, 无法按类别求平均.
    #[error("metadata table has no classes")]
    NoClasses,
}

/// 形状错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// 图像与掩码的空间尺寸不一致. 分别为图像空间尺寸和掩码尺寸.
    #[error("image spatial shape {0:?} does not match mask shape {1:?}")]
    Misaligned(Vec<usize>, Vec<usize>),

    /// 不支持的维度数.
    #[error("unsupported number of dimensions: {0}")]
    UnsupportedNdim(usize),

    /// 无法解释为灰度或颜色的通道数.
    #[error("unsupported number of channels: {0}")]
    UnsupportedChannels(usize),

    /// 两个掩码的形状不一致.
    #[error("label maps have different shapes: {0:?} vs {1:?}")]
    LabelMismatch(Vec<usize>, Vec<usize>),

    /// 成对数据的数量不一致.
    #[error("expected equally long sequences, got {0} and {1}")]
    LengthMismatch(usize, usize),
}

/// 顶层错误.
#[derive(Debug, Error)]
pub enum Error {
    /// 配置错误.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 查找错误.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// 形状错误.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 图像编解码错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// 元数据表读取错误.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// 配置文件解析错误.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// npy 文件读取错误.
    #[error("npy error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// 外部模型报告的错误.
    #[error("model error: {0}")]
    Model(String),
}

/// 本 crate 的通用返回值.
pub type Result<T> = std::result::Result<T, Error>;
