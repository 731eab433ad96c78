#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为显微图像细胞核实例分割 (星凸多边形模型) 提供数据侧的全部工作:
//! 读取带标注的数据划分、预处理、数据增强、评估与结果可视化.
//!
//! 网络本身不在本 crate 内, 只以 [`model::SegmentationModel`] trait 的形式出现.
//!
//! # 注意
//!
//! 1. 图像与掩码的空间尺寸必须一致, 所有入口都会先检查这一点.
//! 2. 配置中的变换名与指标名在加载时即被解析, 未知名称不会等到处理数据时才报错.
//! 3. 除测试外, 程序不会因为输入数据不合法而 panic, 错误统一通过 [`Error`] 返回.
//!
//! # 开发计划
//!
//! ### 数据增强 ✅
//!
//! 随机翻转、随机轴置换与随机强度变换, 可用固定种子复现.
//!
//! 实现位于 `nuclei-berry/src/augment`.
//!
//! ### 预处理 ✅
//!
//! 1. 彩色图转灰度 ✅
//! 2. 填补实例空洞 ✅
//! 3. 百分位归一化 ✅
//! 4. 按放大倍率缩放 (最近邻 / 双线性 / 面积插值) ✅
//!
//! 实现位于 `nuclei-berry/src/preprocess`.
//!
//! ### 评估 ✅
//!
//! IoU 矩阵上的最优一对一指派, 以及由此得到的 Dice / IoU / 按类别 mAP.
//!
//! 实现位于 `nuclei-berry/src/eval`.
//!
//! ### 数据集读取 ✅
//!
//! `images/`、`masks/` 与 `metadata.csv`. 掩码支持 `.npy` 与 8/16 位灰度图.
//!
//! 实现位于 `nuclei-berry/src/dataset`.
//!
//! ### 可视化 ✅
//!
//! 左栏多边形轮廓, 右栏半透明标签.
//!
//! 实现位于 `nuclei-berry/src/visual`.
//!
//! ### 并行预处理 ✅
//!
//! 启用 `rayon` feature 时逐图像并行, 结果与顺序执行一致.

/// 二维索引 `(h, w)`.
pub type Idx2d = (usize, usize);

/// 图像与实例掩码基础数据结构.
mod data;

pub use data::{BoundingBox, ImgWriteRaw, ImgWriteVis, InstanceMask, NucleiImage};

pub mod consts;

mod error;

pub use error::{ConfigError, Error, LookupError, Result, ShapeError};

pub mod augment;
pub mod config;
pub mod dataset;
pub mod eval;
pub mod model;
pub mod preprocess;
pub mod visual;

pub mod prelude;
