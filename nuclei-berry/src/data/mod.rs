//! 显微图像与实例掩码的基础数据结构.

mod micrograph;
mod mask;
mod save;

pub use micrograph::NucleiImage;
pub use mask::{BoundingBox, InstanceMask};
pub use save::{ImgWriteRaw, ImgWriteVis};
pub(crate) use save::stretch;
