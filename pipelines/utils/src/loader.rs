//! 对 `nuclei-berry::dataset` 的更一层封装. 负责定位数据集目录.

use nuclei_berry::dataset::{self, DATASET_SUBDIR};
use std::env;
use std::path::PathBuf;

/// 获取数据存放目录. 解压后的数据集位于其下的 `dataset/` 子目录.
///
/// 1. 若环境变量 `$NUCLEI_DATASET_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/nuclei`. 无法确定主目录时返回 `None`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("NUCLEI_DATASET_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["nuclei"]),
    }
}

/// 获取解压后的数据集根目录, 其下应有 `train/` 与 `test/`.
#[inline]
pub fn dataset_dir_from_env_or_home() -> Option<PathBuf> {
    data_dir_from_env_or_home().map(|d| d.join(DATASET_SUBDIR))
}
