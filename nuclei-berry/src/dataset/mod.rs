//! 数据集操作.

use std::path::{Path, PathBuf};

mod loader;
mod source;
mod split;
mod table;

pub(crate) use loader::index_dir;
pub use loader::{load_split, pair_loader, PairLoader, IMAGES_DIR, MASKS_DIR, METADATA_FILE};
pub use source::{is_present, Cloud, DataSource, DataSourceConfig, FetchPlan, DATASET_SUBDIR, SUPPORTED_CLOUDS};
pub use split::SplitRecord;
pub use table::{Magnification, MetaRow, MetaTable};

/// 训练集与测试集.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    /// 训练集.
    pub train: SplitRecord,
    /// 测试集.
    pub test: SplitRecord,
}

/// 从 `<root>/train` 与 `<root>/test` 加载数据集.
pub fn load_dataset<P: AsRef<Path>>(root: P) -> crate::Result<Dataset> {
    let root = root.as_ref();
    Ok(Dataset {
        train: load_split(root.join("train"))?,
        test: load_split(root.join("test"))?,
    })
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
