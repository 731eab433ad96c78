//! 数据来源配置. 本 crate 只校验配置并判断是否需要下载, 不执行下载.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// 支持的云存储.
pub const SUPPORTED_CLOUDS: &[&str] = &["aws"];

/// 已解压数据集所在的子目录名.
pub const DATASET_SUBDIR: &str = "dataset";

/// 原始的数据来源配置.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DataSourceConfig {
    /// `"website"` 或云存储名.
    pub source: String,

    /// 仅 `"website"` 使用.
    #[serde(default)]
    pub url: Option<String>,
}

/// 云存储.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cloud {
    /// Amazon S3.
    Aws,
}

/// 校验后的数据来源.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    /// 从给定网址下载压缩包.
    Website {
        /// 压缩包网址.
        url: String,
    },
    /// 从云存储拉取.
    Cloud(Cloud),
}

/// 数据准备计划.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchPlan {
    /// 数据集已存在, 什么都不用做.
    AlreadyPresent,
    /// 需要从给定来源获取.
    Fetch(DataSource),
}

impl DataSourceConfig {
    /// 校验来源.
    pub fn resolve(&self) -> Result<DataSource, ConfigError> {
        match self.source.as_str() {
            "website" => match &self.url {
                Some(url) => Ok(DataSource::Website { url: url.clone() }),
                None => Err(ConfigError::MissingField("url")),
            },
            "aws" => Ok(DataSource::Cloud(Cloud::Aws)),
            other => Err(ConfigError::UnsupportedSource(other.to_string(), SUPPORTED_CLOUDS)),
        }
    }

    /// 若 `save_dir` 下已有数据集则无需获取, 此时不校验来源.
    pub fn plan<P: AsRef<Path>>(&self, save_dir: P) -> Result<FetchPlan, ConfigError> {
        if is_present(save_dir) {
            log::info!("dataset already present, skipping fetch");
            return Ok(FetchPlan::AlreadyPresent);
        }
        self.resolve().map(FetchPlan::Fetch)
    }
}

/// `dir` 下是否已经存在解压好的数据集.
#[inline]
pub fn is_present<P: AsRef<Path>>(dir: P) -> bool {
    dir.as_ref().join(DATASET_SUBDIR).is_dir()
}
