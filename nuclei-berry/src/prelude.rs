//! 🔬欢迎光临🧫
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;
pub use crate::{ConfigError, Error, LookupError, Result, ShapeError};

pub use crate::data::{ImgWriteRaw, ImgWriteVis, InstanceMask, NucleiImage};

pub use crate::augment::{AugmentConfig, AugmentStep, Augmenter};
pub use crate::config::PipelineConfig;
pub use crate::dataset::{self, home_dataset_dir_with, load_dataset, Dataset, MetaTable, SplitRecord};
pub use crate::eval::{calc_metrics, matching, matching_dataset, EvaluationMetrics, MatchingStats, Metric};
pub use crate::model::{make_predictions, train_model, PrecomputedModel, SegmentationModel};
pub use crate::preprocess::{preprocess_split, PreprocessConfig, PreprocessParams};
pub use crate::visual::{render_example, save_example, LabelColormap};
