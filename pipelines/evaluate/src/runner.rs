//! 程序运行函数.

use crate::result::EvaluationReport;
use crate::Opts;
use anyhow::{anyhow, bail, Context, Result};
use nuclei_berry::augment::Augmenter;
use nuclei_berry::config::PipelineConfig;
use nuclei_berry::consts::eval::DEFAULT_IOU_THRESHOLD;
use nuclei_berry::dataset::{self, FetchPlan, SplitRecord};
use nuclei_berry::eval::{calc_metrics, matching_dataset};
use nuclei_berry::model::{make_predictions, train_model, PrecomputedModel};
use nuclei_berry::preprocess::{preprocess_split, PreprocessConfig};
use nuclei_berry::visual::{save_example, LabelColormap};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use utils::loader;

/// 确定数据集根目录. 命令行参数优先, 其次是环境变量与主目录.
fn dataset_root(opts: &Opts) -> Result<PathBuf> {
    match &opts.dataset_dir {
        Some(d) => Ok(d.clone()),
        None => loader::dataset_dir_from_env_or_home()
            .ok_or_else(|| anyhow!("cannot determine dataset directory, set $NUCLEI_DATASET_DIR")),
    }
}

/// 在两个线程中分别加载并预处理训练集与测试集.
fn load_and_preprocess(
    root: &Path,
    train: &PreprocessConfig,
    test: &PreprocessConfig,
) -> Result<(SplitRecord, SplitRecord)> {
    thread::scope(|s| {
        let job = |split: &'static str, config: &PreprocessConfig| {
            let dir = root.join(split);
            let config = config.clone();
            s.spawn(move || -> nuclei_berry::Result<SplitRecord> {
                let raw = dataset::load_split(&dir)?;
                log::info!("{split}: {} images loaded", raw.len());
                preprocess_split(raw, &config)
            })
        };
        let handles = [job("train", train), job("test", test)];
        let [train, test] = handles.map(|th| th.join().map_err(|_| anyhow!("preprocessing thread panicked")));
        Ok((train??, test??))
    })
}

/// 实际运行.
pub fn run(opts: &Opts) -> Result<EvaluationReport> {
    let config = PipelineConfig::open(&opts.config_file)
        .with_context(|| format!("loading {}", opts.config_file.display()))?;

    let root = dataset_root(opts)?;
    if let (Some(source), Some(data_dir)) = (&config.data_source, root.parent()) {
        if let FetchPlan::Fetch(from) = source.plan(data_dir)? {
            bail!("dataset not found under {}, fetch it from {from:?} first", data_dir.display());
        }
    }

    println!("Running evaluation...");
    let (train, test) = load_and_preprocess(&root, &config.preprocessing.train, &config.preprocessing.test)?;

    let mut model = PrecomputedModel::open(&opts.predictions_dir)?;
    let mut augmenter = Augmenter::new(config.augmentations.clone());
    train_model(&mut model, &train, &mut augmenter, Some(&test), &config.training)?;

    let preds = make_predictions(&model, &test)?;
    let metrics = calc_metrics(&test.table, &preds.masks, &test.masks, &config.evaluation_metrics)?;
    let stats = matching_dataset(test.masks.values(), preds.masks.values(), DEFAULT_IOU_THRESHOLD)?;

    if let Some(dir) = &opts.overlay_dir {
        fs::create_dir_all(dir)?;
        let cmap = LabelColormap::default();
        for (name, image) in test.images.iter() {
            let (Some(mask), Some(details)) = (preds.masks.get(name), preds.details.get(name)) else {
                continue;
            };
            save_example(dir.join(format!("{name}.png")), image, mask, details, &cmap)?;
        }
        log::info!("overlays written to {}", dir.display());
    }

    Ok(EvaluationReport::new(test.len(), metrics, stats))
}
