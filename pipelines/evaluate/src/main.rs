//! 用事先算好的预测掩码评估细胞核实例分割.
//!
//! ```text
//! evaluate <CONFIG> <PREDICTIONS_DIR> [OVERLAY_DIR] [--dataset-dir DIR] [--report FILE]
//! ```

mod result;
mod runner;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// 命令行参数.
#[derive(Debug, Clone, Parser)]
pub struct Opts {
    /// pipeline configuration file (JSON)
    pub config_file: PathBuf,

    /// directory of predicted masks, one file per test image
    pub predictions_dir: PathBuf,

    /// write side-by-side overlays into this directory
    pub overlay_dir: Option<PathBuf>,

    /// dataset root containing `train/` and `test/`
    #[clap(long)]
    pub dataset_dir: Option<PathBuf>,

    /// also write the report as JSON
    #[clap(long)]
    pub report: Option<PathBuf>,
}

fn main() -> Result<()> {
    utils::init_logger()?;
    let opts = Opts::parse();

    let report = runner::run(&opts)?;
    report.analyze()?;
    if let Some(path) = &opts.report {
        report.save_json(path)?;
    }
    Ok(())
}
