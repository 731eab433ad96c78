//! 评估结果.

use nuclei_berry::eval::{MatchingStats, Metric};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

/// 将匹配统计写进 `w` 中.
fn describe_into<W: Write>(s: &MatchingStats, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Matching at IoU >= {}:", s.thresh)?;
    writeln!(w, "{S4}Instances: {} true, {} predicted", s.n_true, s.n_pred)?;
    writeln!(w, "{S4}TP / FP / FN: {} / {} / {}", s.tp, s.fp, s.fn_)?;
    writeln!(w, "{S4}Precision: {:.6}", s.precision)?;
    writeln!(w, "{S4}Recall: {:.6}", s.recall)?;
    writeln!(w, "{S4}Mean matched score: {:.6}", s.mean_matched_score)?;
    write!(w, "{S4}Panoptic quality: {:.6}", s.panoptic_quality)?;
    Ok(())
}

/// 评估最终结果.
#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    n_images: usize,
    metrics: BTreeMap<Metric, f64>,
    stats: MatchingStats,
}

impl EvaluationReport {
    pub fn new(n_images: usize, metrics: BTreeMap<Metric, f64>, stats: MatchingStats) -> Self {
        Self {
            n_images,
            metrics,
            stats,
        }
    }

    /// 打印结果.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut w = stdout.lock();
        utils::sep_to(&mut w)?;
        writeln!(w, "Evaluated {} test images", self.n_images)?;
        for (metric, value) in self.metrics.iter() {
            writeln!(w, "{metric}: {value:.6}")?;
        }
        utils::sep_to(&mut w)?;
        describe_into(&self.stats, &mut w)?;
        writeln!(w)?;
        utils::sep_to(&mut w)
    }

    /// 以 JSON 格式保存.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), self)?;
        log::info!("report written to {}", path.as_ref().display());
        Ok(())
    }
}
