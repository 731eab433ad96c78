//! 实例分割评估.

mod ap;
mod assign;
mod matching;
mod metrics;

pub use ap::{average_precision, average_precision_from_curve, linspace, mean_average_precision};
pub use assign::{assignment_cost, linear_sum_assignment};
pub use matching::{matching, matching_dataset, matching_dataset_from, safe_divide, IouMatrix, MatchingStats};
pub use metrics::{calc_metrics, EvaluationMetrics, Metric};
