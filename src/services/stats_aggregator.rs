//! 结果统计

use crate::models::{BatchStats, NormalizedResult};

/// 汇总字数、token 与成功率
///
/// 错误结果的字数为 0；空结果集的平均值与成功率为 0。
pub fn aggregate(results: &[NormalizedResult]) -> BatchStats {
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let total_words: u64 = results.iter().filter(|r| r.is_success()).map(|r| r.word_count).sum();
    let total_tokens: u64 = results.iter().map(|r| r.output_tokens).sum();

    if results.is_empty() {
        return BatchStats::default();
    }

    let count = results.len() as f64;
    BatchStats {
        total_words,
        average_words: (total_words as f64 / count).round() as u64,
        success_rate: succeeded as f64 / count * 100.0,
        total_tokens,
        succeeded,
        failed: results.len() - succeeded,
    }
}
