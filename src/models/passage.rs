//! 朗读段落评估结果
//!
//! 整段计分的 ORF 结果单独存放，按 (session, subtest) 唯一，
//! 不再塞进逐题作答行。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::benchmark::BenchmarkStatus;

/// 单词标记（正确为隐式，不存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordStatus {
    Error,
    SelfCorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordMark {
    pub index: usize,
    pub status: WordStatus,
}

/// 流利度四维评分，每项 1–4，未评为 `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FluencyScores {
    pub expression: Option<u8>,
    pub phrasing: Option<u8>,
    pub smoothness: Option<u8>,
    pub pace: Option<u8>,
}

impl FluencyScores {
    /// 已评维度的平均分，仅作描述，不参与 WCPM / 正确率
    pub fn mean(&self) -> Option<f64> {
        let rated: Vec<u8> = [self.expression, self.phrasing, self.smoothness, self.pace]
            .into_iter()
            .flatten()
            .collect();
        if rated.is_empty() {
            return None;
        }
        Some(rated.iter().map(|&r| f64::from(r)).sum::<f64>() / rated.len() as f64)
    }
}

/// ORF 派生指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrfMetrics {
    pub words_attempted: usize,
    pub words_correct: usize,
    pub error_count: usize,
    pub self_correct_count: usize,
    pub wcpm: u32,
    pub accuracy: u32,
    pub elapsed_seconds: u32,
}

/// 段落评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageAssessmentResult {
    pub session_id: String,
    pub subtest_id: String,
    #[serde(flatten)]
    pub metrics: OrfMetrics,
    pub fluency_scores: FluencyScores,
    pub word_marks: Vec<WordMark>,
    pub last_word_index: Option<usize>,
    pub total_words: usize,
    pub grade: Option<String>,
    pub benchmark: BenchmarkStatus,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluency_mean_ignores_unrated() {
        let scores = FluencyScores {
            expression: Some(3),
            phrasing: Some(2),
            smoothness: None,
            pace: Some(4),
        };
        assert_eq!(scores.mean(), Some(3.0));
        assert_eq!(FluencyScores::default().mean(), None);
    }
}
