//! ORF 计分服务 - 业务能力层
//!
//! 只负责"一段朗读"的单词标记、停止点、计时和派生指标，不关心流程。
//!
//! ## 指标
//! - `words_attempted` = 停止点 + 1（未设置时为全文词数）
//! - `error_count` / `self_correct_count` 只统计停止点之前的标记
//! - `words_correct` = `words_attempted` − `error_count`
//! - `wcpm` = round(words_correct / elapsed × 60)，elapsed 为 0 时为 0
//! - `accuracy` = round(words_correct / words_attempted × 100)，分母为 0 时为 0

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::error::{DataShapeError, ValidationError};
use crate::models::benchmark::{self, BenchmarkStatus};
use crate::models::{
    FluencyScores, OrfMetrics, PassageAssessmentResult, Subtest, WordMark, WordStatus,
};
use crate::services::fluency_rubric::{self, FluencyDimension};
use crate::services::orf_timer::OrfTimer;

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+").expect("static pattern"))
}

/// 把段落切分成单词
pub fn tokenize(passage: &str) -> Vec<String> {
    word_pattern()
        .find_iter(passage)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// 按标记和停止点计算派生指标
pub fn compute_metrics(
    total_words: usize,
    marks: &BTreeMap<usize, WordStatus>,
    last_word_index: Option<usize>,
    elapsed_seconds: u32,
) -> OrfMetrics {
    let words_attempted = last_word_index.map_or(total_words, |i| i + 1);
    let count = |status: WordStatus| {
        marks
            .range(..words_attempted)
            .filter(|(_, s)| **s == status)
            .count()
    };
    let error_count = count(WordStatus::Error);
    let self_correct_count = count(WordStatus::SelfCorrect);
    let words_correct = words_attempted.saturating_sub(error_count);

    let wcpm = if elapsed_seconds == 0 {
        0
    } else {
        (words_correct as f64 / f64::from(elapsed_seconds) * 60.0).round() as u32
    };
    let accuracy = if words_attempted == 0 {
        0
    } else {
        (words_correct as f64 / words_attempted as f64 * 100.0).round() as u32
    };

    OrfMetrics {
        words_attempted,
        words_correct,
        error_count,
        self_correct_count,
        wcpm,
        accuracy,
        elapsed_seconds,
    }
}

/// ORF 计分器（评估端临时状态）
#[derive(Debug, Clone)]
pub struct OrfScorer {
    words: Vec<String>,
    marks: BTreeMap<usize, WordStatus>,
    last_word_index: Option<usize>,
    fluency: FluencyScores,
    timer: OrfTimer,
    grade: Option<String>,
}

impl OrfScorer {
    /// 由段落文本创建；计时上限固定为 60 秒
    pub fn new(passage: &str) -> Self {
        Self {
            words: tokenize(passage),
            marks: BTreeMap::new(),
            last_word_index: None,
            fluency: FluencyScores::default(),
            timer: OrfTimer::default(),
            grade: None,
        }
    }

    /// 由分测验的刺激材料创建（读取 `passage` 与可选的 `grade`）
    ///
    /// 分测验的 `time_limit_seconds` 不影响朗读计时上限。
    pub fn from_subtest(subtest: &Subtest) -> Result<Self, DataShapeError> {
        let mut scorer = Self::new(subtest.passage()?);
        scorer.grade = subtest.grade();
        Ok(scorer)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn total_words(&self) -> usize {
        self.words.len()
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.words.len() {
            return Err(ValidationError::WordIndexOutOfRange {
                index,
                total: self.words.len(),
            });
        }
        Ok(())
    }

    /// 点击单词：正确 → 错误 → 自我纠正 → 正确
    ///
    /// 返回新的标记（`None` 表示回到正确）。
    pub fn cycle_word(&mut self, index: usize) -> Result<Option<WordStatus>, ValidationError> {
        self.check_index(index)?;
        let next = match self.marks.get(&index) {
            None => Some(WordStatus::Error),
            Some(WordStatus::Error) => Some(WordStatus::SelfCorrect),
            Some(WordStatus::SelfCorrect) => None,
        };
        match next {
            Some(status) => self.marks.insert(index, status),
            None => self.marks.remove(&index),
        };
        Ok(next)
    }

    pub fn word_status(&self, index: usize) -> Option<WordStatus> {
        self.marks.get(&index).copied()
    }

    /// 次级操作：设为停止点；对当前停止点再次操作则清除
    pub fn toggle_stopping_point(&mut self, index: usize) -> Result<Option<usize>, ValidationError> {
        self.check_index(index)?;
        self.last_word_index = if self.last_word_index == Some(index) {
            None
        } else {
            Some(index)
        };
        Ok(self.last_word_index)
    }

    pub fn last_word_index(&self) -> Option<usize> {
        self.last_word_index
    }

    pub fn words_attempted(&self) -> usize {
        self.last_word_index.map_or(self.words.len(), |i| i + 1)
    }

    pub fn rate_fluency(&mut self, dimension: FluencyDimension, rating: u8) -> Result<(), ValidationError> {
        fluency_rubric::set_rating(&mut self.fluency, dimension, rating)
    }

    pub fn fluency(&self) -> &FluencyScores {
        &self.fluency
    }

    pub fn timer(&self) -> &OrfTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut OrfTimer {
        &mut self.timer
    }

    pub fn metrics(&self) -> OrfMetrics {
        compute_metrics(
            self.words.len(),
            &self.marks,
            self.last_word_index,
            self.timer.elapsed_seconds(),
        )
    }

    pub fn benchmark(&self) -> BenchmarkStatus {
        benchmark::classify(self.metrics().wcpm, self.grade.as_deref())
    }

    pub fn word_marks(&self) -> Vec<WordMark> {
        self.marks
            .iter()
            .map(|(&index, &status)| WordMark { index, status })
            .collect()
    }

    /// 生成保存用的段落结果
    pub fn to_result(&self, session_id: &str, subtest_id: &str) -> PassageAssessmentResult {
        let metrics = self.metrics();
        PassageAssessmentResult {
            session_id: session_id.to_string(),
            subtest_id: subtest_id.to_string(),
            metrics,
            fluency_scores: self.fluency,
            word_marks: self.word_marks(),
            last_word_index: self.last_word_index,
            total_words: self.words.len(),
            grade: self.grade.clone(),
            benchmark: benchmark::classify(metrics.wcpm, self.grade.as_deref()),
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passage(words: usize) -> String {
        (0..words)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run_timer(scorer: &mut OrfScorer, seconds: u32) {
        scorer.timer_mut().start();
        for _ in 0..seconds {
            scorer.timer_mut().tick();
        }
    }

    #[test]
    fn test_reference_passage_metrics() {
        let mut scorer = OrfScorer::new(&passage(50));
        scorer.toggle_stopping_point(29).unwrap();
        for i in [3, 10, 17, 25] {
            scorer.cycle_word(i).unwrap();
        }
        // 停止点之后的错误不计入
        scorer.cycle_word(40).unwrap();
        run_timer(&mut scorer, 60);

        let m = scorer.metrics();
        assert_eq!(m.words_attempted, 30);
        assert_eq!(m.error_count, 4);
        assert_eq!(m.words_correct, 26);
        assert_eq!(m.wcpm, 26);
        assert_eq!(m.accuracy, 87);
    }

    #[test]
    fn test_cycle_has_length_three() {
        let mut scorer = OrfScorer::new("the cat sat");
        assert_eq!(scorer.cycle_word(1).unwrap(), Some(WordStatus::Error));
        assert_eq!(scorer.cycle_word(1).unwrap(), Some(WordStatus::SelfCorrect));
        assert_eq!(scorer.cycle_word(1).unwrap(), None);
        assert!(scorer.word_marks().is_empty());
        assert!(scorer.cycle_word(3).is_err());
    }

    #[test]
    fn test_self_corrections_are_not_errors() {
        let mut scorer = OrfScorer::new(&passage(10));
        scorer.cycle_word(0).unwrap();
        scorer.cycle_word(0).unwrap();
        scorer.cycle_word(1).unwrap();
        run_timer(&mut scorer, 30);

        let m = scorer.metrics();
        assert_eq!(m.self_correct_count, 1);
        assert_eq!(m.error_count, 1);
        assert_eq!(m.words_correct, 9);
        assert_eq!(m.wcpm, 18);
        assert_eq!(m.accuracy, 90);
    }

    #[test]
    fn test_stopping_point_toggle() {
        let mut scorer = OrfScorer::new(&passage(5));
        assert_eq!(scorer.words_attempted(), 5);
        assert_eq!(scorer.toggle_stopping_point(2).unwrap(), Some(2));
        assert_eq!(scorer.words_attempted(), 3);
        assert_eq!(scorer.toggle_stopping_point(2).unwrap(), None);
        assert_eq!(scorer.words_attempted(), 5);
    }

    #[test]
    fn test_zero_guards() {
        let empty = OrfScorer::new("   ");
        let m = empty.metrics();
        assert_eq!(m.words_attempted, 0);
        assert_eq!(m.accuracy, 0);
        assert_eq!(m.wcpm, 0);

        let untimed = OrfScorer::new(&passage(20));
        assert_eq!(untimed.metrics().wcpm, 0);
        assert_eq!(untimed.metrics().accuracy, 100);
    }

    #[test]
    fn test_invariants_over_mark_sets() {
        let total = 12;
        // 穷举每个单词 3 种状态的一部分组合，并遍历停止点与计时
        for seed in 0u32..729 {
            let mut marks = BTreeMap::new();
            let mut s = seed;
            for i in 0..6 {
                match s % 3 {
                    1 => {
                        marks.insert(i * 2, WordStatus::Error);
                    }
                    2 => {
                        marks.insert(i * 2, WordStatus::SelfCorrect);
                    }
                    _ => {}
                }
                s /= 3;
            }
            for last in [None, Some(0), Some(5), Some(11)] {
                for elapsed in [0, 1, 37, 60] {
                    let m = compute_metrics(total, &marks, last, elapsed);
                    assert_eq!(m.words_correct + m.error_count, m.words_attempted);
                    assert!(m.accuracy <= 100);
                }
            }
        }
    }

    #[test]
    fn test_from_subtest_reads_grade_with_fixed_ceiling() {
        let subtest = Subtest {
            id: "orf-1".to_string(),
            name: "Passage".to_string(),
            module_type: crate::models::ModuleType::OralReading,
            stimulus: json!({ "passage": "one two three", "grade": "2" }),
            timing: crate::models::TimingConfig {
                time_limit_seconds: Some(45),
                show_timer: true,
            },
            script_prompt: None,
        };
        let mut scorer = OrfScorer::from_subtest(&subtest).unwrap();
        assert_eq!(scorer.total_words(), 3);
        run_timer(&mut scorer, 100);
        assert_eq!(scorer.timer().elapsed_seconds(), 60);
        assert!(scorer.timer().is_completed());

        let result = scorer.to_result("s-1", "orf-1");
        assert_eq!(result.grade.as_deref(), Some("2"));
        assert_eq!(result.metrics.wcpm, 3);
        assert_eq!(result.benchmark, BenchmarkStatus::Below);
    }

    #[test]
    fn test_missing_passage_is_data_shape_error() {
        let subtest = Subtest {
            id: "orf-2".to_string(),
            name: "Broken".to_string(),
            module_type: crate::models::ModuleType::OralReading,
            stimulus: json!({ "text": "wrong key" }),
            timing: Default::default(),
            script_prompt: None,
        };
        assert!(OrfScorer::from_subtest(&subtest).is_err());
    }
}
