//! 作答记录数据模型
//!
//! 作答只追加不覆盖：同一题重新计分会插入新行。统计"已计分题数"时
//! 按不同的 `item_index` 计数，而不是按行数。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 计分代码（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCode {
    Correct,
    Incorrect,
    SelfCorrect,
    Prompted,
    NoResponse,
}

impl std::fmt::Display for ScoreCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScoreCode::Correct => "correct",
            ScoreCode::Incorrect => "incorrect",
            ScoreCode::SelfCorrect => "self_correct",
            ScoreCode::Prompted => "prompted",
            ScoreCode::NoResponse => "no_response",
        };
        write!(f, "{}", s)
    }
}

/// 一次计分
///
/// 错误类型只挂在 `Incorrect` 上，策略标签只挂在 `Correct` 上。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "score_code", rename_all = "snake_case")]
pub enum ScoredResponse {
    Correct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strategy_tag: Option<String>,
    },
    Incorrect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_type: Option<String>,
    },
    SelfCorrect,
    Prompted,
    NoResponse,
}

impl ScoredResponse {
    pub fn correct() -> Self {
        ScoredResponse::Correct { strategy_tag: None }
    }

    pub fn incorrect() -> Self {
        ScoredResponse::Incorrect { error_type: None }
    }

    pub fn code(&self) -> ScoreCode {
        match self {
            ScoredResponse::Correct { .. } => ScoreCode::Correct,
            ScoredResponse::Incorrect { .. } => ScoreCode::Incorrect,
            ScoredResponse::SelfCorrect => ScoreCode::SelfCorrect,
            ScoredResponse::Prompted => ScoreCode::Prompted,
            ScoredResponse::NoResponse => ScoreCode::NoResponse,
        }
    }
}

/// 待插入的作答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResponse {
    pub session_id: String,
    pub subtest_id: String,
    pub item_index: usize,
    pub score_code: ScoreCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewResponse {
    pub fn new(
        session_id: impl Into<String>,
        subtest_id: impl Into<String>,
        item_index: usize,
        scored: &ScoredResponse,
    ) -> Self {
        let (error_type, strategy_tag) = match scored {
            ScoredResponse::Correct { strategy_tag } => (None, strategy_tag.clone()),
            ScoredResponse::Incorrect { error_type } => (error_type.clone(), None),
            _ => (None, None),
        };
        Self {
            session_id: session_id.into(),
            subtest_id: subtest_id.into(),
            item_index,
            score_code: scored.code(),
            error_type,
            strategy_tag,
            response_time_ms: None,
            notes: None,
        }
    }

    pub fn with_response_time(mut self, response_time_ms: Option<u64>) -> Self {
        self.response_time_ms = response_time_ms;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// 已持久化的作答行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub response: NewResponse,
}

impl ResponseRecord {
    /// 还原为带标签的计分
    pub fn scored(&self) -> ScoredResponse {
        match self.response.score_code {
            ScoreCode::Correct => ScoredResponse::Correct {
                strategy_tag: self.response.strategy_tag.clone(),
            },
            ScoreCode::Incorrect => ScoredResponse::Incorrect {
                error_type: self.response.error_type.clone(),
            },
            ScoreCode::SelfCorrect => ScoredResponse::SelfCorrect,
            ScoreCode::Prompted => ScoredResponse::Prompted,
            ScoreCode::NoResponse => ScoredResponse::NoResponse,
        }
    }
}

/// 统计某分测验已计分的不同题目数
pub fn distinct_items_scored(responses: &[ResponseRecord], subtest_id: &str) -> usize {
    responses
        .iter()
        .filter(|r| r.response.subtest_id == subtest_id)
        .map(|r| r.response.item_index)
        .collect::<BTreeSet<_>>()
        .len()
}

/// 分测验结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Submitted,
    Discontinued,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionReason::Submitted => write!(f, "已提交"),
            CompletionReason::Discontinued => write!(f, "已中止"),
        }
    }
}

/// 分测验完成摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub subtest_id: String,
    pub items_scored: usize,
    pub total_items: usize,
    pub completion_reason: CompletionReason,
    pub completed_at: DateTime<Utc>,
}
