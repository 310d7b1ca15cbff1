//! 会话数据模型
//!
//! `Session` 是持久化的会话记录；`SessionState` 是评估端独占写入、
//! 实时复制给学生端的临时交互状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 会话状态（持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// 有效性分类（由评估者在结束会话时给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    Questionable,
    Invalid,
}

impl std::fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidityStatus::Valid => write!(f, "valid"),
            ValidityStatus::Questionable => write!(f, "questionable"),
            ValidityStatus::Invalid => write!(f, "invalid"),
        }
    }
}

/// 指针位置，坐标归一化到 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(ValidationError::PointerOutOfRange { x, y });
        }
        Ok(Self { x, y })
    }
}

/// 会话临时状态
///
/// 不单独持久化；嵌入在 `Session` 行上，供学生端挂载时读取一次。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub current_item_index: usize,
    pub pointer_position: Option<PointerPosition>,
    pub timer_seconds: u32,
    pub is_timer_running: bool,
}

/// 对 `SessionState` 的部分更新，`None` 表示保持不变
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item_index: Option<usize>,
    /// `Some(None)` 清除指针
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer_position: Option<Option<PointerPosition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_timer_running: Option<bool>,
}

impl SessionState {
    /// 应用部分更新，返回新的状态
    pub fn merged(&self, patch: &SessionStatePatch) -> Self {
        Self {
            current_item_index: patch.current_item_index.unwrap_or(self.current_item_index),
            pointer_position: patch.pointer_position.unwrap_or(self.pointer_position),
            timer_seconds: patch.timer_seconds.unwrap_or(self.timer_seconds),
            is_timer_running: patch.is_timer_running.unwrap_or(self.is_timer_running),
        }
    }

    /// 整值补丁（所有字段都覆盖）
    pub fn as_patch(&self) -> SessionStatePatch {
        SessionStatePatch {
            current_item_index: Some(self.current_item_index),
            pointer_position: Some(self.pointer_position),
            timer_seconds: Some(self.timer_seconds),
            is_timer_running: Some(self.is_timer_running),
        }
    }
}

/// 会话记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub student_id: String,
    pub current_subtest_id: Option<String>,
    pub status: SessionStatus,
    pub validity_status: Option<ValidityStatus>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub observations: Option<String>,
    #[serde(default)]
    pub state: SessionState,
}

impl Session {
    /// 创建新的进行中会话
    pub fn new(id: impl Into<String>, student_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            student_id: student_id.into(),
            current_subtest_id: None,
            status: SessionStatus::InProgress,
            validity_status: None,
            started_at: now,
            completed_at: None,
            updated_at: now,
            observations: None,
            state: SessionState::default(),
        }
    }

    /// 应用部分更新
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(subtest) = &patch.current_subtest_id {
            self.current_subtest_id = subtest.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(validity) = patch.validity_status {
            self.validity_status = Some(validity);
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(observations) = &patch.observations {
            self.observations = Some(observations.clone());
        }
        if let Some(state) = &patch.state {
            self.state = self.state.merged(state);
        }
        self.updated_at = Utc::now();
    }
}

/// 对 `Session` 的部分更新
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    /// `Some(None)` 表示清除当前分测验
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_subtest_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_status: Option<ValidityStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionStatePatch>,
}
