//! 会话导航状态机 - 流程层
//!
//! 每个会话一个显式的 reducer：`reduce(phase, command) -> phase`。
//!
//! ```text
//! NoSubtestSelected ──SelectSubtest──▶ SubtestActive ──Complete──▶ SubtestComplete
//!        ▲                              │  ▲  Record / GoToItem         │
//!        └──────────AddAnotherSubtest───┼──┴────────────────────────────┘
//!                                       │
//!             (任意非结束状态) ──EndSession──▶ SessionEnded
//! ```
//!
//! `SubtestComplete` 只存在于评估端内存中，不会持久化。

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{CompletionReason, ValidityStatus};

/// 会话阶段
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    NoSubtestSelected,
    SubtestActive {
        subtest_id: String,
        total_items: usize,
        item_index: usize,
    },
    SubtestComplete {
        subtest_id: String,
        reason: CompletionReason,
    },
    SessionEnded {
        validity: ValidityStatus,
    },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::NoSubtestSelected => "NoSubtestSelected",
            SessionPhase::SubtestActive { .. } => "SubtestActive",
            SessionPhase::SubtestComplete { .. } => "SubtestComplete",
            SessionPhase::SessionEnded { .. } => "SessionEnded",
        }
    }

    /// 当前分测验（进行中或刚完成）
    pub fn subtest_id(&self) -> Option<&str> {
        match self {
            SessionPhase::SubtestActive { subtest_id, .. }
            | SessionPhase::SubtestComplete { subtest_id, .. } => Some(subtest_id.as_str()),
            _ => None,
        }
    }

    pub fn item_index(&self) -> Option<usize> {
        match self {
            SessionPhase::SubtestActive { item_index, .. } => Some(*item_index),
            _ => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SessionPhase::SessionEnded { .. })
    }
}

/// 导航命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavCommand {
    SelectSubtest {
        subtest_id: String,
        total_items: usize,
    },
    Record {
        item_index: usize,
    },
    GoToItem {
        item_index: usize,
    },
    Complete {
        reason: CompletionReason,
    },
    AddAnotherSubtest,
    EndSession {
        validity: ValidityStatus,
    },
}

impl NavCommand {
    pub fn name(&self) -> &'static str {
        match self {
            NavCommand::SelectSubtest { .. } => "SelectSubtest",
            NavCommand::Record { .. } => "Record",
            NavCommand::GoToItem { .. } => "GoToItem",
            NavCommand::Complete { .. } => "Complete",
            NavCommand::AddAnotherSubtest => "AddAnotherSubtest",
            NavCommand::EndSession { .. } => "EndSession",
        }
    }
}

/// 记录第 `item_index` 题后的题目索引：不越过最后一题
pub fn next_item_index(item_index: usize, total_items: usize) -> usize {
    if item_index + 1 < total_items {
        item_index + 1
    } else {
        item_index
    }
}

fn check_index(item_index: usize, total_items: usize) -> Result<(), ValidationError> {
    if item_index >= total_items {
        return Err(ValidationError::ItemIndexOutOfRange {
            index: item_index,
            total: total_items,
        });
    }
    Ok(())
}

/// 状态转换
pub fn reduce(phase: &SessionPhase, command: &NavCommand) -> Result<SessionPhase, ValidationError> {
    use NavCommand as C;
    use SessionPhase as P;

    match (phase, command) {
        (P::SessionEnded { .. }, _) => Err(invalid(phase, command)),

        (
            _,
            C::SelectSubtest {
                subtest_id,
                total_items,
            },
        ) => {
            if *total_items == 0 {
                return Err(ValidationError::EmptySubtest {
                    subtest_id: subtest_id.clone(),
                });
            }
            Ok(P::SubtestActive {
                subtest_id: subtest_id.clone(),
                total_items: *total_items,
                item_index: 0,
            })
        }

        (_, C::EndSession { validity }) => Ok(P::SessionEnded {
            validity: *validity,
        }),

        (
            P::SubtestActive {
                subtest_id,
                total_items,
                ..
            },
            C::Record { item_index },
        ) => {
            check_index(*item_index, *total_items)?;
            Ok(P::SubtestActive {
                subtest_id: subtest_id.clone(),
                total_items: *total_items,
                item_index: next_item_index(*item_index, *total_items),
            })
        }

        (
            P::SubtestActive {
                subtest_id,
                total_items,
                ..
            },
            C::GoToItem { item_index },
        ) => {
            check_index(*item_index, *total_items)?;
            Ok(P::SubtestActive {
                subtest_id: subtest_id.clone(),
                total_items: *total_items,
                item_index: *item_index,
            })
        }

        (P::SubtestActive { subtest_id, .. }, C::Complete { reason }) => Ok(P::SubtestComplete {
            subtest_id: subtest_id.clone(),
            reason: *reason,
        }),

        (P::SubtestComplete { .. }, C::AddAnotherSubtest) => Ok(P::NoSubtestSelected),

        _ => Err(invalid(phase, command)),
    }
}

fn invalid(phase: &SessionPhase, command: &NavCommand) -> ValidationError {
    ValidationError::InvalidTransition {
        from: phase.name().to_string(),
        command: command.name().to_string(),
    }
}
