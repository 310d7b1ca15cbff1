//! 持久层接口 - 基础设施层
//!
//! 只暴露"读写会话 / 分测验 / 作答"的能力，不关心流程。
//! 所有写操作都携带 `Actor`，由存储端按角色拦截：只有评估者可以写。

use futures::future::BoxFuture;

use crate::error::Result;
use crate::models::{
    NewResponse, PassageAssessmentResult, ResponseRecord, Session, SessionPatch, SessionSummary,
    Subtest,
};

/// 调用者角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Assessor,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Assessor => write!(f, "assessor"),
            Role::Student => write!(f, "student"),
        }
    }
}

/// 发起操作的一方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn assessor(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assessor,
        }
    }

    pub fn student(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Student,
        }
    }

    /// 写入前的角色检查
    pub fn authorize_write(&self, table: &str) -> Result<()> {
        match self.role {
            Role::Assessor => Ok(()),
            role => {
                tracing::warn!("拒绝写入 {}: 角色 {} ({})", table, role, self.id);
                Err(crate::error::AppError::forbidden(table, role.to_string()))
            }
        }
    }
}

pub const SESSIONS: &str = "sessions";
pub const SUBTESTS: &str = "subtests";
pub const RESPONSES: &str = "responses";
pub const PASSAGE_RESULTS: &str = "passage_results";
pub const SESSION_SUMMARIES: &str = "session_summaries";

/// 会话存储
///
/// 返回 `BoxFuture` 以便以 `Arc<dyn SessionStore>` 的形式在两个端之间共享。
pub trait SessionStore: Send + Sync {
    fn fetch_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Session>>;

    fn create_session<'a>(
        &'a self,
        actor: &'a Actor,
        session: Session,
    ) -> BoxFuture<'a, Result<Session>>;

    fn update_session<'a>(
        &'a self,
        actor: &'a Actor,
        session_id: &'a str,
        patch: SessionPatch,
    ) -> BoxFuture<'a, Result<Session>>;

    fn fetch_subtest<'a>(&'a self, subtest_id: &'a str) -> BoxFuture<'a, Result<Subtest>>;

    /// 追加一条作答；重复的 item_index 也会插入新行
    fn insert_response<'a>(
        &'a self,
        actor: &'a Actor,
        response: NewResponse,
    ) -> BoxFuture<'a, Result<ResponseRecord>>;

    fn list_responses<'a>(
        &'a self,
        session_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResponseRecord>>>;

    /// 按 (session, subtest) 覆盖写入段落结果
    fn upsert_passage_result<'a>(
        &'a self,
        actor: &'a Actor,
        result: PassageAssessmentResult,
    ) -> BoxFuture<'a, Result<PassageAssessmentResult>>;

    fn fetch_passage_result<'a>(
        &'a self,
        session_id: &'a str,
        subtest_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PassageAssessmentResult>>>;

    fn insert_session_summary<'a>(
        &'a self,
        actor: &'a Actor,
        summary: SessionSummary,
    ) -> BoxFuture<'a, Result<SessionSummary>>;
}
