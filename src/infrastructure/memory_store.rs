//! 进程内存储
//!
//! 测试和演示程序使用。行为与 REST 存储一致：写入按角色拦截，
//! 作答只追加，段落结果按 (session, subtest) 覆盖。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::error::{AppError, PersistenceError, Result};
use crate::infrastructure::store::{
    Actor, SessionStore, PASSAGE_RESULTS, RESPONSES, SESSIONS, SESSION_SUMMARIES, SUBTESTS,
};
use crate::models::{
    NewResponse, PassageAssessmentResult, ResponseRecord, Session, SessionPatch, SessionSummary,
    Subtest,
};

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, Session>,
    subtests: HashMap<String, Subtest>,
    responses: Vec<ResponseRecord>,
    passage_results: HashMap<(String, String), PassageAssessmentResult>,
    summaries: Vec<SessionSummary>,
}

/// 进程内存储
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
    /// 接下来 N 次写入返回持久层错误（用于模拟故障）
    failing_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置分测验（分测验对核心只读，不经过角色检查）
    pub fn seed_subtest(&self, subtest: Subtest) {
        self.lock().subtests.insert(subtest.id.clone(), subtest);
    }

    /// 让接下来 `count` 次写入失败
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// 当前作答行数（含重复计分）
    pub fn response_count(&self) -> usize {
        self.lock().responses.len()
    }

    /// 已写入的完成摘要
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.lock().summaries.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // 锁中毒只可能来自测试线程 panic，数据仍然可用
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_write(&self, actor: &Actor, table: &str) -> Result<()> {
        actor.authorize_write(table)?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::Persistence(PersistenceError::BadResponse {
                operation: format!("write {}", table),
                status: 503,
                body: "injected failure".to_string(),
            }));
        }
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn fetch_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Session>> {
        async move {
            self.lock()
                .sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| AppError::not_found(SESSIONS, session_id))
        }
        .boxed()
    }

    fn create_session<'a>(
        &'a self,
        actor: &'a Actor,
        session: Session,
    ) -> BoxFuture<'a, Result<Session>> {
        async move {
            self.check_write(actor, SESSIONS)?;
            let mut tables = self.lock();
            if tables.sessions.contains_key(&session.id) {
                return Err(AppError::conflict(SESSIONS, &session.id));
            }
            debug!("创建会话 {}", session.id);
            tables.sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        }
        .boxed()
    }

    fn update_session<'a>(
        &'a self,
        actor: &'a Actor,
        session_id: &'a str,
        patch: SessionPatch,
    ) -> BoxFuture<'a, Result<Session>> {
        async move {
            self.check_write(actor, SESSIONS)?;
            let mut tables = self.lock();
            let session = tables
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| AppError::not_found(SESSIONS, session_id))?;
            session.apply(&patch);
            Ok(session.clone())
        }
        .boxed()
    }

    fn fetch_subtest<'a>(&'a self, subtest_id: &'a str) -> BoxFuture<'a, Result<Subtest>> {
        async move {
            self.lock()
                .subtests
                .get(subtest_id)
                .cloned()
                .ok_or_else(|| AppError::not_found(SUBTESTS, subtest_id))
        }
        .boxed()
    }

    fn insert_response<'a>(
        &'a self,
        actor: &'a Actor,
        response: NewResponse,
    ) -> BoxFuture<'a, Result<ResponseRecord>> {
        async move {
            self.check_write(actor, RESPONSES)?;
            let record = ResponseRecord {
                id: self.next_id("resp"),
                created_at: Utc::now(),
                response,
            };
            self.lock().responses.push(record.clone());
            Ok(record)
        }
        .boxed()
    }

    fn list_responses<'a>(
        &'a self,
        session_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResponseRecord>>> {
        async move {
            Ok(self
                .lock()
                .responses
                .iter()
                .filter(|r| r.response.session_id == session_id)
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn upsert_passage_result<'a>(
        &'a self,
        actor: &'a Actor,
        result: PassageAssessmentResult,
    ) -> BoxFuture<'a, Result<PassageAssessmentResult>> {
        async move {
            self.check_write(actor, PASSAGE_RESULTS)?;
            let key = (result.session_id.clone(), result.subtest_id.clone());
            self.lock().passage_results.insert(key, result.clone());
            Ok(result)
        }
        .boxed()
    }

    fn fetch_passage_result<'a>(
        &'a self,
        session_id: &'a str,
        subtest_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PassageAssessmentResult>>> {
        async move {
            Ok(self
                .lock()
                .passage_results
                .get(&(session_id.to_string(), subtest_id.to_string()))
                .cloned())
        }
        .boxed()
    }

    fn insert_session_summary<'a>(
        &'a self,
        actor: &'a Actor,
        summary: SessionSummary,
    ) -> BoxFuture<'a, Result<SessionSummary>> {
        async move {
            self.check_write(actor, SESSION_SUMMARIES)?;
            self.lock().summaries.push(summary.clone());
            Ok(summary)
        }
        .boxed()
    }
}
