//! 评估端 - 编排层
//!
//! ## 职责
//!
//! 评估者是会话的唯一写入方。本模块把评估者的每个操作翻译为：
//! 1. 导航状态机转换（`workflow::navigation::reduce`）
//! 2. 本地临时状态更新 + 整值广播（`SyncHub::broadcast_state`）
//! 3. 持久层写入（`SessionStore`），会话行变更后发布 `RowChange`
//!
//! ## 错误处理
//!
//! - 校验错误：本地拦截，生成提示，不触达持久层
//! - 计分时的持久层错误：生成提示，已前进的题目索引不回滚
//! - 计时器每秒 tick 一次，只有评估端的值是权威的

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result, ValidationError};
use crate::infrastructure::{Actor, SessionStore, SyncHub};
use crate::models::response::distinct_items_scored;
use crate::models::{
    CompletionReason, ModuleType, NewResponse, PassageAssessmentResult, PointerPosition,
    ResponseRecord, ScoredResponse, Session, SessionPatch, SessionState, SessionStatePatch,
    SessionStatus, SessionSummary, Subtest, ValidityStatus,
};
use crate::services::orf_scorer::OrfScorer;
use crate::services::orf_timer::{OrfTimer, TimerEvent};
use crate::services::seb_engine::{self, BriefSebResult, RatingMap, SebOverallResult};
use crate::workflow::{reduce, NavCommand, SessionPhase};

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 给评估者看的临时提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// 记录作答的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// 记录后的当前题目索引
    pub item_index: usize,
    /// 保存成功的作答行；保存失败时为 `None`（会附带提示）
    pub saved: Option<ResponseRecord>,
}

/// SEB 计分结果
#[derive(Debug, Clone, PartialEq)]
pub enum SebOutcome {
    Full(SebOverallResult),
    Brief(BriefSebResult),
}

/// 评估端
pub struct AssessorSurface {
    store: Arc<dyn SessionStore>,
    hub: Arc<SyncHub>,
    actor: Actor,
    session: Session,
    phase: SessionPhase,
    subtest: Option<Arc<Subtest>>,
    timer: OrfTimer,
    orf: Option<OrfScorer>,
    item_time_limit_seconds: u32,
    summaries: Vec<SessionSummary>,
    notices: Vec<Notice>,
}

impl AssessorSurface {
    fn with_session(
        store: Arc<dyn SessionStore>,
        hub: Arc<SyncHub>,
        actor: Actor,
        session: Session,
        config: &Config,
    ) -> Self {
        Self {
            store,
            hub,
            actor,
            session,
            phase: SessionPhase::NoSubtestSelected,
            subtest: None,
            timer: OrfTimer::with_limit(config.item_time_limit_seconds),
            orf: None,
            item_time_limit_seconds: config.item_time_limit_seconds,
            summaries: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// 创建新会话
    pub async fn open(
        store: Arc<dyn SessionStore>,
        hub: Arc<SyncHub>,
        actor: Actor,
        session_id: &str,
        student_id: &str,
        config: &Config,
    ) -> Result<Self> {
        let session = store
            .create_session(&actor, Session::new(session_id, student_id))
            .await?;
        info!(
            "[会话 {}] 📝 评估会话已创建 (学生 {}, 评估者 {})",
            session.id, session.student_id, actor.id
        );
        hub.publish_row_change(&session);
        Ok(Self::with_session(store, hub, actor, session, config))
    }

    /// 重新接入已有会话（评估端刷新后恢复）
    pub async fn resume(
        store: Arc<dyn SessionStore>,
        hub: Arc<SyncHub>,
        actor: Actor,
        session_id: &str,
        config: &Config,
    ) -> Result<Self> {
        let session = store.fetch_session(session_id).await?;
        let mut surface = Self::with_session(store, hub, actor, session, config);

        if surface.session.status == SessionStatus::Completed {
            surface.phase = SessionPhase::SessionEnded {
                validity: surface
                    .session
                    .validity_status
                    .unwrap_or(ValidityStatus::Valid),
            };
        } else if let Some(subtest_id) = surface.session.current_subtest_id.clone() {
            let subtest = surface.store.fetch_subtest(&subtest_id).await?;
            let total_items = subtest.total_items()?;
            let (timer, orf) = surface.prepare_subtest(&subtest)?;
            surface.timer = timer;
            surface.orf = orf;
            surface.phase = SessionPhase::SubtestActive {
                subtest_id,
                total_items,
                item_index: surface
                    .session
                    .state
                    .current_item_index
                    .min(total_items.saturating_sub(1)),
            };
            surface.subtest = Some(Arc::new(subtest));
        }

        info!(
            "[会话 {}] 🔄 评估端已恢复，当前阶段 {}",
            surface.session.id,
            surface.phase.name()
        );
        Ok(surface)
    }

    // ========== 查询 ==========

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.session.state
    }

    pub fn current_subtest(&self) -> Option<&Arc<Subtest>> {
        self.subtest.as_ref()
    }

    pub fn orf(&self) -> Option<&OrfScorer> {
        self.orf.as_ref()
    }

    /// 当前朗读分测验的计分器（标记单词、停止点、流利度）
    pub fn orf_mut(&mut self) -> Option<&mut OrfScorer> {
        self.orf.as_mut()
    }

    /// 已完成分测验的摘要
    pub fn completion_summary(&self) -> &[SessionSummary] {
        &self.summaries
    }

    /// 取走待显示的提示
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// 某分测验已计分的不同题目数（重复计分只算一次）
    pub async fn items_scored(&self, subtest_id: &str) -> Result<usize> {
        let responses = self.store.list_responses(&self.session.id).await?;
        Ok(distinct_items_scored(&responses, subtest_id))
    }

    // ========== 导航 ==========

    /// 切换到分测验：题目索引和计时器归零
    ///
    /// 刺激材料先在本地校验，通过后才写会话行，失败时会话行和当前阶段都不变。
    pub async fn navigate_to_subtest(&mut self, subtest_id: &str) -> Result<Arc<Subtest>> {
        let subtest = self.store.fetch_subtest(subtest_id).await?;
        let total_items = subtest.total_items()?;
        let next = self.next_phase(NavCommand::SelectSubtest {
            subtest_id: subtest.id.clone(),
            total_items,
        })?;
        let (timer, orf) = match self.prepare_subtest(&subtest) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(
                    "[会话 {}] ⚠️ 分测验 {} 的刺激材料不可用: {}",
                    self.session.id, subtest.id, e
                );
                self.notify(NoticeLevel::Warning, format!("分测验无法加载: {}", e));
                return Err(e);
            }
        };

        let state = SessionState::default();
        let updated = self
            .store
            .update_session(
                &self.actor,
                &self.session.id,
                SessionPatch {
                    current_subtest_id: Some(Some(subtest.id.clone())),
                    state: Some(state.as_patch()),
                    ..Default::default()
                },
            )
            .await?;

        let subtest = Arc::new(subtest);
        self.timer = timer;
        self.orf = orf;
        self.phase = next;
        self.subtest = Some(subtest.clone());
        self.session = updated;
        self.session.state = state;
        self.hub.publish_row_change(&self.session);
        self.broadcast();

        info!(
            "[会话 {}] ➡️ 进入分测验「{}」({}，共 {} 题)",
            self.session.id,
            subtest.name,
            subtest.id,
            total_items
        );
        Ok(subtest)
    }

    /// 准备分测验相关的计时器和朗读计分器
    ///
    /// 朗读分测验使用计分器自带的固定上限计时器；其他分测验的计时上限可配置。
    fn prepare_subtest(&self, subtest: &Subtest) -> Result<(OrfTimer, Option<OrfScorer>)> {
        let orf = match subtest.module_type {
            ModuleType::OralReading => Some(OrfScorer::from_subtest(subtest)?),
            _ => None,
        };
        let limit = subtest
            .timing
            .time_limit_seconds
            .unwrap_or(self.item_time_limit_seconds);
        Ok((OrfTimer::with_limit(limit), orf))
    }

    /// 记录作答并自动前进到下一题
    ///
    /// 持久层失败时不回滚已前进的索引，只生成提示。
    pub async fn record_response(
        &mut self,
        subtest_id: &str,
        item_index: usize,
        scored: ScoredResponse,
        response_time_ms: Option<u64>,
        notes: Option<String>,
    ) -> Result<RecordOutcome> {
        let mismatch = match self.phase.subtest_id() {
            Some(current) if current != subtest_id => Some(ValidationError::SubtestMismatch {
                given: subtest_id.to_string(),
                current: Some(current.to_string()),
            }),
            _ => None,
        };
        if let Some(err) = mismatch {
            return Err(self.block(err));
        }

        let next = self.next_phase(NavCommand::Record { item_index })?;
        self.session.state.current_item_index = next.item_index().unwrap_or(item_index);
        self.phase = next;
        self.broadcast();

        let response = NewResponse::new(&self.session.id, subtest_id, item_index, &scored)
            .with_response_time(response_time_ms)
            .with_notes(notes);
        let saved = match self.store.insert_response(&self.actor, response).await {
            Ok(record) => {
                debug!(
                    "[会话 {}] 第 {} 题计分 {} 已保存",
                    self.session.id,
                    item_index + 1,
                    scored.code()
                );
                Some(record)
            }
            Err(e @ AppError::Persistence(_)) => {
                error!(
                    "[会话 {}] ❌ 第 {} 题作答保存失败: {}",
                    self.session.id,
                    item_index + 1,
                    e
                );
                self.notify(
                    NoticeLevel::Error,
                    format!("第 {} 题作答保存失败，请重新计分: {}", item_index + 1, e),
                );
                None
            }
            Err(e) => return Err(e),
        };

        self.persist_state().await;
        Ok(RecordOutcome {
            item_index: self.session.state.current_item_index,
            saved,
        })
    }

    /// 更新临时状态（部分字段）
    ///
    /// 计时字段由计时器命令维护，这里会被忽略。
    pub async fn update_session_state(&mut self, patch: SessionStatePatch) -> Result<SessionState> {
        if self.phase.is_ended() {
            return Err(self.block(invalid(&self.phase, "UpdateSessionState")));
        }
        if let Some(Some(pointer)) = patch.pointer_position {
            if let Err(e) = PointerPosition::new(pointer.x, pointer.y) {
                return Err(self.block(e));
            }
        }
        let index_changed = match patch.current_item_index {
            Some(item_index) => {
                self.phase = self.next_phase(NavCommand::GoToItem { item_index })?;
                true
            }
            None => false,
        };

        let patch = SessionStatePatch {
            timer_seconds: None,
            is_timer_running: None,
            ..patch
        };
        self.session.state = self.session.state.merged(&patch);
        self.broadcast();
        if index_changed {
            self.persist_state().await;
        }
        Ok(self.session.state.clone())
    }

    /// 跳到指定题目（不计分）
    pub async fn go_to_item(&mut self, item_index: usize) -> Result<SessionState> {
        self.update_session_state(SessionStatePatch {
            current_item_index: Some(item_index),
            ..Default::default()
        })
        .await
    }

    /// 移动指针，只广播不持久化
    pub fn move_pointer(&mut self, x: f64, y: f64) -> Result<()> {
        let pointer = PointerPosition::new(x, y).map_err(|e| self.block(e))?;
        self.session.state.pointer_position = Some(pointer);
        self.broadcast();
        Ok(())
    }

    pub fn clear_pointer(&mut self) {
        self.session.state.pointer_position = None;
        self.broadcast();
    }

    /// 提交或中止当前分测验，生成完成摘要
    pub async fn complete_current_subtest(
        &mut self,
        reason: CompletionReason,
    ) -> Result<SessionSummary> {
        let (subtest_id, total_items) = match &self.phase {
            SessionPhase::SubtestActive {
                subtest_id,
                total_items,
                ..
            } => (subtest_id.clone(), *total_items),
            _ => return Err(self.block(invalid(&self.phase, "Complete"))),
        };
        let next = self.next_phase(NavCommand::Complete { reason })?;
        let items_scored = self.items_scored(&subtest_id).await?;

        self.phase = next;
        self.timer_mut().pause();
        self.sync_timer();
        self.broadcast();

        let summary = SessionSummary {
            session_id: self.session.id.clone(),
            subtest_id,
            items_scored,
            total_items,
            completion_reason: reason,
            completed_at: Utc::now(),
        };
        if let Err(e) = self
            .store
            .insert_session_summary(&self.actor, summary.clone())
            .await
        {
            warn!("[会话 {}] ⚠️ 完成摘要保存失败: {}", self.session.id, e);
            self.notify(NoticeLevel::Warning, format!("完成摘要保存失败: {}", e));
        }
        info!(
            "[会话 {}] ✅ 分测验 {} {}，已计分 {}/{}",
            self.session.id, summary.subtest_id, reason, items_scored, total_items
        );
        self.summaries.push(summary.clone());
        Ok(summary)
    }

    /// 完成后继续选择下一个分测验
    pub async fn add_another_subtest(&mut self) -> Result<()> {
        let next = self.next_phase(NavCommand::AddAnotherSubtest)?;
        let state = SessionState::default();
        let updated = self
            .store
            .update_session(
                &self.actor,
                &self.session.id,
                SessionPatch {
                    current_subtest_id: Some(None),
                    state: Some(state.as_patch()),
                    ..Default::default()
                },
            )
            .await?;

        self.phase = next;
        self.subtest = None;
        self.orf = None;
        self.timer = OrfTimer::with_limit(self.item_time_limit_seconds);
        self.session = updated;
        self.session.state = state;
        self.hub.publish_row_change(&self.session);
        self.broadcast();
        info!("[会话 {}] ➕ 等待选择下一个分测验", self.session.id);
        Ok(())
    }

    // ========== 会话 ==========

    /// 更新持久化会话字段（观察记录、有效性等）
    ///
    /// 切换分测验必须走 `navigate_to_subtest`；把状态改为完成必须同时给出有效性。
    pub async fn update_session(&mut self, patch: SessionPatch) -> Result<Session> {
        if patch.current_subtest_id.is_some() {
            return Err(self.block(invalid(&self.phase, "UpdateSession(current_subtest_id)")));
        }
        let ending = patch.status == Some(SessionStatus::Completed);
        let next = match (ending, patch.validity_status) {
            (true, None) => {
                return Err(self.block(ValidationError::MissingField {
                    field: "validity_status".to_string(),
                }))
            }
            (true, Some(validity)) => Some(self.next_phase(NavCommand::EndSession { validity })?),
            (false, _) if self.phase.is_ended() => {
                return Err(self.block(invalid(&self.phase, "UpdateSession")))
            }
            (false, _) => None,
        };

        let mut patch = patch;
        if ending {
            self.timer_mut().pause();
            self.sync_timer();
            patch.completed_at = patch.completed_at.or_else(|| Some(Utc::now()));
        }
        let state = match &patch.state {
            Some(state_patch) => self.session.state.merged(state_patch),
            None => self.session.state.clone(),
        };
        patch.state = Some(state.as_patch());

        let updated = self
            .store
            .update_session(&self.actor, &self.session.id, patch)
            .await?;
        if let Some(next) = next {
            self.phase = next;
        }
        self.session = updated;
        self.session.state = state;
        self.hub.publish_row_change(&self.session);
        self.broadcast();
        Ok(self.session.clone())
    }

    /// 结束会话；必须给出有效性分类
    pub async fn end_session(&mut self, validity: ValidityStatus) -> Result<Session> {
        let session = self
            .update_session(SessionPatch {
                status: Some(SessionStatus::Completed),
                validity_status: Some(validity),
                ..Default::default()
            })
            .await?;
        info!(
            "[会话 {}] 🏁 会话结束，有效性: {}",
            session.id, validity
        );
        Ok(session)
    }

    // ========== 计时器 ==========

    pub fn start_timer(&mut self) -> Result<()> {
        self.require_active("StartTimer")?;
        self.timer_mut().start();
        self.sync_timer();
        self.broadcast();
        Ok(())
    }

    pub fn pause_timer(&mut self) -> Result<()> {
        self.require_active("PauseTimer")?;
        self.timer_mut().pause();
        self.sync_timer();
        self.broadcast();
        Ok(())
    }

    pub fn reset_timer(&mut self) -> Result<()> {
        self.require_active("ResetTimer")?;
        self.timer_mut().reset();
        self.sync_timer();
        self.broadcast();
        Ok(())
    }

    /// 计时器前进一秒并广播
    pub fn tick(&mut self) -> TimerEvent {
        let event = self.timer_mut().tick();
        match event {
            TimerEvent::Idle => {}
            TimerEvent::Ticked(_) => {
                self.sync_timer();
                self.broadcast();
            }
            TimerEvent::Completed => {
                self.sync_timer();
                self.broadcast();
                info!(
                    "[会话 {}] ⏱️ 计时到达上限 {} 秒，已自动暂停",
                    self.session.id, self.session.state.timer_seconds
                );
                self.notify(NoticeLevel::Info, "计时结束");
            }
        }
        event
    }

    /// 启动每秒一次的计时任务，计时器暂停或到达上限后退出
    pub fn spawn_timer(surface: &Arc<Mutex<AssessorSurface>>) -> JoinHandle<()> {
        let surface = Arc::clone(surface);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即返回
            interval.tick().await;
            loop {
                interval.tick().await;
                match surface.lock().await.tick() {
                    TimerEvent::Ticked(_) => continue,
                    TimerEvent::Idle | TimerEvent::Completed => break,
                }
            }
        })
    }

    fn timer(&self) -> &OrfTimer {
        match self.orf.as_ref() {
            Some(scorer) => scorer.timer(),
            None => &self.timer,
        }
    }

    fn timer_mut(&mut self) -> &mut OrfTimer {
        match self.orf.as_mut() {
            Some(scorer) => scorer.timer_mut(),
            None => &mut self.timer,
        }
    }

    fn sync_timer(&mut self) {
        let (elapsed, running) = {
            let timer = self.timer();
            (timer.elapsed_seconds(), timer.is_running())
        };
        self.session.state.timer_seconds = elapsed;
        self.session.state.is_timer_running = running;
    }

    // ========== 计分结果 ==========

    /// 保存当前朗读分测验的结果（按会话 + 分测验覆盖）
    pub async fn save_orf(&mut self) -> Result<PassageAssessmentResult> {
        let result = self
            .phase
            .subtest_id()
            .zip(self.orf.as_ref())
            .map(|(subtest_id, scorer)| scorer.to_result(&self.session.id, subtest_id));
        let Some(result) = result else {
            return Err(self.block(invalid(&self.phase, "SaveOrf")));
        };
        let saved = self
            .store
            .upsert_passage_result(&self.actor, result)
            .await?;
        info!(
            "[会话 {}] 📖 朗读结果已保存: WCPM {}，正确率 {}%，基准 {}",
            self.session.id, saved.metrics.wcpm, saved.metrics.accuracy, saved.benchmark
        );
        Ok(saved)
    }

    /// 按当前 SEB 分测验类型计分
    pub fn score_seb(&mut self, ratings: &RatingMap) -> Result<SebOutcome> {
        if let Err(e) = seb_engine::validate_ratings(ratings) {
            return Err(self.block(e));
        }
        let module_type = self.subtest.as_ref().map(|s| s.module_type);
        let outcome = match module_type {
            Some(ModuleType::SebScreener) => SebOutcome::Full(seb_engine::score_full_screener(ratings)),
            Some(ModuleType::SebBrief) => SebOutcome::Brief(seb_engine::score_brief_screener(ratings)),
            _ => return Err(self.block(invalid(&self.phase, "ScoreSeb"))),
        };
        Ok(outcome)
    }

    // ========== 内部 ==========

    fn next_phase(&mut self, command: NavCommand) -> Result<SessionPhase> {
        reduce(&self.phase, &command).map_err(|e| self.block(e))
    }

    fn require_active(&mut self, command: &str) -> Result<()> {
        match self.phase {
            SessionPhase::SubtestActive { .. } => Ok(()),
            _ => Err(self.block(invalid(&self.phase, command))),
        }
    }

    /// 校验错误：本地拦截并生成提示
    fn block(&mut self, err: ValidationError) -> AppError {
        warn!("[会话 {}] ⚠️ 操作被拦截: {}", self.session.id, err);
        self.notify(NoticeLevel::Warning, err.to_string());
        AppError::Validation(err)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn broadcast(&self) {
        self.hub
            .broadcast_state(&self.session.id, &self.session.state);
    }

    /// 把当前临时状态写到会话行上，供学生端挂载时读取；失败只提示
    async fn persist_state(&mut self) {
        let patch = SessionPatch {
            state: Some(self.session.state.as_patch()),
            ..Default::default()
        };
        if let Err(e) = self
            .store
            .update_session(&self.actor, &self.session.id, patch)
            .await
        {
            warn!("[会话 {}] ⚠️ 会话状态保存失败: {}", self.session.id, e);
            self.notify(NoticeLevel::Warning, format!("会话状态保存失败: {}", e));
        }
    }
}

fn invalid(phase: &SessionPhase, command: &str) -> ValidationError {
    ValidationError::InvalidTransition {
        from: phase.name().to_string(),
        command: command.to_string(),
    }
}
