//! 学生端 - 编排层
//!
//! 只读：挂载时读取一次会话行，然后订阅会话通道。
//!
//! - 临时状态整值覆盖，后到者生效
//! - 当前分测验变化时先显示等待帧，分测验内容加载完成后再渲染
//! - 分测验加载失败时保持等待帧，收到下一条临时状态时重试
//! - 通道断开时冻结在最后一帧，按指数退避重新订阅，成功后重读一次会话行
//! - 评估端长时间没有消息也不会清屏

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ChannelError, Result};
use crate::infrastructure::backoff::{reconnect_delay, BackoffConfig};
use crate::infrastructure::{ChannelMessage, SessionStore, SyncHub};
use crate::models::{Session, SessionState, SessionStatus, Subtest};
use crate::services::display_renderer::{self, DisplayFrame, RenderedView, ShowingFrame};

/// 学生端
pub struct StudentDisplay {
    store: Arc<dyn SessionStore>,
    session_id: String,
    backoff: BackoffConfig,
    session: Option<Session>,
    state: SessionState,
    subtest: Option<Arc<Subtest>>,
    frames: watch::Sender<DisplayFrame>,
}

impl StudentDisplay {
    pub fn new(store: Arc<dyn SessionStore>, session_id: impl Into<String>, config: &Config) -> Self {
        let (frames, _) = watch::channel(DisplayFrame::Waiting);
        Self {
            store,
            session_id: session_id.into(),
            backoff: BackoffConfig::from_config(config),
            session: None,
            state: SessionState::default(),
            subtest: None,
            frames,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 只读的帧流
    pub fn frames(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.subscribe()
    }

    pub fn frame(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub fn render(&self) -> RenderedView {
        display_renderer::render(&self.frames.borrow())
    }

    /// 读取一次会话行
    pub async fn mount(&mut self) -> Result<()> {
        let session = self.store.fetch_session(&self.session_id).await?;
        debug!(
            "[学生端 {}] 读取会话行: 分测验 {:?}，第 {} 题",
            self.session_id,
            session.current_subtest_id,
            session.state.current_item_index + 1
        );
        self.apply_session(session).await
    }

    /// 处理一条通道消息
    pub async fn apply(&mut self, message: ChannelMessage) -> Result<()> {
        match message {
            ChannelMessage::RowChange { session } => self.apply_session(session).await,
            ChannelMessage::StateBroadcast { state } => {
                self.state = state;
                let retried = match self.pending_subtest_id() {
                    Some(subtest_id) => self.load_subtest(&subtest_id).await,
                    None => Ok(()),
                };
                self.publish();
                retried
            }
        }
    }

    /// 会话行指向了分测验但内容尚未加载成功
    fn pending_subtest_id(&self) -> Option<String> {
        match (&self.session, &self.subtest) {
            (Some(session), None) if session.status != SessionStatus::Completed => {
                session.current_subtest_id.clone()
            }
            _ => None,
        }
    }

    async fn load_subtest(&mut self, subtest_id: &str) -> Result<()> {
        let subtest = self.store.fetch_subtest(subtest_id).await?;
        info!(
            "[学生端 {}] 📄 已加载分测验「{}」",
            self.session_id, subtest.name
        );
        self.subtest = Some(Arc::new(subtest));
        Ok(())
    }

    async fn apply_session(&mut self, session: Session) -> Result<()> {
        let loaded = self.subtest.as_ref().map(|s| s.id.clone());
        let target = session.current_subtest_id.clone();
        let ended = session.status == SessionStatus::Completed;
        self.state = session.state.clone();
        self.session = Some(session);

        if !ended && loaded != target {
            self.subtest = None;
            self.publish();
            if let Some(subtest_id) = target {
                // 加载失败时保持等待帧
                self.load_subtest(&subtest_id).await?;
            }
        }
        self.publish();
        Ok(())
    }

    fn current_frame(&self) -> DisplayFrame {
        match (&self.session, &self.subtest) {
            (Some(session), _) if session.status == SessionStatus::Completed => DisplayFrame::Ended,
            (Some(session), Some(subtest)) => DisplayFrame::Showing(ShowingFrame {
                subtest: Arc::clone(subtest),
                current_item_index: self.state.current_item_index,
                pointer_position: self.state.pointer_position,
                session_status: session.status,
            }),
            _ => DisplayFrame::Waiting,
        }
    }

    fn publish(&self) {
        let next = self.current_frame();
        self.frames.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    fn is_ended(&self) -> bool {
        matches!(*self.frames.borrow(), DisplayFrame::Ended)
    }

    /// 订阅循环，会话结束后返回
    ///
    /// 通道断开时保持最后一帧，按退避重试订阅；重新订阅后重读一次会话行。
    pub async fn run(&mut self, hub: Arc<SyncHub>) {
        let mut attempt: u32 = 0;
        let mut needs_level = self.session.is_none();

        loop {
            let mut subscription = match hub.subscribe(&self.session_id) {
                Ok(subscription) => subscription,
                Err(e) => {
                    let delay = reconnect_delay(attempt, &self.backoff);
                    debug!(
                        "[学生端 {}] 订阅失败 ({})，{:?} 后重试 (第 {} 次)",
                        self.session_id,
                        e,
                        delay,
                        attempt + 1
                    );
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            if attempt > 0 {
                info!(
                    "[学生端 {}] 🔌 重新订阅成功 (尝试 {} 次)",
                    self.session_id, attempt
                );
            }
            attempt = 0;

            if needs_level {
                if let Err(e) = self.mount().await {
                    warn!(
                        "[学生端 {}] ⚠️ 重读会话行失败，等待下一次变更: {}",
                        self.session_id, e
                    );
                }
                needs_level = false;
            }
            if self.is_ended() {
                return;
            }

            loop {
                match subscription.recv().await {
                    Ok(message) => {
                        if let Err(e) = self.apply(message).await {
                            warn!("[学生端 {}] ⚠️ 消息处理失败: {}", self.session_id, e);
                        }
                        if self.is_ended() {
                            info!("[学生端 {}] 🏁 会话已结束", self.session_id);
                            return;
                        }
                    }
                    Err(ChannelError::Lagged { skipped, .. }) => {
                        // 可能错过了会话行变更，重读一次
                        debug!(
                            "[学生端 {}] 订阅落后 {} 条，重读会话行",
                            self.session_id, skipped
                        );
                        if let Err(e) = self.mount().await {
                            warn!("[学生端 {}] ⚠️ 重读会话行失败: {}", self.session_id, e);
                        }
                    }
                    Err(ChannelError::Disconnected { .. }) => {
                        warn!(
                            "[学生端 {}] 🔌 通道断开，保持当前画面并重新订阅",
                            self.session_id
                        );
                        needs_level = true;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{Actor, MemoryStore};
    use crate::models::{ModuleType, PointerPosition, SessionPatch, TimingConfig};
    use serde_json::json;
    use std::time::Duration;

    fn letters() -> Subtest {
        Subtest {
            id: "letters".to_string(),
            name: "字母命名".to_string(),
            module_type: ModuleType::ItemList,
            stimulus: json!({ "items": ["a", "m", "s"] }),
            timing: TimingConfig::default(),
            script_prompt: None,
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed_subtest(letters());
        store
            .create_session(&Actor::assessor("a-1"), Session::new("s-1", "stu-1"))
            .await
            .unwrap();
        store
    }

    async fn select_letters(store: &MemoryStore) -> Session {
        store
            .update_session(
                &Actor::assessor("a-1"),
                "s-1",
                SessionPatch {
                    current_subtest_id: Some(Some("letters".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mount_without_subtest_waits() {
        let store = seeded_store().await;
        let mut display = StudentDisplay::new(store, "s-1", &Config::default());
        display.mount().await.unwrap();
        assert!(display.frame().is_waiting());
        assert_eq!(display.render(), RenderedView::Waiting);
    }

    #[tokio::test]
    async fn test_row_change_loads_subtest_then_state_levels() {
        let store = seeded_store().await;
        let mut display = StudentDisplay::new(store.clone(), "s-1", &Config::default());
        display.mount().await.unwrap();

        let session = select_letters(&store).await;
        display
            .apply(ChannelMessage::RowChange { session })
            .await
            .unwrap();
        assert_eq!(display.frame().subtest_id(), Some("letters"));
        assert_eq!(display.frame().current_item_index(), Some(0));

        display
            .apply(ChannelMessage::StateBroadcast {
                state: SessionState {
                    current_item_index: 2,
                    pointer_position: Some(PointerPosition { x: 0.1, y: 0.9 }),
                    timer_seconds: 4,
                    is_timer_running: true,
                },
            })
            .await
            .unwrap();
        let frame = display.frame();
        assert_eq!(frame.current_item_index(), Some(2));
        assert_eq!(frame.pointer_position(), Some(PointerPosition { x: 0.1, y: 0.9 }));

        // 同一消息重复到达是幂等的
        let mut frames = display.frames();
        frames.borrow_and_update();
        display
            .apply(ChannelMessage::StateBroadcast {
                state: display.state.clone(),
            })
            .await
            .unwrap();
        assert!(!frames.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_subtest_keeps_waiting() {
        let store = seeded_store().await;
        let mut display = StudentDisplay::new(store, "s-1", &Config::default());
        let mut session = Session::new("s-1", "stu-1");
        session.current_subtest_id = Some("missing".to_string());

        assert!(display
            .apply(ChannelMessage::RowChange { session })
            .await
            .is_err());
        assert!(display.frame().is_waiting());
    }

    #[tokio::test]
    async fn test_failed_subtest_fetch_retries_on_next_state() {
        let store = seeded_store().await;
        let mut display = StudentDisplay::new(store.clone(), "s-1", &Config::default());
        display.mount().await.unwrap();

        let mut session = Session::new("s-1", "stu-1");
        session.current_subtest_id = Some("late".to_string());
        assert!(display
            .apply(ChannelMessage::RowChange { session })
            .await
            .is_err());
        assert!(display.frame().is_waiting());

        // 分测验随后可读，下一条临时状态触发重试
        store.seed_subtest(Subtest {
            id: "late".to_string(),
            ..letters()
        });
        display
            .apply(ChannelMessage::StateBroadcast {
                state: SessionState {
                    current_item_index: 1,
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        let frame = display.frame();
        assert_eq!(frame.subtest_id(), Some("late"));
        assert_eq!(frame.current_item_index(), Some(1));
    }

    #[tokio::test]
    async fn test_completed_session_shows_ended() {
        let store = seeded_store().await;
        let mut display = StudentDisplay::new(store, "s-1", &Config::default());
        let mut session = Session::new("s-1", "stu-1");
        session.status = SessionStatus::Completed;
        display
            .apply(ChannelMessage::RowChange { session })
            .await
            .unwrap();
        assert_eq!(display.frame(), DisplayFrame::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_assessor_never_clears_display() {
        let store = seeded_store().await;
        select_letters(&store).await;
        let hub = Arc::new(SyncHub::new(8));
        let mut display = StudentDisplay::new(store, "s-1", &Config::default());
        display.mount().await.unwrap();
        let before = display.frame();
        let frames = display.frames();

        let handle = tokio::spawn({
            let hub = hub.clone();
            async move {
                display.run(hub).await;
            }
        });
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(*frames.borrow(), before);
        assert_eq!(before.subtest_id(), Some("letters"));
        assert_eq!(hub.subscriber_count("s-1"), 1);
        handle.abort();
    }
}
