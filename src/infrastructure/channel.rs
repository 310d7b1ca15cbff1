//! 同步通道 - 基础设施层
//!
//! 每个会话一个发布/订阅通道，承载两类消息：
//! - 持久化会话行变更通知（`RowChange`）
//! - 临时状态广播（`StateBroadcast`），整值发送，后到者生效
//!
//! 发送是 fire-and-forget：没有订阅者时直接丢弃。
//! 会话结束的行变更发出后释放该会话的通道，订阅者收完缓冲消息后收到断开。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::ChannelError;
use crate::models::{Session, SessionState, SessionStatus};

/// 通道消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    RowChange { session: Session },
    StateBroadcast { state: SessionState },
}

#[derive(Default)]
struct HubState {
    senders: HashMap<String, broadcast::Sender<ChannelMessage>>,
    offline: HashSet<String>,
}

/// 进程内同步中心
pub struct SyncHub {
    state: Mutex<HubState>,
    capacity: usize,
}

impl SyncHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 订阅会话通道；通道不可用时返回 `Disconnected`
    pub fn subscribe(&self, session_id: &str) -> Result<Subscription, ChannelError> {
        let mut state = self.lock();
        if state.offline.contains(session_id) {
            return Err(ChannelError::Disconnected {
                session_id: session_id.to_string(),
            });
        }
        let capacity = self.capacity;
        let sender = state
            .senders
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0);
        debug!("[会话 {}] 新订阅，当前订阅数 {}", session_id, sender.receiver_count() + 1);
        Ok(Subscription {
            session_id: session_id.to_string(),
            receiver: sender.subscribe(),
        })
    }

    /// 发布会话行变更；会话已结束时随后释放通道
    pub fn publish_row_change(&self, session: &Session) {
        self.publish(
            &session.id,
            ChannelMessage::RowChange {
                session: session.clone(),
            },
        );
        if session.status == SessionStatus::Completed
            && self.lock().senders.remove(&session.id).is_some()
        {
            debug!("[会话 {}] 会话已结束，释放通道", session.id);
        }
    }

    /// 当前持有通道的会话数
    pub fn session_count(&self) -> usize {
        self.lock().senders.len()
    }

    /// 广播临时状态（整值）
    pub fn broadcast_state(&self, session_id: &str, state: &SessionState) {
        self.publish(
            session_id,
            ChannelMessage::StateBroadcast {
                state: state.clone(),
            },
        );
    }

    fn publish(&self, session_id: &str, message: ChannelMessage) {
        let state = self.lock();
        if let Some(sender) = state.senders.get(session_id) {
            // 没有订阅者时 send 返回 Err，按约定忽略
            let delivered = sender.send(message).unwrap_or(0);
            debug!("[会话 {}] 消息送达 {} 个订阅者", session_id, delivered);
        }
    }

    /// 断开会话通道：现有订阅收到 `Disconnected`，之后的订阅失败直到 `restore`
    pub fn disconnect(&self, session_id: &str) {
        let mut state = self.lock();
        state.senders.remove(session_id);
        state.offline.insert(session_id.to_string());
        info!("[会话 {}] 🔌 通道已断开", session_id);
    }

    /// 恢复会话通道
    pub fn restore(&self, session_id: &str) {
        self.lock().offline.remove(session_id);
        info!("[会话 {}] 🔌 通道已恢复", session_id);
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.lock()
            .senders
            .get(session_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

/// 单个订阅
pub struct Subscription {
    session_id: String,
    receiver: broadcast::Receiver<ChannelMessage>,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 接收下一条消息
    ///
    /// 落后时返回 `Lagged`：状态是整值的，调用方继续接收即可，无需补发。
    pub async fn recv(&mut self) -> Result<ChannelMessage, ChannelError> {
        match self.receiver.recv().await {
            Ok(message) => Ok(message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Err(ChannelError::Lagged {
                session_id: self.session_id.clone(),
                skipped,
            }),
            Err(broadcast::error::RecvError::Closed) => Err(ChannelError::Disconnected {
                session_id: self.session_id.clone(),
            }),
        }
    }
}
