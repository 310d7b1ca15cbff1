//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `assessor_surface` - 评估端
//! - 会话的唯一写入方
//! - 把操作翻译为状态机转换、临时状态广播和持久层写入
//! - 持有每秒一次的计时任务
//!
//! ### `student_display` - 学生端
//! - 只读：挂载时读取会话行，之后跟随通道消息
//! - 断线冻结画面，退避重连后重读会话行
//!
//! ## 层次关系
//!
//! ```text
//! assessor_surface ──写──▶ SessionStore ◀──读── student_display
//!        │                                           ▲
//!        └──────────▶ SyncHub (RowChange / State) ───┘
//!        ↓
//! workflow::navigation (状态机) / services (ORF、SEB、渲染)
//! ```

pub mod assessor_surface;
pub mod student_display;

pub use assessor_surface::{AssessorSurface, Notice, NoticeLevel, RecordOutcome, SebOutcome};
pub use student_display::StudentDisplay;
