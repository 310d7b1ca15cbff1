//! # Screening Session
//!
//! 实时筛查评估会话的核心：评估端计分与导航、学生端只读显示、
//! 朗读流利度（ORF）计分以及 SEB 风险计分。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `SessionStore` - 会话 / 分测验 / 作答的读写，写入按角色拦截
//! - `SyncHub` - 每个会话一个发布/订阅通道
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 纯计算，不做 IO
//! - `OrfScorer` / `OrfTimer` - 朗读计分与计时
//! - `seb_engine` - SEB 风险计分
//! - `display_renderer` - 学生端渲染
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/navigation` - 会话阶段状态机（显式转换表）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/assessor_surface` - 评估端，唯一写入方
//! - `orchestrator/student_display` - 学生端，只读跟随

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, Result};
pub use infrastructure::{Actor, MemoryStore, RestStore, SessionStore, SyncHub};
pub use models::{Session, SessionState, Subtest};
pub use orchestrator::{AssessorSurface, StudentDisplay};
pub use services::{DisplayFrame, OrfScorer, RiskLevel};
pub use workflow::{NavCommand, SessionPhase};
