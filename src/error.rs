use thiserror::Error;

/// 应用程序错误类型
///
/// 核心内没有任何错误是进程级致命的：每个错误只属于一次操作，重新发起即可重试。
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入校验错误（命令发出前拦截）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 持久层读写错误
    #[error("持久层错误: {0}")]
    Persistence(#[from] PersistenceError),
    /// 同步通道错误
    #[error("同步通道错误: {0}")]
    Channel(#[from] ChannelError),
    /// 刺激材料数据结构错误
    #[error("数据结构错误: {0}")]
    DataShape(#[from] DataShapeError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 输入校验错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// 当前状态不允许该操作
    #[error("状态 {from} 不允许执行 {command}")]
    InvalidTransition { from: String, command: String },
    /// 题目索引超出范围
    #[error("题目索引 {index} 超出范围 [0, {total})")]
    ItemIndexOutOfRange { index: usize, total: usize },
    /// 记录的分测验不是当前分测验
    #[error("分测验 {given} 不是当前分测验 ({current:?})")]
    SubtestMismatch {
        given: String,
        current: Option<String>,
    },
    /// 分测验没有题目
    #[error("分测验 {subtest_id} 没有可计分的题目")]
    EmptySubtest { subtest_id: String },
    /// 评分超出 [0, 3]
    #[error("问题 {question_id} 的评分 {rating} 超出范围 [0, 3]")]
    RatingOutOfRange { question_id: String, rating: u8 },
    /// 流利度评分超出 [1, 4]
    #[error("流利度维度 {dimension} 的评分 {rating} 超出范围 [1, 4]")]
    FluencyRatingOutOfRange { dimension: String, rating: u8 },
    /// 单词索引超出范围
    #[error("单词索引 {index} 超出范围 [0, {total})")]
    WordIndexOutOfRange { index: usize, total: usize },
    /// 指针坐标超出 [0, 1]
    #[error("指针坐标 ({x}, {y}) 超出范围 [0, 1]")]
    PointerOutOfRange { x: f64, y: f64 },
    /// 必填字段为空
    #[error("字段 {field} 不能为空")]
    MissingField { field: String },
}

/// 持久层错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 记录不存在
    #[error("{table} 中不存在记录 {id}")]
    NotFound { table: String, id: String },
    /// 写入被拒绝（非评估者角色）
    #[error("角色 {role} 无权写入 {table}")]
    Forbidden { table: String, role: String },
    /// 主键冲突
    #[error("{table} 中已存在记录 {id}")]
    Conflict { table: String, id: String },
    /// 请求失败
    #[error("持久层请求失败 ({operation}): {source}")]
    RequestFailed {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务端返回错误响应
    #[error("持久层返回错误响应 ({operation}): status={status}, body={body}")]
    BadResponse {
        operation: String,
        status: u16,
        body: String,
    },
    /// 序列化 / 反序列化失败
    #[error("JSON 解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 同步通道错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// 通道已断开
    #[error("会话 {session_id} 的通道已断开")]
    Disconnected { session_id: String },
    /// 接收端落后，部分消息被丢弃
    #[error("会话 {session_id} 的订阅落后 {skipped} 条消息")]
    Lagged { session_id: String, skipped: u64 },
}

/// 刺激材料数据结构错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataShapeError {
    /// 缺少必需字段
    #[error("分测验 {subtest_id} 的刺激材料缺少字段 {field}")]
    MissingField { subtest_id: String, field: String },
    /// 字段类型不符
    #[error("分测验 {subtest_id} 的字段 {field} 类型不符，期望 {expected}")]
    WrongType {
        subtest_id: String,
        field: String,
        expected: String,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Persistence(PersistenceError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Persistence(PersistenceError::RequestFailed {
            operation: err
                .url()
                .map(|u| u.path().to_string())
                .unwrap_or_default(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建记录不存在错误
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::Persistence(PersistenceError::NotFound {
            table: table.into(),
            id: id.into(),
        })
    }

    /// 创建写入被拒绝错误
    pub fn forbidden(table: impl Into<String>, role: impl Into<String>) -> Self {
        AppError::Persistence(PersistenceError::Forbidden {
            table: table.into(),
            role: role.into(),
        })
    }

    /// 创建主键冲突错误
    pub fn conflict(table: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::Persistence(PersistenceError::Conflict {
            table: table.into(),
            id: id.into(),
        })
    }

    /// 是否为校验错误（本地拦截，不应触达持久层）
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// 是否为持久层错误
    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type Result<T> = std::result::Result<T, AppError>;
