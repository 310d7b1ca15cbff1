//! 分测验数据模型
//!
//! 刺激材料 `stimulus` 是自由 JSON，对核心只读。读取具体字段时
//! 缺字段或类型不符返回 `DataShapeError`，由渲染端降级为占位内容。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DataShapeError;
use crate::models::seb_catalog::{BRIEF_CATEGORIES, RAW_CATEGORIES};

/// 分测验模块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// 逐题计分
    ItemList,
    /// 朗读流利度（整段计分）
    OralReading,
    /// SEB 完整筛查
    SebScreener,
    /// SEB 简版筛查
    SebBrief,
}

/// 计时配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub show_timer: bool,
}

/// 分测验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtest {
    pub id: String,
    pub name: String,
    pub module_type: ModuleType,
    #[serde(default)]
    pub stimulus: JsonValue,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub script_prompt: Option<String>,
}

/// 单个刺激题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusItem {
    pub prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Subtest {
    /// 读取题目列表 `stimulus.items`
    ///
    /// 每项可以是字符串，也可以是带 `prompt` 字段的对象。
    pub fn items(&self) -> Result<Vec<StimulusItem>, DataShapeError> {
        let items = self
            .stimulus
            .get("items")
            .ok_or_else(|| self.missing("items"))?
            .as_array()
            .ok_or_else(|| self.wrong_type("items", "array"))?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                JsonValue::String(s) => Ok(StimulusItem {
                    prompt: s.clone(),
                    image_url: None,
                }),
                JsonValue::Object(_) => serde_json::from_value(item.clone())
                    .map_err(|_| self.wrong_type(&format!("items[{}]", i), "{ prompt }")),
                _ => Err(self.wrong_type(&format!("items[{}]", i), "string | object")),
            })
            .collect()
    }

    /// 题目总数；朗读流利度整段计分，视为 1 项；SEB 问卷按题库题数
    pub fn total_items(&self) -> Result<usize, DataShapeError> {
        match self.module_type {
            ModuleType::OralReading => Ok(1),
            ModuleType::SebScreener => Ok(RAW_CATEGORIES.iter().map(|c| c.questions.len()).sum()),
            ModuleType::SebBrief => Ok(BRIEF_CATEGORIES.len()),
            ModuleType::ItemList => Ok(self.items()?.len()),
        }
    }

    /// 读取朗读段落 `stimulus.passage`
    pub fn passage(&self) -> Result<&str, DataShapeError> {
        self.stimulus
            .get("passage")
            .ok_or_else(|| self.missing("passage"))?
            .as_str()
            .ok_or_else(|| self.wrong_type("passage", "string"))
    }

    /// 读取年级 `stimulus.grade`（用于基准分类，可缺省）
    pub fn grade(&self) -> Option<String> {
        match self.stimulus.get("grade")? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn missing(&self, field: &str) -> DataShapeError {
        DataShapeError::MissingField {
            subtest_id: self.id.clone(),
            field: field.to_string(),
        }
    }

    fn wrong_type(&self, field: &str, expected: &str) -> DataShapeError {
        DataShapeError::WrongType {
            subtest_id: self.id.clone(),
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }
}
