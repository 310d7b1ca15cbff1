//! 学生端渲染 - 业务能力层
//!
//! 把 `DisplayFrame` 转换成学生屏幕上显示的内容。纯函数，不做 IO。
//! 刺激材料缺字段或类型不符时降级为占位内容，不向上抛错。

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::models::{ModuleType, PointerPosition, SessionStatus, Subtest};

/// 学生端当前帧
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayFrame {
    /// 尚未选择分测验，或新分测验内容还在加载
    #[default]
    Waiting,
    Showing(ShowingFrame),
    /// 会话已结束
    Ended,
}

/// 正在展示的分测验
#[derive(Debug, Clone, PartialEq)]
pub struct ShowingFrame {
    pub subtest: Arc<Subtest>,
    pub current_item_index: usize,
    pub pointer_position: Option<PointerPosition>,
    pub session_status: SessionStatus,
}

impl DisplayFrame {
    pub fn subtest_id(&self) -> Option<&str> {
        match self {
            DisplayFrame::Showing(frame) => Some(frame.subtest.id.as_str()),
            _ => None,
        }
    }

    pub fn current_item_index(&self) -> Option<usize> {
        match self {
            DisplayFrame::Showing(frame) => Some(frame.current_item_index),
            _ => None,
        }
    }

    pub fn pointer_position(&self) -> Option<PointerPosition> {
        match self {
            DisplayFrame::Showing(frame) => frame.pointer_position,
            _ => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, DisplayFrame::Waiting)
    }
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RenderedView {
    Waiting,
    Item {
        subtest_name: String,
        item_number: usize,
        total_items: usize,
        prompt: String,
        image_url: Option<String>,
        pointer: Option<PointerPosition>,
    },
    Passage {
        subtest_name: String,
        text: String,
        pointer: Option<PointerPosition>,
    },
    /// SEB 问卷由评估者填写，学生端只显示标题
    AssessorOnly { subtest_name: String },
    /// 刺激材料有问题
    Placeholder {
        subtest_name: String,
        reason: String,
    },
    Ended,
}

/// 渲染一帧
pub fn render(frame: &DisplayFrame) -> RenderedView {
    match frame {
        DisplayFrame::Waiting => RenderedView::Waiting,
        DisplayFrame::Ended => RenderedView::Ended,
        DisplayFrame::Showing(showing) => render_showing(showing),
    }
}

fn render_showing(frame: &ShowingFrame) -> RenderedView {
    let subtest = frame.subtest.as_ref();
    let subtest_name = subtest.name.clone();

    match subtest.module_type {
        ModuleType::SebScreener | ModuleType::SebBrief => {
            RenderedView::AssessorOnly { subtest_name }
        }
        ModuleType::OralReading => match subtest.passage() {
            Ok(text) => RenderedView::Passage {
                subtest_name,
                text: text.to_string(),
                pointer: frame.pointer_position,
            },
            Err(e) => placeholder(subtest_name, e.to_string()),
        },
        ModuleType::ItemList => {
            let items = match subtest.items() {
                Ok(items) => items,
                Err(e) => return placeholder(subtest_name, e.to_string()),
            };
            let total_items = items.len();
            match items.into_iter().nth(frame.current_item_index) {
                Some(item) => RenderedView::Item {
                    subtest_name,
                    item_number: frame.current_item_index + 1,
                    total_items,
                    prompt: item.prompt,
                    image_url: item.image_url,
                    pointer: frame.pointer_position,
                },
                None => placeholder(
                    subtest_name,
                    format!("题目 {} 不存在（共 {} 题）", frame.current_item_index + 1, total_items),
                ),
            }
        }
    }
}

fn placeholder(subtest_name: String, reason: String) -> RenderedView {
    warn!("⚠️ 分测验「{}」内容无法显示: {}", subtest_name, reason);
    RenderedView::Placeholder {
        subtest_name,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimingConfig;
    use serde_json::{json, Value as JsonValue};

    fn frame(module_type: ModuleType, stimulus: JsonValue, index: usize) -> DisplayFrame {
        DisplayFrame::Showing(ShowingFrame {
            subtest: Arc::new(Subtest {
                id: "sub-1".to_string(),
                name: "字母命名".to_string(),
                module_type,
                stimulus,
                timing: TimingConfig::default(),
                script_prompt: None,
            }),
            current_item_index: index,
            pointer_position: Some(PointerPosition { x: 0.5, y: 0.25 }),
            session_status: SessionStatus::InProgress,
        })
    }

    #[test]
    fn test_render_item() {
        let view = render(&frame(
            ModuleType::ItemList,
            json!({ "items": ["m", { "prompt": "s", "image_url": "s.png" }] }),
            1,
        ));
        assert_eq!(
            view,
            RenderedView::Item {
                subtest_name: "字母命名".to_string(),
                item_number: 2,
                total_items: 2,
                prompt: "s".to_string(),
                image_url: Some("s.png".to_string()),
                pointer: Some(PointerPosition { x: 0.5, y: 0.25 }),
            }
        );
    }

    #[test]
    fn test_render_passage() {
        let view = render(&frame(
            ModuleType::OralReading,
            json!({ "passage": "The cat sat." }),
            0,
        ));
        assert!(matches!(view, RenderedView::Passage { ref text, .. } if text == "The cat sat."));
    }

    #[test]
    fn test_bad_stimulus_degrades_to_placeholder() {
        let missing = render(&frame(ModuleType::OralReading, json!({}), 0));
        assert!(matches!(missing, RenderedView::Placeholder { .. }));

        let wrong_type = render(&frame(ModuleType::ItemList, json!({ "items": 5 }), 0));
        assert!(matches!(wrong_type, RenderedView::Placeholder { .. }));

        let out_of_range = render(&frame(ModuleType::ItemList, json!({ "items": ["a"] }), 3));
        assert!(matches!(out_of_range, RenderedView::Placeholder { .. }));
    }

    #[test]
    fn test_seb_is_assessor_only() {
        let view = render(&frame(ModuleType::SebBrief, JsonValue::Null, 0));
        assert!(matches!(view, RenderedView::AssessorOnly { .. }));
    }

    #[test]
    fn test_waiting_and_ended() {
        assert_eq!(render(&DisplayFrame::Waiting), RenderedView::Waiting);
        assert_eq!(render(&DisplayFrame::Ended), RenderedView::Ended);
        assert!(DisplayFrame::default().is_waiting());
    }
}
