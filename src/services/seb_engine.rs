//! SEB 风险计分引擎 - 业务能力层
//!
//! 纯函数：输入评分表（question_id → 0..=3），输出分类与总体风险，不修改输入。
//!
//! ## 完整版
//! 1. 原始类别：均分分档，红旗题只上调（≥3 → critical，=2 → 至少 high）
//! 2. 合并类别：成员均分的均值分档，与成员最高风险取大
//! 3. 总体：合并类别最高风险 → 广度升级（≥2 个 high+ 或 ≥3 个非 low，升一档）
//!    → 安全覆盖（任一红旗 ≥2 至少 high，≥3 为 critical）
//!
//! ## 简版
//! 单题类别直接查表，总体取最大，不做广度升级。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::models::seb_catalog::{
    raw_category, SebRawCategory, BRIEF_CATEGORIES, COMBINED_CATEGORIES, RAW_CATEGORIES,
};

/// 评分表
pub type RatingMap = HashMap<String, u8>;

pub const MAX_RATING: u8 = 3;

/// 风险等级，全序 low < moderate < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    const BY_RATING: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// 均分分档：[0,0.5) low，[0.5,1.25) moderate，[1.25,2.25) high，[2.25,3] critical
    pub fn from_mean(mean: f64) -> Self {
        if mean >= 2.25 {
            RiskLevel::Critical
        } else if mean >= 1.25 {
            RiskLevel::High
        } else if mean >= 0.5 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// 简版单题查表
    pub fn from_rating(rating: u8) -> Self {
        Self::BY_RATING[usize::from(rating.min(MAX_RATING))]
    }

    /// 上调一档，封顶 critical
    pub fn escalated(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Moderate,
            RiskLevel::Moderate => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }

    pub fn is_elevated(self) -> bool {
        self >= RiskLevel::High
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// 红旗评分对应的下限
fn red_flag_floor(rating: u8) -> Option<RiskLevel> {
    match rating {
        r if r >= 3 => Some(RiskLevel::Critical),
        2 => Some(RiskLevel::High),
        _ => None,
    }
}

/// 原始类别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SebScoreResult {
    pub category_id: String,
    pub label: String,
    pub mean_score: f64,
    pub answered_count: usize,
    pub banded_risk: RiskLevel,
    pub risk_level: RiskLevel,
    pub red_flag_triggered: bool,
    pub red_flag_items: Vec<String>,
}

/// 合并类别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SebCategoryResult {
    pub category_id: String,
    pub label: String,
    pub mean_score: f64,
    pub risk_level: RiskLevel,
    pub members: Vec<SebScoreResult>,
}

/// 完整版总体结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SebOverallResult {
    pub overall_risk: RiskLevel,
    pub base_risk: RiskLevel,
    pub breadth_escalated: bool,
    pub safety_override_applied: bool,
    pub red_flag_triggered: bool,
    pub red_flag_items: Vec<String>,
    pub categories: Vec<SebCategoryResult>,
}

impl SebOverallResult {
    pub fn raw_category(&self, id: &str) -> Option<&SebScoreResult> {
        self.categories
            .iter()
            .flat_map(|c| c.members.iter())
            .find(|m| m.category_id == id)
    }

    pub fn combined_category(&self, id: &str) -> Option<&SebCategoryResult> {
        self.categories.iter().find(|c| c.category_id == id)
    }
}

/// 读取评分，超过 3 的按 3 处理
fn rating_of(ratings: &RatingMap, question_id: &str) -> Option<u8> {
    ratings.get(question_id).map(|&r| r.min(MAX_RATING))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// 检查评分表：未知题目不报错，只拦截超出范围的评分
pub fn validate_ratings(ratings: &RatingMap) -> Result<(), ValidationError> {
    let mut out_of_range: Vec<_> = ratings.iter().filter(|(_, &r)| r > MAX_RATING).collect();
    out_of_range.sort();
    match out_of_range.first() {
        Some((id, &rating)) => Err(ValidationError::RatingOutOfRange {
            question_id: (*id).clone(),
            rating,
        }),
        None => Ok(()),
    }
}

/// 计算单个原始类别
pub fn score_raw_category(category: &SebRawCategory, ratings: &RatingMap) -> SebScoreResult {
    let mut present = Vec::new();
    let mut risk_floor = RiskLevel::Low;
    let mut red_flag_items = Vec::new();

    for question in category.questions {
        let Some(rating) = rating_of(ratings, question.id) else {
            continue;
        };
        present.push(f64::from(rating));
        if question.red_flag {
            if let Some(floor) = red_flag_floor(rating) {
                risk_floor = risk_floor.max(floor);
                red_flag_items.push(question.text.to_string());
            }
        }
    }

    let mean_score = mean(&present);
    let banded_risk = RiskLevel::from_mean(mean_score);
    SebScoreResult {
        category_id: category.id.to_string(),
        label: category.label.to_string(),
        mean_score,
        answered_count: present.len(),
        banded_risk,
        risk_level: banded_risk.max(risk_floor),
        red_flag_triggered: !red_flag_items.is_empty(),
        red_flag_items,
    }
}

/// 完整版筛查计分
pub fn score_full_screener(ratings: &RatingMap) -> SebOverallResult {
    let categories: Vec<SebCategoryResult> = COMBINED_CATEGORIES
        .iter()
        .map(|combined| {
            let members: Vec<SebScoreResult> = combined
                .members
                .iter()
                .filter_map(|id| raw_category(id))
                .map(|category| score_raw_category(category, ratings))
                .collect();
            let mean_score = mean(&members.iter().map(|m| m.mean_score).collect::<Vec<_>>());
            let member_max = members
                .iter()
                .map(|m| m.risk_level)
                .max()
                .unwrap_or(RiskLevel::Low);
            SebCategoryResult {
                category_id: combined.id.to_string(),
                label: combined.label.to_string(),
                mean_score,
                risk_level: RiskLevel::from_mean(mean_score).max(member_max),
                members,
            }
        })
        .collect();

    let base_risk = categories
        .iter()
        .map(|c| c.risk_level)
        .max()
        .unwrap_or(RiskLevel::Low);

    let elevated = categories.iter().filter(|c| c.risk_level.is_elevated()).count();
    let non_low = categories
        .iter()
        .filter(|c| c.risk_level > RiskLevel::Low)
        .count();
    let breadth_escalated = elevated >= 2 || non_low >= 3;
    let mut overall_risk = if breadth_escalated {
        base_risk.escalated()
    } else {
        base_risk
    };

    // 安全覆盖在广度升级之后执行
    let mut red_flag_items = Vec::new();
    let mut safety_floor = RiskLevel::Low;
    for category in &RAW_CATEGORIES {
        for question in category.questions.iter().filter(|q| q.red_flag) {
            if let Some(floor) = rating_of(ratings, question.id).and_then(red_flag_floor) {
                safety_floor = safety_floor.max(floor);
                red_flag_items.push(question.text.to_string());
            }
        }
    }
    let safety_override_applied = safety_floor > overall_risk;
    overall_risk = overall_risk.max(safety_floor);

    debug!(
        "SEB 完整版: base={} breadth={} safety={} overall={}",
        base_risk, breadth_escalated, safety_override_applied, overall_risk
    );

    SebOverallResult {
        overall_risk,
        base_risk,
        breadth_escalated,
        safety_override_applied,
        red_flag_triggered: !red_flag_items.is_empty(),
        red_flag_items,
        categories,
    }
}

/// 简版类别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefCategoryResult {
    pub category_id: String,
    pub label: String,
    pub rating: Option<u8>,
    pub risk_level: RiskLevel,
}

/// 简版总体结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefSebResult {
    pub overall_risk: RiskLevel,
    pub categories: Vec<BriefCategoryResult>,
    pub requires_follow_up: Vec<String>,
}

impl BriefSebResult {
    pub fn category(&self, id: &str) -> Option<&BriefCategoryResult> {
        self.categories.iter().find(|c| c.category_id == id)
    }
}

/// 简版筛查计分
pub fn score_brief_screener(ratings: &RatingMap) -> BriefSebResult {
    let mut requires_follow_up = Vec::new();
    let categories: Vec<BriefCategoryResult> = BRIEF_CATEGORIES
        .iter()
        .map(|category| {
            let rating = rating_of(ratings, category.id);
            let value = rating.unwrap_or(0);
            if category.follow_up_on_elevated && value >= 2 {
                requires_follow_up.push(category.id.to_string());
            }
            BriefCategoryResult {
                category_id: category.id.to_string(),
                label: category.label.to_string(),
                rating,
                risk_level: RiskLevel::from_rating(value),
            }
        })
        .collect();

    let overall_risk = categories
        .iter()
        .map(|c| c.risk_level)
        .max()
        .unwrap_or(RiskLevel::Low);

    BriefSebResult {
        overall_risk,
        categories,
        requires_follow_up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seb_catalog::raw_category;

    fn all_zero() -> RatingMap {
        RAW_CATEGORIES
            .iter()
            .flat_map(|c| c.questions.iter())
            .map(|q| (q.id.to_string(), 0))
            .collect()
    }

    fn ratings(pairs: &[(&str, u8)]) -> RatingMap {
        let mut map = all_zero();
        for (id, r) in pairs {
            map.insert(id.to_string(), *r);
        }
        map
    }

    #[test]
    fn test_banding_boundaries() {
        assert_eq!(RiskLevel::from_mean(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_mean(0.49), RiskLevel::Low);
        assert_eq!(RiskLevel::from_mean(0.5), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_mean(1.25), RiskLevel::High);
        assert_eq!(RiskLevel::from_mean(2.24), RiskLevel::High);
        assert_eq!(RiskLevel::from_mean(2.25), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_mean(3.0), RiskLevel::Critical);
    }

    #[test]
    fn test_serious_threat_forces_critical() {
        let input = ratings(&[("agg_4", 3)]);
        let before = input.clone();
        let result = score_full_screener(&input);
        assert_eq!(input, before, "engine must not mutate input");

        let aggression = result.raw_category("aggression").unwrap();
        assert_eq!(aggression.banded_risk, RiskLevel::Moderate);
        assert_eq!(aggression.risk_level, RiskLevel::Critical);
        assert_eq!(result.overall_risk, RiskLevel::Critical);
        assert!(result.red_flag_triggered);
        assert!(result
            .red_flag_items
            .contains(&"Makes serious threats to hurt others".to_string()));
    }

    #[test]
    fn test_red_flag_two_raises_to_high_only() {
        let result = score_full_screener(&ratings(&[("dep_4", 2)]));
        let depression = result.raw_category("depression").unwrap();
        assert_eq!(depression.risk_level, RiskLevel::High);
        assert_eq!(result.overall_risk, RiskLevel::High);
    }

    #[test]
    fn test_override_never_lowers() {
        // 均分已经是 critical，红旗 = 2 不会把它拉回 high
        let result = score_full_screener(&ratings(&[
            ("saf_1", 2),
            ("saf_2", 3),
            ("saf_3", 3),
            ("saf_4", 3),
        ]));
        assert_eq!(
            result.raw_category("safety").unwrap().risk_level,
            RiskLevel::Critical
        );
    }

    #[test]
    fn test_empty_map_is_low() {
        let result = score_full_screener(&RatingMap::new());
        assert_eq!(result.overall_risk, RiskLevel::Low);
        assert!(result.categories.iter().all(|c| c.mean_score == 0.0));
        assert!(!result.red_flag_triggered);
    }

    #[test]
    fn test_combined_takes_member_max() {
        // anxiety 均分 3 → critical；合并均分 = 3/4 = 0.75 → moderate，但取成员最高
        let result = score_full_screener(&ratings(&[
            ("anx_1", 3),
            ("anx_2", 3),
            ("anx_3", 3),
            ("anx_4", 3),
        ]));
        let combined = result.combined_category("emotional_wellbeing").unwrap();
        assert!((combined.mean_score - 0.75).abs() < 1e-9);
        assert_eq!(combined.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_breadth_escalation_by_two_elevated() {
        // 两个合并类别为 high → 总体 high 升为 critical
        let result = score_full_screener(&ratings(&[
            ("att_1", 2),
            ("att_2", 2),
            ("att_3", 2),
            ("att_4", 2),
            ("peer_1", 2),
            ("peer_2", 2),
            ("peer_3", 2),
        ]));
        assert_eq!(result.base_risk, RiskLevel::High);
        assert!(result.breadth_escalated);
        assert_eq!(result.overall_risk, RiskLevel::Critical);
    }

    #[test]
    fn test_breadth_escalation_by_three_non_low() {
        let result = score_full_screener(&ratings(&[
            ("att_1", 1),
            ("att_2", 1),
            ("att_3", 1),
            ("att_4", 1),
            ("peer_1", 1),
            ("peer_2", 1),
            ("peer_3", 1),
            ("sen_1", 1),
            ("sen_2", 1),
            ("sen_3", 1),
        ]));
        assert_eq!(result.base_risk, RiskLevel::Moderate);
        assert!(result.breadth_escalated);
        assert_eq!(result.overall_risk, RiskLevel::High);
    }

    #[test]
    fn test_single_moderate_area_is_not_escalated() {
        let result = score_full_screener(&ratings(&[("opp_1", 1), ("opp_2", 1), ("opp_3", 1)]));
        assert_eq!(result.overall_risk, RiskLevel::Moderate);
        assert!(!result.breadth_escalated);
    }

    #[test]
    fn test_out_of_range_rating_is_clamped_and_reported() {
        let input = ratings(&[("agg_4", 9)]);
        assert!(validate_ratings(&input).is_err());
        assert_eq!(score_full_screener(&input).overall_risk, RiskLevel::Critical);
        assert!(validate_ratings(&all_zero()).is_ok());
    }

    #[test]
    fn test_overall_monotonic_in_each_rating() {
        let question_ids: Vec<&str> = RAW_CATEGORIES
            .iter()
            .flat_map(|c| c.questions.iter().map(|q| q.id))
            .collect();
        // 几组不同的背景评分
        let backgrounds = [
            all_zero(),
            ratings(&[("att_1", 1), ("att_2", 1), ("peer_1", 1)]),
            ratings(&[("anx_1", 2), ("opp_2", 1), ("sen_1", 1), ("reg_3", 1)]),
            ratings(&[("hyp_1", 2), ("hyp_2", 2), ("soc_1", 1)]),
        ];
        for background in &backgrounds {
            for id in &question_ids {
                let mut previous = RiskLevel::Low;
                for rating in 0..=MAX_RATING {
                    let mut input = background.clone();
                    input.insert(id.to_string(), rating);
                    let risk = score_full_screener(&input).overall_risk;
                    assert!(risk >= previous, "{} at {} lowered risk", id, rating);
                    previous = risk;
                }
            }
        }
    }

    #[test]
    fn test_raw_category_mean_uses_present_ratings_only() {
        let category = raw_category("irritability").unwrap();
        let mut input = RatingMap::new();
        input.insert("irr_1".to_string(), 2);
        let result = score_raw_category(category, &input);
        assert_eq!(result.answered_count, 1);
        assert_eq!(result.mean_score, 2.0);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_brief_safety_behavior_two() {
        let mut input: RatingMap = BRIEF_CATEGORIES
            .iter()
            .map(|c| (c.id.to_string(), 0))
            .collect();
        input.insert("safety_behavior".to_string(), 2);

        let result = score_brief_screener(&input);
        assert_eq!(
            result.category("safety_behavior").unwrap().risk_level,
            RiskLevel::High
        );
        assert_eq!(result.overall_risk, RiskLevel::High);
        assert_eq!(result.requires_follow_up, vec!["safety_behavior".to_string()]);
    }

    #[test]
    fn test_brief_has_no_breadth_escalation() {
        let input: RatingMap = BRIEF_CATEGORIES
            .iter()
            .map(|c| (c.id.to_string(), 1))
            .collect();
        let result = score_brief_screener(&input);
        assert_eq!(result.overall_risk, RiskLevel::Moderate);
        assert!(result.requires_follow_up.is_empty());
    }

    #[test]
    fn test_brief_follow_up_only_for_flagged_categories() {
        let mut input = RatingMap::new();
        input.insert("conduct".to_string(), 3);
        input.insert("repetitive_unusual".to_string(), 3);
        let result = score_brief_screener(&input);
        assert_eq!(result.overall_risk, RiskLevel::Critical);
        assert_eq!(
            result.requires_follow_up,
            vec!["repetitive_unusual".to_string()]
        );
    }
}
