//! SEB（社会-情绪-行为）筛查题库
//!
//! 完整版：14 个原始类别，每类最多 4 题，部分题目为红旗题；
//! 6 个合并类别，每个由固定的原始类别子集组成。
//! 简版：6 个单题类别，题目 ID 即类别 ID。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SebQuestion {
    pub id: &'static str,
    pub text: &'static str,
    pub red_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SebRawCategory {
    pub id: &'static str,
    pub label: &'static str,
    pub questions: &'static [SebQuestion],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SebCombinedCategory {
    pub id: &'static str,
    pub label: &'static str,
    pub members: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SebBriefCategory {
    pub id: &'static str,
    pub label: &'static str,
    pub text: &'static str,
    /// 评分 ≥ 2 时需要跟进
    pub follow_up_on_elevated: bool,
}

const fn q(id: &'static str, text: &'static str) -> SebQuestion {
    SebQuestion {
        id,
        text,
        red_flag: false,
    }
}

const fn flag(id: &'static str, text: &'static str) -> SebQuestion {
    SebQuestion {
        id,
        text,
        red_flag: true,
    }
}

pub static RAW_CATEGORIES: [SebRawCategory; 14] = [
    SebRawCategory {
        id: "anxiety",
        label: "Anxiety & Worry",
        questions: &[
            q("anx_1", "Worries excessively about everyday events"),
            q("anx_2", "Seems nervous or tense in new situations"),
            q("anx_3", "Complains of fear of separation from caregivers"),
            q("anx_4", "Avoids activities because of fear"),
        ],
    },
    SebRawCategory {
        id: "depression",
        label: "Sadness & Withdrawal",
        questions: &[
            q("dep_1", "Appears sad or unhappy"),
            q("dep_2", "Has lost interest in activities once enjoyed"),
            q("dep_3", "Says negative things about self"),
            flag("dep_4", "Talks about wanting to die or hurt self"),
        ],
    },
    SebRawCategory {
        id: "irritability",
        label: "Irritability",
        questions: &[
            q("irr_1", "Is easily annoyed by others"),
            q("irr_2", "Has frequent angry outbursts"),
            q("irr_3", "Stays in a bad mood for long periods"),
        ],
    },
    SebRawCategory {
        id: "attention",
        label: "Attention",
        questions: &[
            q("att_1", "Has trouble sustaining attention on tasks"),
            q("att_2", "Is easily distracted"),
            q("att_3", "Does not follow through on instructions"),
            q("att_4", "Loses things needed for tasks"),
        ],
    },
    SebRawCategory {
        id: "hyperactivity",
        label: "Hyperactivity & Impulsivity",
        questions: &[
            q("hyp_1", "Fidgets or squirms when seated"),
            q("hyp_2", "Leaves seat when remaining seated is expected"),
            q("hyp_3", "Interrupts or intrudes on others"),
            q("hyp_4", "Acts without thinking about consequences"),
        ],
    },
    SebRawCategory {
        id: "opposition",
        label: "Defiance & Opposition",
        questions: &[
            q("opp_1", "Argues with adults"),
            q("opp_2", "Refuses to follow rules"),
            q("opp_3", "Deliberately annoys others"),
        ],
    },
    SebRawCategory {
        id: "aggression",
        label: "Aggression",
        questions: &[
            q("agg_1", "Hits, kicks, or pushes others"),
            q("agg_2", "Destroys property on purpose"),
            q("agg_3", "Bullies or intimidates peers"),
            flag("agg_4", "Makes serious threats to hurt others"),
        ],
    },
    SebRawCategory {
        id: "peer_relations",
        label: "Peer Relationships",
        questions: &[
            q("peer_1", "Has difficulty making friends"),
            q("peer_2", "Is rejected or left out by peers"),
            q("peer_3", "Prefers to play alone"),
        ],
    },
    SebRawCategory {
        id: "social_communication",
        label: "Social Communication",
        questions: &[
            q("soc_1", "Has difficulty with back-and-forth conversation"),
            q("soc_2", "Makes little eye contact"),
            q("soc_3", "Has trouble understanding others' feelings"),
            q("soc_4", "Uses gestures or facial expressions unusually"),
        ],
    },
    SebRawCategory {
        id: "repetitive",
        label: "Repetitive Behaviors",
        questions: &[
            q("rep_1", "Repeats the same movements over and over"),
            q("rep_2", "Becomes upset by small changes in routine"),
            flag("rep_3", "Engages in repetitive self-injury such as head banging"),
        ],
    },
    SebRawCategory {
        id: "sensory",
        label: "Sensory Sensitivity",
        questions: &[
            q("sen_1", "Over-reacts to sounds, lights, or textures"),
            q("sen_2", "Seeks unusual sensory input"),
            q("sen_3", "Under-reacts to pain or temperature"),
        ],
    },
    SebRawCategory {
        id: "emotional_regulation",
        label: "Emotional Regulation",
        questions: &[
            q("reg_1", "Has difficulty calming down when upset"),
            q("reg_2", "Emotional reactions are out of proportion"),
            q("reg_3", "Has trouble coping with frustration"),
            q("reg_4", "Mood changes quickly"),
        ],
    },
    SebRawCategory {
        id: "somatic",
        label: "Somatic Complaints",
        questions: &[
            q("som_1", "Complains of headaches or stomachaches"),
            q("som_2", "Feels tired without a clear reason"),
            q("som_3", "Asks to see the nurse frequently"),
        ],
    },
    SebRawCategory {
        id: "safety",
        label: "Safety Concerns",
        questions: &[
            flag("saf_1", "Runs away or leaves supervised areas"),
            flag("saf_2", "Engages in dangerous behavior without regard for safety"),
            q("saf_3", "Plays with fire or matches"),
            q("saf_4", "Takes unsafe physical risks"),
        ],
    },
];

pub static COMBINED_CATEGORIES: [SebCombinedCategory; 6] = [
    SebCombinedCategory {
        id: "emotional_wellbeing",
        label: "Emotional Well-being",
        members: &["anxiety", "depression", "irritability", "somatic"],
    },
    SebCombinedCategory {
        id: "attention_activity",
        label: "Attention & Activity",
        members: &["attention", "hyperactivity"],
    },
    SebCombinedCategory {
        id: "behavior_conduct",
        label: "Behavior & Conduct",
        members: &["opposition", "aggression"],
    },
    SebCombinedCategory {
        id: "social_connection",
        label: "Social Connection",
        members: &["peer_relations", "social_communication"],
    },
    SebCombinedCategory {
        id: "sensory_repetitive",
        label: "Sensory & Repetitive",
        members: &["repetitive", "sensory"],
    },
    SebCombinedCategory {
        id: "regulation_safety",
        label: "Regulation & Safety",
        members: &["emotional_regulation", "safety"],
    },
];

pub static BRIEF_CATEGORIES: [SebBriefCategory; 6] = [
    SebBriefCategory {
        id: "emotional_distress",
        label: "Emotional Distress",
        text: "Often seems worried, sad, or irritable",
        follow_up_on_elevated: false,
    },
    SebBriefCategory {
        id: "attention_activity",
        label: "Attention & Activity",
        text: "Has trouble paying attention or sitting still",
        follow_up_on_elevated: false,
    },
    SebBriefCategory {
        id: "conduct",
        label: "Conduct",
        text: "Argues, defies rules, or is aggressive",
        follow_up_on_elevated: false,
    },
    SebBriefCategory {
        id: "social_interaction",
        label: "Social Interaction",
        text: "Has difficulty getting along with peers",
        follow_up_on_elevated: false,
    },
    SebBriefCategory {
        id: "safety_behavior",
        label: "Safety Behavior",
        text: "Behaves in ways that put self or others at risk",
        follow_up_on_elevated: true,
    },
    SebBriefCategory {
        id: "repetitive_unusual",
        label: "Repetitive or Unusual Behavior",
        text: "Shows repetitive movements or unusual interests",
        follow_up_on_elevated: true,
    },
];

/// 按 ID 查找原始类别
pub fn raw_category(id: &str) -> Option<&'static SebRawCategory> {
    RAW_CATEGORIES.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_shape() {
        for category in &RAW_CATEGORIES {
            assert!(!category.questions.is_empty() && category.questions.len() <= 4);
        }
        let ids: HashSet<_> = RAW_CATEGORIES
            .iter()
            .flat_map(|c| c.questions.iter().map(|q| q.id))
            .collect();
        let total: usize = RAW_CATEGORIES.iter().map(|c| c.questions.len()).sum();
        assert_eq!(ids.len(), total, "question ids must be unique");
    }

    #[test]
    fn test_combined_members_cover_every_raw_category_once() {
        let mut seen = Vec::new();
        for combined in &COMBINED_CATEGORIES {
            for member in combined.members {
                assert!(raw_category(member).is_some(), "unknown member {}", member);
                seen.push(*member);
            }
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), RAW_CATEGORIES.len());
    }

    #[test]
    fn test_serious_threats_is_red_flag() {
        let threats = RAW_CATEGORIES
            .iter()
            .flat_map(|c| c.questions.iter())
            .find(|q| q.text == "Makes serious threats to hurt others")
            .unwrap();
        assert!(threats.red_flag);
    }
}
