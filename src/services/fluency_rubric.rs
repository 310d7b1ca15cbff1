//! 流利度评分量表（表现力 / 断句 / 流畅度 / 语速，各 1–4 级）

use crate::error::ValidationError;
use crate::models::FluencyScores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluencyDimension {
    Expression,
    Phrasing,
    Smoothness,
    Pace,
}

impl FluencyDimension {
    pub const ALL: [FluencyDimension; 4] = [
        FluencyDimension::Expression,
        FluencyDimension::Phrasing,
        FluencyDimension::Smoothness,
        FluencyDimension::Pace,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FluencyDimension::Expression => "expression",
            FluencyDimension::Phrasing => "phrasing",
            FluencyDimension::Smoothness => "smoothness",
            FluencyDimension::Pace => "pace",
        }
    }

    /// 各级描述，`level` 为 1–4
    pub fn descriptor(self, level: u8) -> Option<&'static str> {
        let table: [&'static str; 4] = match self {
            FluencyDimension::Expression => [
                "Reads in a quiet, flat voice; words sound like a list",
                "Some expression begins to emerge; voice is often flat",
                "Reads with volume and expression, with occasional lapses",
                "Varies expression and volume to match the text",
            ],
            FluencyDimension::Phrasing => [
                "Monotone with little sense of phrase boundaries; word-by-word",
                "Frequent two- and three-word phrases; choppy reading",
                "Mix of run-ons, mid-sentence pauses, and some choppiness",
                "Generally well phrased, mostly in clause and sentence units",
            ],
            FluencyDimension::Smoothness => [
                "Frequent extended pauses, hesitations, and repetitions",
                "Several rough spots where the reader struggles",
                "Occasional breaks caused by difficult words or structures",
                "Generally smooth with few breaks, resolved quickly",
            ],
            FluencyDimension::Pace => [
                "Slow and laborious",
                "Moderately slow",
                "Uneven mix of fast and slow reading",
                "Consistently conversational pace",
            ],
        };
        level
            .checked_sub(1)
            .and_then(|i| table.get(usize::from(i)))
            .copied()
    }
}

/// 设置某一维度的评分
pub fn set_rating(
    scores: &mut FluencyScores,
    dimension: FluencyDimension,
    rating: u8,
) -> Result<(), ValidationError> {
    if !(1..=4).contains(&rating) {
        return Err(ValidationError::FluencyRatingOutOfRange {
            dimension: dimension.key().to_string(),
            rating,
        });
    }
    let slot = match dimension {
        FluencyDimension::Expression => &mut scores.expression,
        FluencyDimension::Phrasing => &mut scores.phrasing,
        FluencyDimension::Smoothness => &mut scores.smoothness,
        FluencyDimension::Pace => &mut scores.pace,
    };
    *slot = Some(rating);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_levels() {
        for dimension in FluencyDimension::ALL {
            assert!(dimension.descriptor(0).is_none());
            for level in 1..=4 {
                assert!(dimension.descriptor(level).is_some());
            }
            assert!(dimension.descriptor(5).is_none());
        }
    }

    #[test]
    fn test_set_rating_validates_range() {
        let mut scores = FluencyScores::default();
        set_rating(&mut scores, FluencyDimension::Pace, 3).unwrap();
        assert_eq!(scores.pace, Some(3));
        assert!(set_rating(&mut scores, FluencyDimension::Pace, 0).is_err());
        assert!(set_rating(&mut scores, FluencyDimension::Phrasing, 5).is_err());
        assert_eq!(scores.phrasing, None);
    }
}
