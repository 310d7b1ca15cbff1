pub mod display_renderer;
pub mod fluency_rubric;
pub mod orf_scorer;
pub mod orf_timer;
pub mod seb_engine;

pub use display_renderer::{render, DisplayFrame, RenderedView, ShowingFrame};
pub use fluency_rubric::FluencyDimension;
pub use orf_scorer::OrfScorer;
pub use orf_timer::{OrfTimer, TimerEvent};
pub use seb_engine::{
    score_brief_screener, score_full_screener, validate_ratings, BriefSebResult, RiskLevel,
    SebOverallResult,
};
