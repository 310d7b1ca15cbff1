pub mod benchmark;
pub mod loaders;
pub mod passage;
pub mod response;
pub mod seb_catalog;
pub mod session;
pub mod subtest;

pub use benchmark::{BenchmarkStatus, GradeBenchmark};
pub use loaders::{load_all_subtests, load_subtest};
pub use passage::{FluencyScores, OrfMetrics, PassageAssessmentResult, WordMark, WordStatus};
pub use response::{
    CompletionReason, NewResponse, ResponseRecord, ScoreCode, ScoredResponse, SessionSummary,
};
pub use session::{
    PointerPosition, Session, SessionPatch, SessionState, SessionStatePatch, SessionStatus,
    ValidityStatus,
};
pub use subtest::{ModuleType, StimulusItem, Subtest, TimingConfig};
