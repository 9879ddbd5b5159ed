//! Ranking, relevance feedback and the engine facade.

pub mod engine;
pub mod feedback;
pub mod ranker;
pub mod result;

pub use self::engine::{FeedbackSession, FieldReport, SearchEngine, SessionState};
pub use self::feedback::{
    Direction, FeedbackEngine, FeedbackSignal, FeedbackSpec, FeedbackWeights, ReformulatedQuery,
    TermSelector,
};
pub use self::ranker::Ranker;
pub use self::result::{SearchResult, make_snippet};
