//! Query execution core: planning, segmentation, scoring, selection and
//! boolean composition

pub mod combiner;
pub mod context;
pub mod executor;
pub mod planner;
pub mod scorer;
pub mod segmenter;
pub mod topk;
pub mod types;

pub use context::{CancellationToken, DeletionFilter, DocIdMap, QueryContext};
pub use executor::{QueryOutput, SearchExecutor, SearchQuery};
pub use planner::{QueryPlan, QueryPlanner, TermEntry};
pub use topk::RadixTopK;
pub use types::{QueryFlags, QueryStats, QueryWord, ResultSet, ScoredDoc, SCORE_SATURATION};
