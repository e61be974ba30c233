//! Full-text search, highlighting, and prefix suggestions

mod highlight;
mod normalize;
mod searcher;

pub use highlight::Highlighter;
pub use normalize::{normalize_query, query_terms};
pub use searcher::{SearchConfig, SearchHit, SearchResult, Searcher};
