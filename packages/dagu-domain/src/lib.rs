pub mod catalog;
pub mod filter;
pub mod lexicon;
pub mod listing;
pub mod matcher;
pub mod normalize;
pub mod text;

pub use catalog::{CatalogEntry, Category, UNKNOWN_BRAND};
pub use filter::{
	ExternalResultItem, FilterCascade, FilterContext, FilterStats, NormalizedRecord, RejectReason,
	Verdict,
};
pub use lexicon::{Lexicon, LexiconError, LexiconHandle};
pub use listing::{ReportReason, Source};
pub use matcher::{MatchResult, Matcher, PreparedQuery};
