pub mod answer;
pub mod source;

pub use answer::{CachedAnswer, CachedAnswerResult, SourceMetadata};
pub use source::{ScrapedContent, ScrapedSource};
