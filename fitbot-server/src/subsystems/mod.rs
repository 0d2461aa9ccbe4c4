pub mod answer_cache;
pub mod escalation;
pub mod maintenance;
pub mod source_cache;
pub mod stats;
