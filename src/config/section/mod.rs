mod cache;
mod rule;

pub use cache::CacheConfig;
pub use rule::{
    CompressEntry, DEFAULT_COMPRESS, OneOrMany, RuleKind, RuleSpec, build_rule, default_conversions,
};
