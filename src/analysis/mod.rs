pub mod analyzer;
pub mod supply_chain;

pub use analyzer::{
    AlwaysAffected, Analysis, Analyzer, VersionPredicate, VulnerableDependency,
};
pub use supply_chain::{FallbackPolicy, RiskLevel, TyposquatChecker, TyposquatMatch};
