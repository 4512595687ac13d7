//! Supply chain analysis: typosquat detection against popular gems.
//!
//! Each dependency name is compared with a corpus of heavily downloaded
//! gems using normalized Levenshtein similarity. Near misses above
//! [`SIMILARITY_THRESHOLD`] are reported with a risk bucket.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::adapter::{BuiltinPopularity, PopularGem, PopularitySource};
use crate::ir::Dependency;

pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// How long a fetched popularity corpus stays valid.
pub const POPULAR_GEMS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Well-known gems used when no popularity data can be fetched.
const BUILTIN_POPULAR_GEMS: &[(&str, u64)] = &[
    ("rails", 100_000_000),
    ("bundler", 90_000_000),
    ("rake", 80_000_000),
    ("json", 70_000_000),
    ("minitest", 60_000_000),
    ("thread_safe", 50_000_000),
    ("tzinfo", 45_000_000),
    ("concurrent-ruby", 40_000_000),
    ("i18n", 35_000_000),
    ("activesupport", 30_000_000),
    ("activerecord", 25_000_000),
    ("actionpack", 20_000_000),
    ("actionview", 18_000_000),
    ("activemodel", 15_000_000),
    ("rspec", 12_000_000),
    ("puma", 10_000_000),
    ("nokogiri", 8_000_000),
    ("thor", 7_000_000),
    ("sass", 6_000_000),
    ("devise", 5_000_000),
];

pub fn builtin_popular_gems() -> Vec<PopularGem> {
    BUILTIN_POPULAR_GEMS
        .iter()
        .map(|&(name, downloads)| PopularGem {
            name: name.to_string(),
            downloads,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a similarity score; each bucket includes its lower bound.
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 0.95 {
            Self::Critical
        } else if similarity >= 0.90 {
            Self::High
        } else if similarity >= 0.85 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A dependency whose name closely resembles a popular gem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyposquatMatch {
    pub gem_name: String,
    pub version: String,
    pub suspected_target: String,
    /// In `[SIMILARITY_THRESHOLD, 1.0]`.
    pub similarity_score: f64,
    pub target_downloads: u64,
    pub risk_level: RiskLevel,
}

/// What to do when the popularity source cannot be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Fall back to the built-in corpus without operator-visible output.
    #[default]
    Silent,
    /// Fall back and emit a warning.
    Logged,
}

#[derive(Debug)]
struct PopularCache {
    gems: Vec<PopularGem>,
    fetched_at: Instant,
}

pub struct TyposquatChecker {
    source: Box<dyn PopularitySource>,
    cache: Option<PopularCache>,
    ttl: Duration,
    fallback: FallbackPolicy,
}

impl TyposquatChecker {
    pub fn new(source: Box<dyn PopularitySource>) -> Self {
        Self {
            source,
            cache: None,
            ttl: POPULAR_GEMS_CACHE_TTL,
            fallback: FallbackPolicy::Silent,
        }
    }

    /// Checker backed by the built-in corpus only.
    pub fn offline() -> Self {
        Self::new(Box::new(BuiltinPopularity))
    }

    pub fn with_fallback_policy(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn check_dependencies(&mut self, dependencies: &[Dependency]) -> Vec<TyposquatMatch> {
        self.check_dependencies_at(dependencies, Instant::now())
    }

    fn check_dependencies_at(
        &mut self,
        dependencies: &[Dependency],
        now: Instant,
    ) -> Vec<TyposquatMatch> {
        let popular = self.popular_gems(now);

        dependencies
            .iter()
            .filter_map(|dep| {
                find_suspicious_match(&dep.name, &popular).map(|(target, similarity)| {
                    TyposquatMatch {
                        gem_name: dep.name.clone(),
                        version: dep.version.clone(),
                        suspected_target: target.name.clone(),
                        similarity_score: similarity,
                        target_downloads: target.downloads,
                        risk_level: RiskLevel::from_similarity(similarity),
                    }
                })
            })
            .collect()
    }

    fn cache_valid(&self, now: Instant) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| now.saturating_duration_since(c.fetched_at) < self.ttl)
    }

    fn popular_gems(&mut self, now: Instant) -> Cow<'_, [PopularGem]> {
        if !self.cache_valid(now) {
            match self.source.fetch_popular_gems() {
                Ok(gems) if !gems.is_empty() => {
                    tracing::debug!(count = gems.len(), "refreshed popular gem corpus");
                    self.cache = Some(PopularCache {
                        gems,
                        fetched_at: now,
                    });
                }
                Ok(_) => {
                    self.report_fallback("popularity source returned no gems");
                    return Cow::Owned(builtin_popular_gems());
                }
                Err(e) => {
                    self.report_fallback(&e.to_string());
                    return Cow::Owned(builtin_popular_gems());
                }
            }
        }

        match &self.cache {
            Some(cache) => Cow::Borrowed(&cache.gems),
            None => Cow::Owned(builtin_popular_gems()),
        }
    }

    fn report_fallback(&self, reason: &str) {
        match self.fallback {
            FallbackPolicy::Silent => {
                tracing::debug!(reason, "using built-in popular gem corpus");
            }
            FallbackPolicy::Logged => {
                tracing::warn!(reason, "popular gem refresh failed, using built-in corpus");
            }
        }
    }
}

/// Best match at or above the threshold. Exact corpus names are never flagged.
fn find_suspicious_match<'a>(
    name: &str,
    popular: &'a [PopularGem],
) -> Option<(&'a PopularGem, f64)> {
    if popular.iter().any(|p| p.name == name) {
        return None;
    }

    let mut best: Option<(&PopularGem, f64)> = None;
    let mut highest = 0.0;

    for gem in popular {
        let score = similarity(name, &gem.name);
        // Strictly greater: ties keep the first-seen entry.
        if score >= SIMILARITY_THRESHOLD && score > highest {
            highest = score;
            best = Some((gem, score));
        }
    }

    best
}

/// Case-insensitive normalized Levenshtein similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein::levenshtein(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}
