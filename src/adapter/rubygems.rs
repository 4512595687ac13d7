//! Remote popular-gem corpus.

use std::time::Duration;

use super::{make_agent, transport_error, PopularGem, PopularitySource};
use crate::error::{GuardError, Result};

/// Fetches `[{"name": .., "downloads": ..}]` from a configured endpoint.
pub struct RemotePopularity {
    agent: ureq::Agent,
    url: String,
}

impl RemotePopularity {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: make_agent(timeout),
            url: url.into(),
        }
    }
}

impl PopularitySource for RemotePopularity {
    fn fetch_popular_gems(&self) -> Result<Vec<PopularGem>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| transport_error(&self.url, e))?;
        let body = response.into_string()?;
        parse_popular_gems(&body)
    }
}

fn parse_popular_gems(body: &str) -> Result<Vec<PopularGem>> {
    let gems: Vec<PopularGem> = serde_json::from_str(body)
        .map_err(|e| GuardError::Advisory(format!("malformed popular gem payload: {}", e)))?;
    Ok(gems)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payload() {
        let gems =
            parse_popular_gems(r#"[{"name":"rails","downloads":100},{"name":"rake","downloads":80}]"#)
                .unwrap();
        assert_eq!(gems.len(), 2);
        assert_eq!(gems[1].name, "rake");
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_popular_gems("invalid json").is_err());
        assert!(parse_popular_gems("Server Error").is_err());
    }
}
