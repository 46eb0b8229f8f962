// ABOUTME: LogFilter describes history-screen queries: free-text search plus an active person or place.
// ABOUTME: Results are capped at a page size to keep list rendering responsive.

use serde::{Deserialize, Serialize};

use crate::log::Log;

/// Default number of logs returned by a list query.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Filter for listing logs newest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Case-insensitive substring matched against the place and every person.
    pub query: Option<String>,
    /// Only logs whose people include exactly this name.
    pub person: Option<String>,
    /// Only logs at exactly this place.
    pub place: Option<String>,
    /// Maximum number of results; `None` uses the repository's page size.
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn person(name: impl Into<String>) -> Self {
        Self {
            person: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn place(name: impl Into<String>) -> Self {
        Self {
            place: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The search text lowercased, or `None` when absent or blank.
    pub fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether a log's place and people satisfy every condition of this filter.
    pub fn matches(&self, place: &str, people: &[String]) -> bool {
        if let Some(want) = &self.place
            && place != want
        {
            return false;
        }
        if let Some(want) = &self.person
            && !people.iter().any(|p| p == want)
        {
            return false;
        }
        match self.normalized_query() {
            Some(q) => {
                place.to_lowercase().contains(&q)
                    || people.iter().any(|p| p.to_lowercase().contains(&q))
            }
            None => true,
        }
    }

    pub fn matches_log(&self, log: &Log) -> bool {
        self.matches(&log.place, &log.people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(LogFilter::default().matches("Anywhere", &[]));
        assert!(LogFilter::search("   ").matches("Anywhere", &[]));
    }

    #[test]
    fn search_is_case_insensitive_over_place_and_people() {
        let filter = LogFilter::search("RAMEN");
        assert!(filter.matches("Ichiran Ramen", &[]));
        assert!(!filter.matches("Sushi Dai", &people(&["Ken"])));

        let filter = LogFilter::search("yu");
        assert!(filter.matches("Sushi Dai", &people(&["Ken", "Yui"])));
    }

    #[test]
    fn active_person_requires_exact_member() {
        let filter = LogFilter::person("Ken");
        assert!(filter.matches("Sushi Dai", &people(&["Yui", "Ken"])));
        assert!(!filter.matches("Sushi Dai", &people(&["Kenji"])));
    }

    #[test]
    fn conditions_combine() {
        let mut filter = LogFilter::place("Sushi Dai");
        filter.query = Some("yui".to_string());

        assert!(filter.matches("Sushi Dai", &people(&["Yui"])));
        assert!(!filter.matches("Sushi Dai", &people(&["Ken"])));
        assert!(!filter.matches("Other", &people(&["Yui"])));
    }
}
