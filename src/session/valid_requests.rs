//! The server's advertised request set, collected during negotiation.

use std::collections::HashSet;

use crate::error::Result;
use crate::protocol::ResponseHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidRequests {
    names: HashSet<String>,
}

impl ValidRequests {
    pub fn supports(&self, request: &str) -> bool {
        self.names.contains(request)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    /// Sorted, for display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<String> for ValidRequests {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Handler for the `valid-requests` exchange. Every other response is ignored.
#[derive(Debug, Default)]
pub struct ValidRequestsCollector {
    collected: ValidRequests,
    errors: Vec<String>,
}

impl ValidRequestsCollector {
    pub fn into_valid_requests(self) -> ValidRequests {
        self.collected
    }

    /// `E` lines the server sent during negotiation.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl ResponseHandler for ValidRequestsCollector {
    fn valid_requests(&mut self, requests: &[String]) -> Result<()> {
        self.collected.names.extend(requests.iter().cloned());
        Ok(())
    }

    fn error_message(&mut self, text: &str) -> Result<()> {
        self.errors.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_advertised_names() {
        let mut collector = ValidRequestsCollector::default();
        collector
            .valid_requests(&["Root".to_string(), "Gzip-stream".to_string()])
            .unwrap();
        collector.message("ignored").unwrap();

        let valid = collector.into_valid_requests();
        assert!(valid.supports("Gzip-stream"));
        assert!(!valid.supports("Case"));
        assert_eq!(valid.sorted(), vec!["Gzip-stream", "Root"]);
    }

    #[test]
    fn test_empty_until_advertised() {
        let collector = ValidRequestsCollector::default();
        assert!(collector.into_valid_requests().is_empty());
    }
}
