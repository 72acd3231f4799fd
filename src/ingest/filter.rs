use crate::api::models::SearchFilter;
use crate::config::Settings;

/// Subject filters and capture mode shared by the backfill search and the
/// download worker's match predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    subject_filters: Vec<String>,
    body_capture: bool,
}

impl MessageFilter {
    pub fn new(subject_filters: Vec<String>, body_capture: bool) -> Self {
        let subject_filters = subject_filters
            .into_iter()
            .map(|phrase| phrase.trim().to_string())
            .filter(|phrase| !phrase.is_empty())
            .collect();

        Self {
            subject_filters,
            body_capture,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.subject_filters(), settings.body_capture)
    }

    pub fn body_capture(&self) -> bool {
        self.body_capture
    }

    /// With body capture on and no subject filters the search matches nothing.
    pub fn search_filter(&self) -> SearchFilter {
        if self.body_capture && self.subject_filters.is_empty() {
            return SearchFilter::MatchNothing;
        }

        SearchFilter::Criteria {
            has_attachments: !self.body_capture,
            subject_contains_any: self.subject_filters.clone(),
        }
    }

    pub fn matches(&self, subject: &str, attachment_count: usize) -> bool {
        (attachment_count > 0 || self.body_capture) && self.subject_matches(subject)
    }

    pub fn subject_matches(&self, subject: &str) -> bool {
        if self.subject_filters.is_empty() {
            return true;
        }

        let subject = subject.to_lowercase();
        self.subject_filters
            .iter()
            .any(|phrase| subject.contains(&phrase.to_lowercase()))
    }
}
