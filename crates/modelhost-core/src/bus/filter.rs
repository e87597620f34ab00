// crates/modelhost-core/src/bus/filter.rs
// ============================================================================
// Module: Event Filters
// Description: Composable subscription filters over (type, domain).
// Purpose: Keep filter evaluation allocation-free on the dispatch hot path.
// Dependencies: crate::core::event, serde
// ============================================================================

//! ## Overview
//! Filters are carried as data, not closures: a small tagged variant
//! evaluated by pattern match. A subscription's filter list composes by AND;
//! an empty list accepts every event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::Event;

// ============================================================================
// SECTION: Filter Variants
// ============================================================================

/// Subscription filter over an event's type and domain.
///
/// # Invariants
/// - Evaluation never allocates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    /// Exact event type match.
    ByType(String),
    /// Exact domain match.
    ByDomain(String),
    /// Any of the listed event types.
    OneOfTypes(BTreeSet<String>),
    /// Any of the listed domains.
    OneOfDomains(BTreeSet<String>),
    /// Every inner filter must accept.
    All(Vec<EventFilter>),
}

impl EventFilter {
    /// Builds an exact-type filter.
    #[must_use]
    pub fn by_type(event_type: impl Into<String>) -> Self {
        Self::ByType(event_type.into())
    }

    /// Builds an exact-domain filter.
    #[must_use]
    pub fn by_domain(domain: impl Into<String>) -> Self {
        Self::ByDomain(domain.into())
    }

    /// Builds a one-of-types filter.
    #[must_use]
    pub fn one_of_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOfTypes(types.into_iter().map(Into::into).collect())
    }

    /// Builds a one-of-domains filter.
    #[must_use]
    pub fn one_of_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOfDomains(domains.into_iter().map(Into::into).collect())
    }

    /// Returns true when the filter accepts the event.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::ByType(event_type) => *event_type == event.event_type,
            Self::ByDomain(domain) => *domain == event.domain,
            Self::OneOfTypes(types) => types.contains(&event.event_type),
            Self::OneOfDomains(domains) => domains.contains(&event.domain),
            Self::All(filters) => filters.iter().all(|filter| filter.matches(event)),
        }
    }
}

/// Returns true when every filter in the list accepts the event.
///
/// An empty list accepts everything.
#[must_use]
pub fn all_match(filters: &[EventFilter], event: &Event) -> bool {
    filters.iter().all(|filter| filter.matches(event))
}
