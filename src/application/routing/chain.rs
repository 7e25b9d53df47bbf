//! Ordered content finder chain.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::Snapshot;
use crate::domain::content::{ContentId, ContentNode};
use crate::domain::culture::Culture;

use super::domains::DomainMatch;
use super::error::RoutingError;
use super::finders::{ContentFinder, FinderMatch, FinderOutcome, Redirect};
use super::request::PublishedRequest;

pub const METRIC_RESOLVE_TOTAL: &str = "folio_routing_resolve_total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// A regular finder matched.
    Found,
    /// Nothing matched; the last-chance page is shown with a 404.
    NotFoundPage,
    NotFound,
    Redirect(Redirect),
}

impl ResolutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Found => "found",
            ResolutionOutcome::NotFoundPage => "not_found_page",
            ResolutionOutcome::NotFound => "not_found",
            ResolutionOutcome::Redirect(_) => "redirect",
        }
    }
}

/// Result of resolving one request. Built fresh per request.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub outcome: ResolutionOutcome,
    pub content: Option<Arc<ContentNode>>,
    pub template: Option<String>,
    pub culture: Culture,
    pub domain: Option<DomainMatch>,
    /// Finder that produced the outcome.
    pub finder: Option<&'static str>,
    pub snapshot_version: u64,
}

impl ResolutionResult {
    /// Whether content was found by a regular finder.
    pub fn is_final(&self) -> bool {
        self.outcome == ResolutionOutcome::Found
    }

    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            outcome: self.outcome.clone(),
            content_id: self.content.as_ref().map(|node| node.id),
            content_name: self.content.as_ref().map(|node| node.name.clone()),
            content_type: self
                .content
                .as_ref()
                .map(|node| node.content_type.to_string()),
            template: self.template.clone(),
            culture: self.culture.to_string(),
            domain: self.domain.clone(),
            finder: self.finder,
            snapshot_version: self.snapshot_version,
        }
    }
}

/// Serialisable view of a [`ResolutionResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    pub outcome: ResolutionOutcome,
    pub content_id: Option<ContentId>,
    pub content_name: Option<String>,
    pub content_type: Option<String>,
    pub template: Option<String>,
    pub culture: String,
    pub domain: Option<DomainMatch>,
    pub finder: Option<&'static str>,
    pub snapshot_version: u64,
}

pub struct ContentFinderChain {
    finders: Vec<Box<dyn ContentFinder>>,
    last_chance: Option<Box<dyn ContentFinder>>,
}

impl ContentFinderChain {
    pub fn new(
        finders: Vec<Box<dyn ContentFinder>>,
        last_chance: Option<Box<dyn ContentFinder>>,
    ) -> Self {
        Self {
            finders,
            last_chance,
        }
    }

    pub fn finder_names(&self) -> Vec<&'static str> {
        self.finders.iter().map(|finder| finder.name()).collect()
    }

    /// Run finders in order. The first match or redirect wins; if all
    /// decline, the last-chance finder runs.
    pub fn resolve(
        &self,
        request: &PublishedRequest,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RoutingError> {
        for finder in &self.finders {
            if cancel.is_cancelled() {
                return Err(RoutingError::Cancelled);
            }
            match finder.try_find(request, snapshot) {
                FinderOutcome::NoMatch => continue,
                FinderOutcome::Found(found) => {
                    return Ok(self.finish(request, snapshot, finder.name(), ResolutionOutcome::Found, Some(found)));
                }
                FinderOutcome::Redirect(redirect) => {
                    return Ok(self.finish(
                        request,
                        snapshot,
                        finder.name(),
                        ResolutionOutcome::Redirect(redirect),
                        None,
                    ));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }

        if let Some(last_chance) = &self.last_chance {
            match last_chance.try_find(request, snapshot) {
                FinderOutcome::Found(found) => {
                    return Ok(self.finish(
                        request,
                        snapshot,
                        last_chance.name(),
                        ResolutionOutcome::NotFoundPage,
                        Some(found),
                    ));
                }
                FinderOutcome::Redirect(redirect) => {
                    return Ok(self.finish(
                        request,
                        snapshot,
                        last_chance.name(),
                        ResolutionOutcome::Redirect(redirect),
                        None,
                    ));
                }
                FinderOutcome::NoMatch => {}
            }
        }

        Ok(self.finish(request, snapshot, "none", ResolutionOutcome::NotFound, None))
    }

    fn finish(
        &self,
        request: &PublishedRequest,
        snapshot: &Snapshot,
        finder: &'static str,
        outcome: ResolutionOutcome,
        found: Option<FinderMatch>,
    ) -> ResolutionResult {
        let (content, finder_template) = match found {
            Some(found) => (Some(found.content), found.template),
            None => (None, None),
        };
        let template = finder_template
            .or_else(|| request.alt_template().map(str::to_string))
            .or_else(|| content.as_ref().and_then(|node| node.template.clone()));

        counter!(METRIC_RESOLVE_TOTAL, "outcome" => outcome.label()).increment(1);
        debug!(
            path = request.path(),
            host = request.host(),
            culture = %request.culture(),
            finder,
            outcome = outcome.label(),
            content_id = content.as_ref().map(|node| node.id.0),
            snapshot_version = snapshot.version(),
            "Request resolved"
        );

        ResolutionResult {
            outcome,
            content,
            template,
            culture: request.culture().clone(),
            domain: request.domain().cloned(),
            finder: (finder != "none").then_some(finder),
            snapshot_version: snapshot.version(),
        }
    }
}
