//! Routing service and the per-request routing context.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::cache::{FacadeService, Snapshot};
use crate::domain::content::{ContentId, ContentNode};
use crate::domain::culture::Culture;

use super::chain::{ContentFinderChain, ResolutionResult};
use super::config::{FinderKind, RoutingConfig, UrlProviderKind};
use super::domains::DomainMap;
use super::error::RoutingError;
use super::finders::{
    ContentFinder, IdPathFinder, NotFoundPageFinder, Redirect, RedirectFinder,
    RouteAndTemplateFinder, RouteFinder, UrlAliasFinder,
};
use super::request::PublishedRequest;
use super::urls::{AliasUrlProvider, DefaultUrlProvider, UrlContext, UrlMode, UrlProvider, UrlProviderChain};

/// Shared routing state: configured chains, domain bindings and the facade.
pub struct RoutingService {
    facade: Arc<FacadeService>,
    finders: ContentFinderChain,
    urls: UrlProviderChain,
    domains: DomainMap,
    url_mode: UrlMode,
    add_trailing_slash: bool,
    alternative_templates: bool,
}

impl RoutingService {
    pub fn new(config: RoutingConfig, facade: Arc<FacadeService>) -> Self {
        let alternative_templates = !config.disable_alternative_templates;

        let finders = config
            .finders
            .iter()
            .filter(|kind| alternative_templates || **kind != FinderKind::RouteAndTemplate)
            .map(|kind| -> Box<dyn ContentFinder> {
                match kind {
                    FinderKind::Route => Box::new(RouteFinder),
                    FinderKind::RouteAndTemplate => {
                        Box::new(RouteAndTemplateFinder::new(config.templates.iter().cloned()))
                    }
                    FinderKind::IdPath => Box::new(IdPathFinder),
                    FinderKind::UrlAlias => Box::new(UrlAliasFinder),
                    FinderKind::Redirect => Box::new(RedirectFinder::new(config.redirects.iter().map(
                        |rule| {
                            (
                                rule.from.clone(),
                                Redirect {
                                    location: rule.to.clone(),
                                    permanent: rule.permanent,
                                },
                            )
                        },
                    ))),
                }
            })
            .collect();
        let last_chance: Box<dyn ContentFinder> =
            Box::new(NotFoundPageFinder::new(config.not_found_content_id));

        let providers = config
            .url_providers
            .iter()
            .map(|kind| -> Box<dyn UrlProvider> {
                match kind {
                    UrlProviderKind::Default => Box::new(DefaultUrlProvider),
                    UrlProviderKind::Alias => Box::new(AliasUrlProvider),
                }
            })
            .collect();

        let finders = ContentFinderChain::new(finders, Some(last_chance));
        let urls = UrlProviderChain::new(providers);
        debug!(
            finders = ?finders.finder_names(),
            url_providers = ?urls.provider_names(),
            domains = config.domains.len(),
            "Routing service configured"
        );

        Self {
            facade,
            finders,
            urls,
            domains: DomainMap::new(config.domains),
            url_mode: config.url_mode,
            add_trailing_slash: config.add_trailing_slash,
            alternative_templates,
        }
    }

    pub fn facade(&self) -> &Arc<FacadeService> {
        &self.facade
    }

    pub fn default_url_mode(&self) -> UrlMode {
        self.url_mode
    }

    /// Start routing one request. The current snapshot is captured here and
    /// used for everything the context does afterwards.
    pub fn begin_request(&self, uri: Url, cancel: CancellationToken) -> RoutingContext<'_> {
        let snapshot = self.facade.current_snapshot();
        let request = PublishedRequest::new(uri, &self.domains, &snapshot, self.alternative_templates);
        RoutingContext {
            service: self,
            snapshot,
            request,
            cancel,
        }
    }

    /// Resolve a URL against the current snapshot.
    pub fn resolve(&self, uri: Url, cancel: CancellationToken) -> Result<ResolutionResult, RoutingError> {
        self.begin_request(uri, cancel).resolve()
    }

    /// Outbound URL for `id`, relative to a request for `current`.
    pub fn url(
        &self,
        current: Url,
        id: ContentId,
        mode: Option<UrlMode>,
        cancel: CancellationToken,
    ) -> Result<Option<String>, RoutingError> {
        self.begin_request(current, cancel).url(id, mode)
    }
}

/// Per-request view over one snapshot.
pub struct RoutingContext<'a> {
    service: &'a RoutingService,
    snapshot: Arc<Snapshot>,
    request: PublishedRequest,
    cancel: CancellationToken,
}

impl RoutingContext<'_> {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn request(&self) -> &PublishedRequest {
        &self.request
    }

    pub fn culture(&self) -> &Culture {
        self.request.culture()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn resolve(&self) -> Result<ResolutionResult, RoutingError> {
        self.service
            .finders
            .resolve(&self.request, &self.snapshot, &self.cancel)
    }

    /// URL for a node id in this context's snapshot. Unknown ids have no URL.
    pub fn url(&self, id: ContentId, mode: Option<UrlMode>) -> Result<Option<String>, RoutingError> {
        match self.snapshot.get(id) {
            Some(node) => self.url_for(node, mode),
            None => Ok(None),
        }
    }

    pub fn url_for(&self, node: &ContentNode, mode: Option<UrlMode>) -> Result<Option<String>, RoutingError> {
        let context = UrlContext {
            snapshot: &self.snapshot,
            domains: &self.service.domains,
            current: self.request.uri(),
            add_trailing_slash: self.service.add_trailing_slash,
        };
        self.service.urls.url(
            node,
            mode.unwrap_or(self.service.url_mode),
            &context,
            &self.cancel,
        )
    }
}

/// Build a request URL from an HTTP host header and a path with query.
pub fn request_url(scheme: &str, host: &str, path_and_query: &str) -> Result<Url, RoutingError> {
    let path_and_query = if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{path_and_query}")
    };
    let raw = format!("{scheme}://{host}{path_and_query}");
    Url::parse(&raw).map_err(|err| RoutingError::invalid_url(raw, err))
}
