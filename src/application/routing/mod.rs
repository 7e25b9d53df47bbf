//! Request-to-content resolution.
//!
//! Inbound, an ordered [`ContentFinderChain`] maps a [`PublishedRequest`] to
//! content. Outbound, a [`UrlProviderChain`] maps content back to a URL. A
//! [`RoutingContext`] ties both to one snapshot for the life of a request.

mod chain;
mod config;
mod context;
mod domains;
mod error;
mod finders;
mod request;
mod urls;

pub use chain::{
    ContentFinderChain, METRIC_RESOLVE_TOTAL, ResolutionOutcome, ResolutionResult,
    ResolutionSummary,
};
pub use config::{
    DEFAULT_FINDERS, DEFAULT_URL_PROVIDERS, FinderKind, RedirectRule, RoutingConfig,
    UrlProviderKind,
};
pub use context::{RoutingContext, RoutingService, request_url};
pub use domains::{DomainBinding, DomainMap, DomainMatch, WILDCARD_HOST};
pub use error::RoutingError;
pub use finders::{
    ContentFinder, FinderMatch, FinderOutcome, IdPathFinder, NotFoundPageFinder, Redirect,
    RedirectFinder, RouteAndTemplateFinder, RouteFinder, UrlAliasFinder,
};
pub use request::{ALT_TEMPLATE_PARAM, PublishedRequest, normalize_path};
pub use urls::{
    AliasUrlProvider, DefaultUrlProvider, UrlContext, UrlMode, UrlProvider, UrlProviderChain,
};
