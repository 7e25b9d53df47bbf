//! Routing configuration.
//!
//! Loaded from the `[routing]` section of `folio.toml`; the known view
//! templates come from `[views]`.

use serde::{Deserialize, Serialize};

use crate::domain::content::ContentId;

use super::domains::DomainBinding;
use super::urls::UrlMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderKind {
    Route,
    RouteAndTemplate,
    IdPath,
    UrlAlias,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlProviderKind {
    Default,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    #[serde(default = "default_permanent")]
    pub permanent: bool,
}

fn default_permanent() -> bool {
    true
}

pub const DEFAULT_FINDERS: [FinderKind; 5] = [
    FinderKind::Route,
    FinderKind::RouteAndTemplate,
    FinderKind::IdPath,
    FinderKind::UrlAlias,
    FinderKind::Redirect,
];

pub const DEFAULT_URL_PROVIDERS: [UrlProviderKind; 2] =
    [UrlProviderKind::Default, UrlProviderKind::Alias];

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub finders: Vec<FinderKind>,
    pub url_providers: Vec<UrlProviderKind>,
    pub url_mode: UrlMode,
    pub add_trailing_slash: bool,
    pub not_found_content_id: Option<ContentId>,
    pub disable_alternative_templates: bool,
    pub domains: Vec<DomainBinding>,
    pub redirects: Vec<RedirectRule>,
    /// Template aliases the route-and-template finder accepts.
    pub templates: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            finders: DEFAULT_FINDERS.to_vec(),
            url_providers: DEFAULT_URL_PROVIDERS.to_vec(),
            url_mode: UrlMode::Auto,
            add_trailing_slash: false,
            not_found_content_id: None,
            disable_alternative_templates: false,
            domains: Vec::new(),
            redirects: Vec::new(),
            templates: Vec::new(),
        }
    }
}

impl RoutingConfig {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        let routing = &settings.routing;
        Self {
            finders: routing.finders.clone(),
            url_providers: routing.url_providers.clone(),
            url_mode: routing.url_mode,
            add_trailing_slash: routing.add_trailing_slash,
            not_found_content_id: routing.not_found_content_id,
            disable_alternative_templates: routing.disable_alternative_templates,
            domains: routing.domains.clone(),
            redirects: routing.redirects.clone(),
            templates: settings.views.keys().cloned().collect(),
        }
    }
}
