//! Outbound URL providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cache::Snapshot;
use crate::domain::content::ContentNode;
use crate::domain::error::DomainError;

use super::domains::{DomainMap, WILDCARD_HOST, strip_port};
use super::error::RoutingError;
use super::request::host_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    Relative,
    Absolute,
    /// Relative when the target lives on the current host, absolute otherwise.
    #[default]
    Auto,
}

impl fmt::Display for UrlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UrlMode::Relative => "relative",
            UrlMode::Absolute => "absolute",
            UrlMode::Auto => "auto",
        })
    }
}

impl FromStr for UrlMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(UrlMode::Relative),
            "absolute" => Ok(UrlMode::Absolute),
            "auto" => Ok(UrlMode::Auto),
            other => Err(DomainError::parse(
                "url mode",
                other,
                "expected relative, absolute or auto",
            )),
        }
    }
}

/// What a provider may look at while building a URL.
pub struct UrlContext<'a> {
    pub snapshot: &'a Snapshot,
    pub domains: &'a DomainMap,
    /// URL of the request the link is generated for.
    pub current: &'a Url,
    pub add_trailing_slash: bool,
}

impl UrlContext<'_> {
    fn current_host(&self) -> String {
        host_of(self.current)
    }

    fn render(&self, host: &str, path: String, mode: UrlMode) -> String {
        let path = if self.add_trailing_slash && path != "/" {
            format!("{path}/")
        } else {
            path
        };

        let current_host = self.current_host();
        let same_host = host == current_host
            || (!host.contains(':') && strip_port(host) == strip_port(&current_host));
        let absolute = match mode {
            UrlMode::Relative => false,
            UrlMode::Absolute => true,
            UrlMode::Auto => !same_host,
        };

        if absolute {
            format!("{}://{host}{path}", self.current.scheme())
        } else {
            path
        }
    }
}

pub trait UrlProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn url_for(&self, node: &ContentNode, mode: UrlMode, context: &UrlContext<'_>) -> Option<String>;
}

/// Route-based URLs, prefixed by the root's domain binding.
pub struct DefaultUrlProvider;

impl UrlProvider for DefaultUrlProvider {
    fn name(&self) -> &'static str {
        "default"
    }

    fn url_for(&self, node: &ContentNode, mode: UrlMode, context: &UrlContext<'_>) -> Option<String> {
        let snapshot = context.snapshot;
        let route = snapshot.route_of(node.id)?;
        // Losers of a route collision have no URL.
        if snapshot.content_at_route(route)?.id != node.id {
            return None;
        }

        let current_host = context.current_host();
        let (host, prefix) = match context.domains.binding_for_root(route.root, &current_host) {
            Some((host, prefix)) if host == WILDCARD_HOST => (current_host.clone(), prefix),
            Some((host, prefix)) => (host.to_string(), prefix),
            // Unbound non-default roots are unreachable by path.
            None if snapshot.default_root() != Some(route.root) => return None,
            None => (current_host.clone(), ""),
        };

        let path = match (prefix.is_empty(), route.path.as_str()) {
            (true, path) => path.to_string(),
            (false, "/") => prefix.to_string(),
            (false, path) => format!("{prefix}{path}"),
        };

        Some(context.render(&host, path, mode))
    }
}

/// The first `urlAlias` of a node.
pub struct AliasUrlProvider;

impl UrlProvider for AliasUrlProvider {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn url_for(&self, node: &ContentNode, mode: UrlMode, context: &UrlContext<'_>) -> Option<String> {
        let alias = node
            .url_aliases()
            .into_iter()
            .find(|alias| context.snapshot.content_by_alias(alias).map(|n| n.id) == Some(node.id))?;
        Some(context.render(&context.current_host(), alias, mode))
    }
}

pub struct UrlProviderChain {
    providers: Vec<Box<dyn UrlProvider>>,
}

impl UrlProviderChain {
    pub fn new(providers: Vec<Box<dyn UrlProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// First non-empty URL in provider order. `Ok(None)` means the node has
    /// no URL.
    pub fn url(
        &self,
        node: &ContentNode,
        mode: UrlMode,
        context: &UrlContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, RoutingError> {
        for provider in &self.providers {
            if cancel.is_cancelled() {
                return Err(RoutingError::Cancelled);
            }
            if let Some(url) = provider.url_for(node, mode, context) {
                return Ok(Some(url));
            }
        }
        Ok(None)
    }
}
