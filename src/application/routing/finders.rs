//! Content finder strategies.
//!
//! A finder is a pure function of the request and the snapshot. It either
//! finds content, declines, or asks for a redirect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::{RouteKey, Snapshot};
use crate::domain::content::{ContentId, ContentNode};

use super::request::{PublishedRequest, normalize_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub location: String,
    pub permanent: bool,
}

#[derive(Debug, Clone)]
pub struct FinderMatch {
    pub content: Arc<ContentNode>,
    /// Template chosen by the finder itself, overriding the node's.
    pub template: Option<String>,
}

impl FinderMatch {
    fn content(content: &Arc<ContentNode>) -> Self {
        Self {
            content: Arc::clone(content),
            template: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FinderOutcome {
    Found(FinderMatch),
    NoMatch,
    Redirect(Redirect),
}

pub trait ContentFinder: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_find(&self, request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome;
}

/// Route lookup under the request's root.
pub struct RouteFinder;

impl ContentFinder for RouteFinder {
    fn name(&self) -> &'static str {
        "route"
    }

    fn try_find(&self, request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome {
        let Some(root) = request.root() else {
            return FinderOutcome::NoMatch;
        };
        snapshot
            .content_at_route(&RouteKey::new(root, request.path()))
            .map_or(FinderOutcome::NoMatch, |node| {
                FinderOutcome::Found(FinderMatch::content(node))
            })
    }
}

/// `/path/<template>`: content at `/path` rendered with a known template.
pub struct RouteAndTemplateFinder {
    templates: HashSet<String>,
}

impl RouteAndTemplateFinder {
    pub fn new(templates: impl IntoIterator<Item = String>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl ContentFinder for RouteAndTemplateFinder {
    fn name(&self) -> &'static str {
        "route_and_template"
    }

    fn try_find(&self, request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome {
        let Some(root) = request.root() else {
            return FinderOutcome::NoMatch;
        };
        let Some((parent, template)) = request.path().rsplit_once('/') else {
            return FinderOutcome::NoMatch;
        };
        if template.is_empty() || !self.templates.contains(template) {
            return FinderOutcome::NoMatch;
        }

        let parent = if parent.is_empty() { "/" } else { parent };
        match snapshot.content_at_route(&RouteKey::new(root, parent)) {
            Some(node) => FinderOutcome::Found(FinderMatch {
                content: Arc::clone(node),
                template: Some(template.to_string()),
            }),
            None => FinderOutcome::NoMatch,
        }
    }
}

/// `/1234` or `/<guid>`.
pub struct IdPathFinder;

impl ContentFinder for IdPathFinder {
    fn name(&self) -> &'static str {
        "id_path"
    }

    fn try_find(&self, request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome {
        let mut segments = request.segments();
        let (Some(segment), None) = (segments.next(), segments.next()) else {
            return FinderOutcome::NoMatch;
        };

        let node = if let Ok(id) = segment.parse::<i32>() {
            snapshot.get(ContentId(id))
        } else if let Ok(key) = Uuid::parse_str(segment) {
            snapshot.get_by_key(key)
        } else {
            None
        };

        node.map_or(FinderOutcome::NoMatch, |node| {
            FinderOutcome::Found(FinderMatch::content(node))
        })
    }
}

/// Matches the `urlAlias` property of any node under the request's root.
pub struct UrlAliasFinder;

impl ContentFinder for UrlAliasFinder {
    fn name(&self) -> &'static str {
        "url_alias"
    }

    fn try_find(&self, request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome {
        if request.path() == "/" {
            return FinderOutcome::NoMatch;
        }
        let Some(node) = snapshot.content_by_alias(request.path()) else {
            return FinderOutcome::NoMatch;
        };

        let node_root = snapshot.route_of(node.id).map(|route| route.root);
        if request.domain().is_some() && node_root != request.root() {
            return FinderOutcome::NoMatch;
        }
        FinderOutcome::Found(FinderMatch::content(node))
    }
}

/// Configured path redirects.
pub struct RedirectFinder {
    rules: HashMap<String, Redirect>,
}

impl RedirectFinder {
    pub fn new(rules: impl IntoIterator<Item = (String, Redirect)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(from, redirect)| (normalize_path(&from), redirect))
                .collect(),
        }
    }
}

impl ContentFinder for RedirectFinder {
    fn name(&self) -> &'static str {
        "redirect"
    }

    fn try_find(&self, request: &PublishedRequest, _snapshot: &Snapshot) -> FinderOutcome {
        self.rules
            .get(request.path())
            .map_or(FinderOutcome::NoMatch, |redirect| {
                FinderOutcome::Redirect(redirect.clone())
            })
    }
}

/// Last chance: the configured not-found page.
pub struct NotFoundPageFinder {
    content_id: Option<ContentId>,
}

impl NotFoundPageFinder {
    pub fn new(content_id: Option<ContentId>) -> Self {
        Self { content_id }
    }
}

impl ContentFinder for NotFoundPageFinder {
    fn name(&self) -> &'static str {
        "not_found"
    }

    fn try_find(&self, _request: &PublishedRequest, snapshot: &Snapshot) -> FinderOutcome {
        self.content_id
            .and_then(|id| snapshot.get(id))
            .map_or(FinderOutcome::NoMatch, |node| {
                FinderOutcome::Found(FinderMatch::content(node))
            })
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::application::routing::domains::{DomainBinding, DomainMap};
    use crate::domain::content::{ContentRecord, PropertyValue, URL_ALIAS_PROPERTY};
    use crate::domain::content_types::{ContentTypeDescriptor, ContentTypeRegistry};
    use crate::domain::culture::Culture;

    const KEY: &str = "4f1c2d3e-5a6b-4c7d-8e9f-0a1b2c3d4e5f";

    fn snapshot() -> Snapshot {
        let types = Arc::new(
            ContentTypeRegistry::from_descriptors([ContentTypeDescriptor::root("page")])
                .expect("types"),
        );
        Snapshot::build(
            1,
            types,
            vec![
                ContentRecord::new(1, None, "Home", "page"),
                ContentRecord::new(2, Some(1), "Blog", "page")
                    .with_key(Uuid::parse_str(KEY).expect("uuid")),
                ContentRecord::new(3, Some(2), "Hello World", "page").with_property(
                    URL_ALIAS_PROPERTY,
                    PropertyValue::Text("hello".to_string()),
                ),
                ContentRecord::new(4, Some(1), "Not Found", "page"),
                ContentRecord::new(10, None, "Other Site", "page").with_sort_order(1),
            ],
        )
        .expect("snapshot")
    }

    fn request(snapshot: &Snapshot, raw: &str) -> PublishedRequest {
        PublishedRequest::new(Url::parse(raw).expect("url"), &DomainMap::default(), snapshot, true)
    }

    fn found_id(outcome: FinderOutcome) -> Option<i32> {
        match outcome {
            FinderOutcome::Found(found) => Some(found.content.id.0),
            _ => None,
        }
    }

    #[test]
    fn route_finder_matches_case_insensitive_routes() {
        let snapshot = snapshot();
        let outcome = RouteFinder.try_find(&request(&snapshot, "http://x/Blog/Hello-World/"), &snapshot);
        assert_eq!(found_id(outcome), Some(3));
        let outcome = RouteFinder.try_find(&request(&snapshot, "http://x/dang"), &snapshot);
        assert_eq!(found_id(outcome), None);
    }

    #[test]
    fn route_and_template_requires_known_template() {
        let snapshot = snapshot();
        let finder = RouteAndTemplateFinder::new(["Print".to_string()]);

        match finder.try_find(&request(&snapshot, "http://x/blog/print"), &snapshot) {
            FinderOutcome::Found(found) => {
                assert_eq!(found.content.id, ContentId(2));
                assert_eq!(found.template.as_deref(), Some("print"));
            }
            other => panic!("expected match, got {other:?}"),
        }
        let home = finder.try_find(&request(&snapshot, "http://x/print"), &snapshot);
        assert_eq!(found_id(home), Some(1));
        let unknown = finder.try_find(&request(&snapshot, "http://x/blog/rss"), &snapshot);
        assert_eq!(found_id(unknown), None);
    }

    #[test]
    fn id_path_accepts_ids_and_keys() {
        let snapshot = snapshot();
        let by_id = IdPathFinder.try_find(&request(&snapshot, "http://x/3"), &snapshot);
        assert_eq!(found_id(by_id), Some(3));
        let by_key = IdPathFinder.try_find(&request(&snapshot, &format!("http://x/{KEY}")), &snapshot);
        assert_eq!(found_id(by_key), Some(2));
        let nested = IdPathFinder.try_find(&request(&snapshot, "http://x/blog/3"), &snapshot);
        assert_eq!(found_id(nested), None);
    }

    #[test]
    fn url_alias_respects_domain_root() {
        let snapshot = snapshot();
        let plain = UrlAliasFinder.try_find(&request(&snapshot, "http://x/hello"), &snapshot);
        assert_eq!(found_id(plain), Some(3));

        let domains = DomainMap::new([DomainBinding {
            host: "other.example".to_string(),
            path_prefix: String::new(),
            culture: Some(Culture::new("en")),
            root_id: ContentId(10),
        }]);
        let other_site = PublishedRequest::new(
            Url::parse("http://other.example/hello").expect("url"),
            &domains,
            &snapshot,
            true,
        );
        assert_eq!(found_id(UrlAliasFinder.try_find(&other_site, &snapshot)), None);
    }

    #[test]
    fn redirect_finder_signals_redirect() {
        let snapshot = snapshot();
        let finder = RedirectFinder::new([(
            "/Old-Blog/".to_string(),
            Redirect {
                location: "/blog".to_string(),
                permanent: true,
            },
        )]);
        match finder.try_find(&request(&snapshot, "http://x/old-blog"), &snapshot) {
            FinderOutcome::Redirect(redirect) => {
                assert_eq!(redirect.location, "/blog");
                assert!(redirect.permanent);
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn not_found_page_requires_published_content() {
        let snapshot = snapshot();
        let req = request(&snapshot, "http://x/dang");
        assert_eq!(
            found_id(NotFoundPageFinder::new(Some(ContentId(4))).try_find(&req, &snapshot)),
            Some(4)
        );
        assert_eq!(
            found_id(NotFoundPageFinder::new(Some(ContentId(99))).try_find(&req, &snapshot)),
            None
        );
        assert_eq!(found_id(NotFoundPageFinder::new(None).try_find(&req, &snapshot)), None);
    }
}
