//! Per-request routing input.

use url::Url;

use crate::cache::Snapshot;
use crate::domain::content::ContentId;
use crate::domain::culture::Culture;

use super::domains::{DomainMap, DomainMatch};

/// Query parameter that selects an alternative template.
pub const ALT_TEMPLATE_PARAM: &str = "altTemplate";

/// A request as seen by the content finders.
///
/// The path is lowercased, has no empty segments and no trailing slash, and
/// is relative to the matched domain prefix.
#[derive(Debug, Clone)]
pub struct PublishedRequest {
    uri: Url,
    host: String,
    path: String,
    domain: Option<DomainMatch>,
    culture: Culture,
    root: Option<ContentId>,
    alt_template: Option<String>,
}

impl PublishedRequest {
    /// Resolve culture, domain and site root for `uri`.
    ///
    /// Without a matching binding the request gets the invariant culture and
    /// the snapshot's first root.
    pub fn new(uri: Url, domains: &DomainMap, snapshot: &Snapshot, allow_alt_template: bool) -> Self {
        let host = host_of(&uri);
        let full_path = normalize_path(uri.path());
        let domain = domains.match_request(&host, &full_path);

        let (path, culture, root) = match &domain {
            Some(matched) => (
                matched.relative_path.clone(),
                matched.culture.clone(),
                Some(matched.root),
            ),
            None => (full_path, Culture::invariant(), snapshot.default_root()),
        };

        let alt_template = allow_alt_template
            .then(|| {
                uri.query_pairs()
                    .find(|(key, _)| key.eq_ignore_ascii_case(ALT_TEMPLATE_PARAM))
                    .map(|(_, value)| value.trim().to_string())
            })
            .flatten()
            .filter(|value| !value.is_empty());

        Self {
            uri,
            host,
            path,
            domain,
            culture,
            root,
            alt_template,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Request host, lowercased, with the port when one was given.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn domain(&self) -> Option<&DomainMatch> {
        self.domain.as_ref()
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn root(&self) -> Option<ContentId> {
        self.root
    }

    pub fn alt_template(&self) -> Option<&str> {
        self.alt_template.as_deref()
    }

    /// Path segments below the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }
}

/// Lowercase, drop empty segments and any trailing slash. `/` for the root.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

pub(crate) fn host_of(uri: &Url) -> String {
    let host = uri.host_str().unwrap_or_default().to_ascii_lowercase();
    match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::routing::domains::DomainBinding;
    use crate::domain::content::ContentRecord;
    use crate::domain::content_types::{ContentTypeDescriptor, ContentTypeRegistry};

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
                ContentRecord::new(2, None, "Other", "page").with_sort_order(1),
            ],
        )
        .expect("snapshot")
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("url")
    }

    #[test]
    fn normalize_path_lowercases_and_trims() {
        assert_eq!(normalize_path("/Blog//Post/"), "/blog/post");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn unmatched_request_uses_invariant_culture_and_first_root() {
        let request = PublishedRequest::new(
            url("http://localhost:3000/Dang/"),
            &DomainMap::default(),
            &snapshot(),
            true,
        );
        assert_eq!(request.path(), "/dang");
        assert_eq!(request.host(), "localhost:3000");
        assert!(request.culture().is_invariant());
        assert_eq!(request.root(), Some(ContentId(1)));
        assert!(request.domain().is_none());
    }

    #[test]
    fn domain_binding_sets_culture_root_and_relative_path() {
        let domains = DomainMap::new([DomainBinding {
            host: "example.com".to_string(),
            path_prefix: "/fr".to_string(),
            culture: Some(Culture::new("fr-FR")),
            root_id: ContentId(2),
        }]);
        let request =
            PublishedRequest::new(url("https://example.com/fr/Contact"), &domains, &snapshot(), true);

        assert_eq!(request.path(), "/contact");
        assert_eq!(request.culture().as_str(), "fr-FR");
        assert_eq!(request.root(), Some(ContentId(2)));
        assert_eq!(request.segments().collect::<Vec<_>>(), ["contact"]);
    }

    #[test]
    fn alt_template_query_respects_toggle() {
        let snapshot = snapshot();
        let enabled = PublishedRequest::new(
            url("http://x/blog?altTemplate=print"),
            &DomainMap::default(),
            &snapshot,
            true,
        );
        assert_eq!(enabled.alt_template(), Some("print"));

        let disabled = PublishedRequest::new(
            url("http://x/blog?altTemplate=print"),
            &DomainMap::default(),
            &snapshot,
            false,
        );
        assert_eq!(disabled.alt_template(), None);
    }
}
