//! Domain bindings: host + path prefix to culture and site root.

use serde::{Deserialize, Serialize};

use crate::domain::content::ContentId;
use crate::domain::culture::Culture;

/// Host that matches any request host.
pub const WILDCARD_HOST: &str = "*";

/// One configured binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainBinding {
    /// Host name, `host:port`, or `*`.
    pub host: String,
    #[serde(default)]
    pub path_prefix: String,
    #[serde(default)]
    pub culture: Option<Culture>,
    pub root_id: ContentId,
}

/// Binding selected for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainMatch {
    pub host: String,
    /// Normalised prefix, empty or `/segment[/segment]`.
    pub prefix: String,
    pub culture: Culture,
    pub root: ContentId,
    /// Request path with the prefix stripped, always starting with `/`.
    #[serde(skip)]
    pub relative_path: String,
}

#[derive(Debug, Clone)]
struct Binding {
    host: String,
    prefix: String,
    culture: Culture,
    root: ContentId,
}

impl Binding {
    fn is_wildcard(&self) -> bool {
        self.host == WILDCARD_HOST
    }

    fn matches_host(&self, host: &str) -> bool {
        if self.is_wildcard() {
            return true;
        }
        // Ports only count when the binding names one.
        if self.host.contains(':') {
            self.host == host
        } else {
            self.host == strip_port(host)
        }
    }

    fn strip_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Read-only set of domain bindings.
#[derive(Debug, Clone, Default)]
pub struct DomainMap {
    bindings: Vec<Binding>,
}

impl DomainMap {
    pub fn new(bindings: impl IntoIterator<Item = DomainBinding>) -> Self {
        let bindings = bindings
            .into_iter()
            .map(|binding| Binding {
                host: binding.host.trim().to_ascii_lowercase(),
                prefix: normalize_prefix(&binding.path_prefix),
                culture: binding.culture.unwrap_or_else(Culture::invariant),
                root: binding.root_id,
            })
            .collect();
        Self { bindings }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Pick the binding for `host` and a normalised `path`.
    ///
    /// The longest matching prefix wins; at equal length an exact host beats
    /// the wildcard, then declaration order decides.
    pub fn match_request(&self, host: &str, path: &str) -> Option<DomainMatch> {
        let host = host.to_ascii_lowercase();
        let mut best: Option<(&Binding, &str)> = None;

        for binding in &self.bindings {
            if !binding.matches_host(&host) {
                continue;
            }
            let Some(relative) = binding.strip_prefix(path) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, _)) => {
                    (binding.prefix.len(), !binding.is_wildcard())
                        > (current.prefix.len(), !current.is_wildcard())
                }
            };
            if better {
                best = Some((binding, relative));
            }
        }

        best.map(|(binding, relative)| DomainMatch {
            host: if binding.is_wildcard() {
                host.clone()
            } else {
                binding.host.clone()
            },
            prefix: binding.prefix.clone(),
            culture: binding.culture.clone(),
            root: binding.root,
            relative_path: relative.to_string(),
        })
    }

    /// Binding to use when generating a URL for content under `root`.
    ///
    /// Prefers a binding on `current_host`, then any concrete host, then the
    /// wildcard.
    pub fn binding_for_root(&self, root: ContentId, current_host: &str) -> Option<(&str, &str)> {
        let current_host = current_host.to_ascii_lowercase();
        let candidates = || self.bindings.iter().filter(move |b| b.root == root);

        candidates()
            .find(|b| !b.is_wildcard() && b.matches_host(&current_host))
            .or_else(|| candidates().find(|b| !b.is_wildcard()))
            .or_else(|| candidates().find(|b| b.is_wildcard()))
            .map(|b| (b.host.as_str(), b.prefix.as_str()))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let segments: Vec<String> = prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

pub(crate) fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    host.split(':').next().unwrap_or(host)
}
