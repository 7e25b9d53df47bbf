//! Content-type descriptors and their single-parent inheritance chains.
//!
//! Each descriptor names an optional parent alias. When descriptors are
//! loaded into a [`ContentTypeRegistry`] the chain from every type up to its
//! family root is computed once, so compatibility checks at request time are
//! a slice scan rather than a repeated map walk.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared alias of a content type, e.g. `blogPost`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentTypeAlias(String);

impl ContentTypeAlias {
    pub fn new(alias: impl AsRef<str>) -> Self {
        Self(alias.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentTypeAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentTypeAlias {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Raw content-type metadata as supplied by the content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeDescriptor {
    pub alias: ContentTypeAlias,
    #[serde(default)]
    pub parent: Option<ContentTypeAlias>,
}

impl ContentTypeDescriptor {
    pub fn root(alias: impl AsRef<str>) -> Self {
        Self {
            alias: ContentTypeAlias::new(alias),
            parent: None,
        }
    }

    pub fn child(alias: impl AsRef<str>, parent: impl AsRef<str>) -> Self {
        Self {
            alias: ContentTypeAlias::new(alias),
            parent: Some(ContentTypeAlias::new(parent)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentTypeError {
    #[error("content type alias must not be empty")]
    EmptyAlias,
    #[error("content type `{alias}` is declared more than once")]
    Duplicate { alias: ContentTypeAlias },
    #[error("content type `{alias}` inherits from unknown type `{parent}`")]
    UnknownParent {
        alias: ContentTypeAlias,
        parent: ContentTypeAlias,
    },
    #[error("content type `{alias}` is part of an inheritance cycle")]
    Cycle { alias: ContentTypeAlias },
}

/// Validated set of content types with precomputed ancestor chains.
#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
    descriptors: HashMap<ContentTypeAlias, ContentTypeDescriptor>,
    // Self first, family root last.
    chains: HashMap<ContentTypeAlias, Box<[ContentTypeAlias]>>,
}

impl ContentTypeRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate descriptors and precompute every chain.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ContentTypeDescriptor>,
    ) -> Result<Self, ContentTypeError> {
        let mut by_alias = HashMap::new();
        for descriptor in descriptors {
            if descriptor.alias.as_str().is_empty() {
                return Err(ContentTypeError::EmptyAlias);
            }
            if by_alias.contains_key(&descriptor.alias) {
                return Err(ContentTypeError::Duplicate {
                    alias: descriptor.alias,
                });
            }
            by_alias.insert(descriptor.alias.clone(), descriptor);
        }

        let mut chains = HashMap::with_capacity(by_alias.len());
        for alias in by_alias.keys() {
            let chain = walk_chain(&by_alias, alias)?;
            chains.insert(alias.clone(), chain.into_boxed_slice());
        }

        Ok(Self {
            descriptors: by_alias,
            chains,
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn contains(&self, alias: &ContentTypeAlias) -> bool {
        self.descriptors.contains_key(alias)
    }

    pub fn get(&self, alias: &ContentTypeAlias) -> Option<&ContentTypeDescriptor> {
        self.descriptors.get(alias)
    }

    /// The chain from `alias` up to its family root, `alias` included.
    pub fn chain(&self, alias: &ContentTypeAlias) -> Option<&[ContentTypeAlias]> {
        self.chains.get(alias).map(|chain| chain.as_ref())
    }

    /// Whether content of type `source` may be viewed as `target`.
    ///
    /// True iff `target` is `source` itself or one of its ancestors. An
    /// unregistered `source` is only compatible with itself.
    pub fn is_assignable(&self, source: &ContentTypeAlias, target: &ContentTypeAlias) -> bool {
        match self.chain(source) {
            Some(chain) => chain.iter().any(|ancestor| ancestor == target),
            None => source == target,
        }
    }
}

fn walk_chain(
    by_alias: &HashMap<ContentTypeAlias, ContentTypeDescriptor>,
    start: &ContentTypeAlias,
) -> Result<Vec<ContentTypeAlias>, ContentTypeError> {
    let mut chain = vec![start.clone()];
    let mut current = start;

    while let Some(parent) = by_alias.get(current).and_then(|d| d.parent.as_ref()) {
        if !by_alias.contains_key(parent) {
            return Err(ContentTypeError::UnknownParent {
                alias: current.clone(),
                parent: parent.clone(),
            });
        }
        if chain.contains(parent) {
            return Err(ContentTypeError::Cycle {
                alias: start.clone(),
            });
        }
        chain.push(parent.clone());
        current = parent;
    }

    Ok(chain)
}
