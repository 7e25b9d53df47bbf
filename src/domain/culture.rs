//! Request and content culture labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A culture label such as `en-US`.
///
/// The invariant culture is the empty label; it is what a request resolves to
/// when no domain binding matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Culture(String);

impl Culture {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_string())
    }

    pub fn invariant() -> Self {
        Self(String::new())
    }

    pub fn is_invariant(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invariant() {
            f.write_str("invariant")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Culture {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_is_empty_label() {
        let culture = Culture::invariant();
        assert!(culture.is_invariant());
        assert_eq!(culture.to_string(), "invariant");
        assert_eq!(culture, Culture::default());
    }

    #[test]
    fn labels_are_trimmed() {
        let culture = Culture::new(" fr-FR ");
        assert_eq!(culture.as_str(), "fr-FR");
        assert!(!culture.is_invariant());
    }
}
