//! URL segment derivation for published content.
//!
//! A node's segment comes from its `urlName` property when an editor set one,
//! otherwise from its name, and both go through the `slug` crate. Everything
//! produced here is lowercase ASCII, so routes compare without decoding.

use slug::slugify;
use thiserror::Error;

/// Errors that can occur while deriving a URL segment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a URL segment from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Pick the URL segment for a node.
///
/// An explicit segment goes through the same slug rules as a name, so every
/// segment is already valid in a URL path and needs no percent-encoding.
pub fn url_segment(explicit: Option<&str>, name: &str) -> Result<String, SlugError> {
    if let Some(segment) = explicit.map(slugify).filter(|segment| !segment.is_empty()) {
        return Ok(segment);
    }

    derive_slug(name)
}

/// Slug every segment of an alias path. `None` when nothing usable is left.
pub fn alias_path(raw: &str) -> Option<String> {
    let segments: Vec<String> = raw
        .split('/')
        .map(slugify)
        .filter(|segment| !segment.is_empty())
        .collect();
    (!segments.is_empty()).then(|| format!("/{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_normalises_text() {
        let slug = derive_slug("About Our Team").expect("slug");
        assert_eq!(slug, "about-our-team");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_rejects_symbol_only_input() {
        let err = derive_slug("???").expect_err("no representable characters");
        assert_eq!(
            err,
            SlugError::Unrepresentable {
                input: "???".to_string()
            }
        );
    }

    #[test]
    fn explicit_segment_wins_over_name() {
        let segment = url_segment(Some("/Contact-Us/"), "Get in touch").expect("segment");
        assert_eq!(segment, "contact-us");
    }

    #[test]
    fn explicit_segment_is_slugged() {
        let segment = url_segment(Some("Café Menu"), "Menu").expect("segment");
        assert_eq!(segment, "cafe-menu");
    }

    #[test]
    fn alias_paths_slug_each_segment() {
        assert_eq!(alias_path("/Shop/Spring Sale/").as_deref(), Some("/shop/spring-sale"));
        assert_eq!(alias_path(" / ?? / "), None);
    }

    #[test]
    fn blank_explicit_segment_falls_back_to_name() {
        let segment = url_segment(Some("  "), "Get in touch").expect("segment");
        assert_eq!(segment, "get-in-touch");
    }
}
