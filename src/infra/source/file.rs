use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::application::source::{
    ContentSource, SourceError, select_published_tree, select_subtree,
};
use crate::domain::content::{ContentId, ContentRecord};
use crate::domain::content_types::ContentTypeDescriptor;

/// Content source backed by a TOML file.
///
/// ```toml
/// [[content_types]]
/// alias = "page"
///
/// [[content]]
/// id = 1
/// name = "Home"
/// content_type = "page"
/// ```
///
/// The file is re-read on every call, so each call sees one consistent
/// version of it.
#[derive(Debug, Clone)]
pub struct TomlContentSource {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentFile {
    content_types: Vec<ContentTypeDescriptor>,
    content: Vec<ContentRecord>,
}

impl TomlContentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<ContentFile, SourceError> {
        let data = fs::read_to_string(&self.path).await.map_err(|err| {
            SourceError::unavailable(format!("{}: {err}", self.path.display()))
        })?;
        let file: ContentFile = toml::from_str(&data).map_err(|err| {
            SourceError::malformed(format!("{}: {err}", self.path.display()))
        })?;
        debug!(
            path = %self.path.display(),
            content_types = file.content_types.len(),
            records = file.content.len(),
            "Read content file"
        );
        Ok(file)
    }
}

#[async_trait]
impl ContentSource for TomlContentSource {
    async fn fetch_content_types(&self) -> Result<Vec<ContentTypeDescriptor>, SourceError> {
        Ok(self.read().await?.content_types)
    }

    async fn fetch_published_tree(&self) -> Result<Vec<ContentRecord>, SourceError> {
        let file = self.read().await?;
        Ok(select_published_tree(&file.content))
    }

    async fn fetch_subtree(&self, root_id: ContentId) -> Result<Vec<ContentRecord>, SourceError> {
        let file = self.read().await?;
        Ok(select_subtree(&file.content, root_id))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SITE: &str = r#"
[[content_types]]
alias = "page"

[[content_types]]
alias = "article"
parent = "page"

[[content]]
id = 1
name = "Home"
content_type = "page"

[[content]]
id = 2
parent_id = 1
name = "Blog"
content_type = "page"

[[content]]
id = 3
parent_id = 2
name = "Draft"
content_type = "article"
published = false

[content.properties]
urlAlias = "draft"
"#;

    fn write_site(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[tokio::test]
    async fn reads_types_and_published_records() {
        let file = write_site(SITE);
        let source = TomlContentSource::new(file.path());

        let types = source.fetch_content_types().await.expect("types");
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].parent.as_ref().map(|p| p.as_str()), Some("page"));

        let ids: Vec<i32> = source
            .fetch_published_tree()
            .await
            .expect("tree")
            .into_iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, [1, 2]);
    }

    #[tokio::test]
    async fn subtree_skips_unpublished_descendants() {
        let file = write_site(SITE);
        let source = TomlContentSource::new(file.path());

        let ids: Vec<i32> = source
            .fetch_subtree(ContentId(2))
            .await
            .expect("subtree")
            .into_iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, [2]);
        assert!(source.fetch_subtree(ContentId(3)).await.expect("subtree").is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let source = TomlContentSource::new("/nonexistent/folio/site.toml");
        assert!(matches!(
            source.fetch_published_tree().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_toml_is_malformed() {
        let file = write_site("[[content]]\nid = \"one\"\n");
        let source = TomlContentSource::new(file.path());
        assert!(matches!(
            source.fetch_published_tree().await,
            Err(SourceError::Malformed { .. })
        ));
    }
}
