//! View-model binding.
//!
//! A view declares the model it expects: the plain [`RenderModel`] wrapper,
//! a wrapper specialised to a content type (`RenderModel<alias>`), or a bare
//! content type (`alias`). Binding coerces the resolved value into that shape
//! using the content-type registry's ancestor chains.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::domain::content::ContentNode;
use crate::domain::content_types::{ContentTypeAlias, ContentTypeRegistry};
use crate::domain::culture::Culture;
use crate::domain::error::DomainError;

pub const METRIC_BINDING_FAILED_TOTAL: &str = "folio_binding_failed_total";

const RENDER_MODEL: &str = "RenderModel";

/// Model type a view declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredModel {
    RenderModel,
    RenderModelOf(ContentTypeAlias),
    Content(ContentTypeAlias),
}

impl fmt::Display for DeclaredModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredModel::RenderModel => f.write_str(RENDER_MODEL),
            DeclaredModel::RenderModelOf(alias) => write!(f, "{RENDER_MODEL}<{alias}>"),
            DeclaredModel::Content(alias) => write!(f, "{alias}"),
        }
    }
}

impl FromStr for DeclaredModel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::validation("declared model must not be empty"));
        }
        if value == RENDER_MODEL {
            return Ok(DeclaredModel::RenderModel);
        }

        if let Some(rest) = value.strip_prefix(RENDER_MODEL)
            && let Some(inner) = rest.strip_prefix('<').and_then(|r| r.strip_suffix('>'))
        {
            let inner = inner.trim();
            if inner.is_empty() || inner.contains(['<', '>']) {
                return Err(DomainError::parse(
                    "declared model",
                    value,
                    "expects a single content type alias",
                ));
            }
            return Ok(DeclaredModel::RenderModelOf(ContentTypeAlias::new(inner)));
        }

        if value.contains(['<', '>']) {
            return Err(DomainError::parse(
                "declared model",
                value,
                "unbalanced type arguments",
            ));
        }
        Ok(DeclaredModel::Content(ContentTypeAlias::new(value)))
    }
}

/// Content paired with the request culture, optionally viewed as a specific
/// content type.
#[derive(Debug, Clone)]
pub struct RenderModel {
    content: Arc<ContentNode>,
    culture: Culture,
    typed_as: Option<ContentTypeAlias>,
}

impl RenderModel {
    pub fn new(content: Arc<ContentNode>, culture: Culture) -> Self {
        Self {
            content,
            culture,
            typed_as: None,
        }
    }

    pub fn content(&self) -> &Arc<ContentNode> {
        &self.content
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn typed_as(&self) -> Option<&ContentTypeAlias> {
        self.typed_as.as_ref()
    }

    pub fn type_name(&self) -> String {
        match &self.typed_as {
            Some(alias) => format!("{RENDER_MODEL}<{alias}>"),
            None => RENDER_MODEL.to_string(),
        }
    }

    fn retyped(&self, alias: ContentTypeAlias) -> Self {
        Self {
            content: Arc::clone(&self.content),
            culture: self.culture.clone(),
            typed_as: Some(alias),
        }
    }
}

/// Content viewed as one of its types.
#[derive(Debug, Clone)]
pub struct TypedContent {
    pub content: Arc<ContentNode>,
    pub typed_as: ContentTypeAlias,
}

/// Value handed to a view.
#[derive(Debug, Clone)]
pub enum ViewValue {
    Content(Arc<ContentNode>),
    Model(RenderModel),
}

impl ViewValue {
    pub fn content(&self) -> &Arc<ContentNode> {
        match self {
            ViewValue::Content(content) => content,
            ViewValue::Model(model) => model.content(),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            ViewValue::Content(content) => content.content_type.to_string(),
            ViewValue::Model(model) => model.type_name(),
        }
    }
}

/// Result of a successful bind.
#[derive(Debug, Clone)]
pub enum BoundModel {
    RenderModel(RenderModel),
    Content(TypedContent),
}

impl BoundModel {
    pub fn content(&self) -> &Arc<ContentNode> {
        match self {
            BoundModel::RenderModel(model) => model.content(),
            BoundModel::Content(typed) => &typed.content,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            BoundModel::RenderModel(model) => model.type_name(),
            BoundModel::Content(typed) => typed.typed_as.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot bind source type {source_type} to model type {declared}")]
pub struct ModelBindingError {
    pub source_type: String,
    pub declared: String,
}

/// Binds resolved values for one request.
pub struct ModelBinder<'a> {
    registry: &'a ContentTypeRegistry,
    culture: &'a Culture,
}

impl<'a> ModelBinder<'a> {
    pub fn new(registry: &'a ContentTypeRegistry, culture: &'a Culture) -> Self {
        Self { registry, culture }
    }

    pub fn bind(&self, value: ViewValue, declared: &DeclaredModel) -> Result<BoundModel, ModelBindingError> {
        match declared {
            DeclaredModel::RenderModel => Ok(BoundModel::RenderModel(match value {
                ViewValue::Model(model) => model,
                ViewValue::Content(content) => RenderModel::new(content, self.culture.clone()),
            })),
            DeclaredModel::RenderModelOf(target) => {
                self.ensure_assignable(&value, declared, target)?;
                Ok(BoundModel::RenderModel(match value {
                    ViewValue::Model(model) => model.retyped(target.clone()),
                    ViewValue::Content(content) => RenderModel {
                        content,
                        culture: self.culture.clone(),
                        typed_as: Some(target.clone()),
                    },
                }))
            }
            DeclaredModel::Content(target) => {
                self.ensure_assignable(&value, declared, target)?;
                let content = match value {
                    ViewValue::Model(model) => model.content,
                    ViewValue::Content(content) => content,
                };
                Ok(BoundModel::Content(TypedContent {
                    content,
                    typed_as: target.clone(),
                }))
            }
        }
    }

    fn ensure_assignable(
        &self,
        value: &ViewValue,
        declared: &DeclaredModel,
        target: &ContentTypeAlias,
    ) -> Result<(), ModelBindingError> {
        // Wrappers are judged by the content they hold.
        let actual = &value.content().content_type;
        if self.registry.is_assignable(actual, target) {
            return Ok(());
        }

        let err = ModelBindingError {
            source_type: value.type_name(),
            declared: declared.to_string(),
        };
        counter!(METRIC_BINDING_FAILED_TOTAL).increment(1);
        warn!(
            content_id = value.content().id.0,
            content_type = %actual,
            source_type = %err.source_type,
            declared = %err.declared,
            "Model binding failed"
        );
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::content::ContentId;
    use crate::domain::content_types::ContentTypeDescriptor;

    fn registry() -> ContentTypeRegistry {
        ContentTypeRegistry::from_descriptors([
            ContentTypeDescriptor::root("page"),
            ContentTypeDescriptor::child("article", "page"),
        ])
        .expect("types")
    }

    fn node(content_type: &str) -> Arc<ContentNode> {
        Arc::new(ContentNode {
            id: ContentId(1),
            key: None,
            parent_id: None,
            name: "Node".to_string(),
            content_type: content_type.into(),
            sort_order: 0,
            level: 1,
            url_segment: "node".to_string(),
            template: None,
            culture: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
        })
    }

    #[test]
    fn declared_model_parses_all_forms() {
        assert_eq!("RenderModel".parse::<DeclaredModel>(), Ok(DeclaredModel::RenderModel));
        assert_eq!(
            " RenderModel<article> ".parse::<DeclaredModel>(),
            Ok(DeclaredModel::RenderModelOf("article".into()))
        );
        assert_eq!(
            "article".parse::<DeclaredModel>(),
            Ok(DeclaredModel::Content("article".into()))
        );
        assert!("RenderModel<>".parse::<DeclaredModel>().is_err());
        assert!("Foo<bar>".parse::<DeclaredModel>().is_err());
        assert!("".parse::<DeclaredModel>().is_err());
    }

    #[test]
    fn declared_model_displays_round_trip() {
        for raw in ["RenderModel", "RenderModel<article>", "article"] {
            let declared: DeclaredModel = raw.parse().expect("parse");
            assert_eq!(declared.to_string(), raw);
        }
    }

    #[test]
    fn unparameterised_wrapper_passes_through() {
        let registry = registry();
        let culture = Culture::new("en-US");
        let binder = ModelBinder::new(&registry, &culture);
        let model = RenderModel::new(node("article"), Culture::new("fr-FR"));

        let BoundModel::RenderModel(bound) = binder
            .bind(ViewValue::Model(model.clone()), &DeclaredModel::RenderModel)
            .expect("bind")
        else {
            panic!("expected wrapper");
        };
        assert!(Arc::ptr_eq(bound.content(), model.content()));
        assert_eq!(bound.culture().as_str(), "fr-FR");
        assert!(bound.typed_as().is_none());
    }

    #[test]
    fn raw_content_gets_request_culture() {
        let registry = registry();
        let culture = Culture::new("en-US");
        let binder = ModelBinder::new(&registry, &culture);
        let bound = binder
            .bind(ViewValue::Content(node("page")), &DeclaredModel::RenderModel)
            .expect("bind");
        assert_eq!(bound.type_name(), "RenderModel");
        let BoundModel::RenderModel(model) = bound else {
            panic!("expected wrapper");
        };
        assert_eq!(model.culture().as_str(), "en-US");
    }

    #[test]
    fn ancestor_typed_wrapper_keeps_same_content() {
        let registry = registry();
        let culture = Culture::invariant();
        let binder = ModelBinder::new(&registry, &culture);
        let content = node("article");

        let bound = binder
            .bind(
                ViewValue::Content(Arc::clone(&content)),
                &DeclaredModel::RenderModelOf("page".into()),
            )
            .expect("bind");
        assert_eq!(bound.type_name(), "RenderModel<page>");
        assert!(Arc::ptr_eq(bound.content(), &content));
        assert_eq!(bound.content().content_type.as_str(), "article");
    }

    #[test]
    fn error_names_both_types() {
        let registry = registry();
        let culture = Culture::invariant();
        let binder = ModelBinder::new(&registry, &culture);
        let model = RenderModel::new(node("page"), Culture::invariant()).retyped("page".into());

        let err = binder
            .bind(ViewValue::Model(model), &DeclaredModel::Content("article".into()))
            .expect_err("page is not an article");
        assert_eq!(
            err.to_string(),
            "Cannot bind source type RenderModel<page> to model type article"
        );
    }
}
