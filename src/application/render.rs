//! Render pipeline: view lookup, model binding, and the render invoker.
//!
//! The invoker is the only part that knows how output is produced; its
//! errors are opaque and propagate unchanged.

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::Snapshot;
use crate::domain::culture::Culture;

use super::binding::{BoundModel, DeclaredModel, ModelBinder, ModelBindingError, ViewValue};
use super::routing::ResolutionResult;

/// Input handed to a [`RenderInvoker`].
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub model: BoundModel,
    pub template: Option<String>,
    pub culture: Culture,
    /// Cancelled when the request that asked for this render goes away.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub content_type: String,
    pub body: String,
}

/// Error raised by a render invoker. Its cause is not interpreted here.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(Box<dyn StdError + Send + Sync>);

impl RenderError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

pub trait RenderInvoker: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError>;
}

#[derive(Debug, Error)]
pub enum RenderPipelineError {
    #[error("render was cancelled")]
    Cancelled,
    #[error("resolution produced no content to render")]
    NoContent,
    #[error(transparent)]
    Binding(#[from] ModelBindingError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Template alias to declared model. Unknown templates get the plain
/// `RenderModel`.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    views: HashMap<String, DeclaredModel>,
}

impl ViewRegistry {
    pub fn new(views: impl IntoIterator<Item = (String, DeclaredModel)>) -> Self {
        Self {
            views: views
                .into_iter()
                .map(|(template, declared)| (template.to_lowercase(), declared))
                .collect(),
        }
    }

    pub fn from_settings(views: &BTreeMap<String, DeclaredModel>) -> Self {
        Self::new(views.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub fn declared_for(&self, template: Option<&str>) -> DeclaredModel {
        template
            .and_then(|template| self.views.get(&template.to_lowercase()))
            .cloned()
            .unwrap_or(DeclaredModel::RenderModel)
    }

    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}

pub struct RenderPipeline {
    views: ViewRegistry,
    invoker: Arc<dyn RenderInvoker>,
}

impl RenderPipeline {
    pub fn new(views: ViewRegistry, invoker: Arc<dyn RenderInvoker>) -> Self {
        Self { views, invoker }
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// Bind the resolved content to its view's model and render it.
    pub fn render(
        &self,
        result: &ResolutionResult,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<RenderOutput, RenderPipelineError> {
        if cancel.is_cancelled() {
            return Err(RenderPipelineError::Cancelled);
        }
        let content = result
            .content
            .clone()
            .ok_or(RenderPipelineError::NoContent)?;

        let declared = self.views.declared_for(result.template.as_deref());
        let binder = ModelBinder::new(snapshot.content_types(), &result.culture);
        let model = binder.bind(ViewValue::Content(content), &declared)?;

        if cancel.is_cancelled() {
            return Err(RenderPipelineError::Cancelled);
        }

        debug!(
            content_id = model.content().id.0,
            model = %model.type_name(),
            template = result.template.as_deref(),
            "Rendering bound model"
        );

        let request = RenderRequest {
            model,
            template: result.template.clone(),
            culture: result.culture.clone(),
            cancel: cancel.clone(),
        };
        Ok(self.invoker.render(&request)?)
    }
}
