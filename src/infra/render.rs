//! Render invoker that serialises the bound model as JSON.

use serde::Serialize;

use crate::application::binding::BoundModel;
use crate::application::render::{RenderError, RenderInvoker, RenderOutput, RenderRequest};
use crate::domain::content::ContentNode;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderInvoker;

#[derive(Serialize)]
struct RenderedPage<'a> {
    template: Option<&'a str>,
    culture: String,
    model: String,
    typed_as: Option<&'a str>,
    content: &'a ContentNode,
}

impl RenderInvoker for JsonRenderInvoker {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let typed_as = match &request.model {
            BoundModel::RenderModel(model) => model.typed_as().map(|alias| alias.as_str()),
            BoundModel::Content(typed) => Some(typed.typed_as.as_str()),
        };
        let page = RenderedPage {
            template: request.template.as_deref(),
            culture: request.culture.to_string(),
            model: request.model.type_name(),
            typed_as,
            content: request.model.content(),
        };
        let body = serde_json::to_string(&page).map_err(RenderError::new)?;
        Ok(RenderOutput {
            content_type: JSON_CONTENT_TYPE.to_string(),
            body,
        })
    }
}
