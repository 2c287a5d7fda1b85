//! Model-rendered chart pages.
//!
//! In `ChartRendering::Model` mode the fetched series is handed to the model
//! with an instruction to write a standalone chart page. The reply is only
//! accepted when it parses as HTML carrying a `script`, `canvas` or `svg`
//! element; otherwise the caller falls back to the data template.

use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::llm::{ChatModel, LlmConfig, RequestMessage, Role};
use crate::widgets::error::{WidgetError, WidgetResult};

/// Instruction for chart page generation.
pub const CHART_PROMPT: &str = "You write self-contained HTML pages that chart the JSON data you are given. Reply with the complete HTML document only, no explanation and no markdown fences. Use Chart.js from a CDN or inline SVG.";

/// Ask the model for a chart page of `data` and validate the reply.
///
/// # Errors
/// Returns an error if the model call fails or the reply is not a usable page.
pub async fn render_with_model<T: Serialize + ?Sized>(
    model: &dyn ChatModel,
    config: &LlmConfig,
    title: &str,
    data: &T,
) -> WidgetResult<String> {
    let payload = serde_json::to_string(data)?;
    let messages = [
        RequestMessage::text(Role::System, CHART_PROMPT),
        RequestMessage::text(Role::User, format!("Title: {title}\nData: {payload}")),
    ];
    let completion = model.complete(&messages, &config.streaming(false)).await?;
    let html = strip_fences(&completion.text);
    validate_chart_markup(html)?;
    debug!(title, len = html.len(), "model chart accepted");
    Ok(html.to_string())
}

/// Check that `html` contains something that can draw a chart.
///
/// # Errors
/// Returns `WidgetError::InvalidMarkup` when no drawing element is present.
pub fn validate_chart_markup(html: &str) -> WidgetResult<()> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script, canvas, svg")
        .map_err(|e| WidgetError::InvalidMarkup(e.to_string()))?;
    if document.select(&selector).next().is_some() {
        Ok(())
    } else {
        Err(WidgetError::InvalidMarkup(
            "no script, canvas or svg element".to_string(),
        ))
    }
}

/// Drop a surrounding markdown code fence, if any.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
