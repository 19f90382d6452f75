use std::sync::Arc;

use shared::{
    domain::HistoryId,
    error::{ApiError, ErrorCode},
    metrics::measure,
    protocol::{HistoryEntry, MessageResponse, NewHistoryEntry, RephraseRequest, RephraseResult},
};
use storage::Storage;
use tracing::{error, info};

use crate::rephraser::Rephraser;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub rephraser: Arc<dyn Rephraser>,
    pub history_limit: u32,
}

pub async fn rephrase(
    ctx: &ApiContext,
    request: RephraseRequest,
) -> Result<RephraseResult, ApiError> {
    request.validate()?;

    let rephrased_text = ctx
        .rephraser
        .rephrase(&request.text, request.tone)
        .await
        .map_err(|e| {
            error!(error = %e, tone = %request.tone, "error rephrasing text");
            ApiError::new(
                ErrorCode::Internal,
                format!("Failed to rephrase text: {e}"),
            )
        })?;

    let stats = measure(&rephrased_text);
    info!(tone = %request.tone, words = stats.words, chars = stats.chars, "text rephrased");
    Ok(RephraseResult {
        rephrased_text,
        original_text: request.text,
        tone: request.tone,
        word_count: stats.words,
        char_count: stats.chars,
    })
}

pub async fn list_history(ctx: &ApiContext) -> Result<Vec<HistoryEntry>, ApiError> {
    ctx.storage
        .list_history(ctx.history_limit)
        .await
        .map_err(|e| internal("Failed to fetch history", e))
}

pub async fn create_history(
    ctx: &ApiContext,
    new_entry: NewHistoryEntry,
) -> Result<HistoryEntry, ApiError> {
    ctx.storage
        .insert_history(&new_entry)
        .await
        .map_err(|e| internal("Failed to save history", e))
}

pub async fn delete_history(ctx: &ApiContext, id: HistoryId) -> Result<MessageResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_history(id)
        .await
        .map_err(|e| internal("Failed to delete history", e))?;
    if !deleted {
        return Err(not_found());
    }
    info!(history_id = %id, "history entry deleted");
    Ok(MessageResponse::new("History item deleted"))
}

pub fn not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "History item not found")
}

fn internal(context: &str, err: anyhow::Error) -> ApiError {
    error!(error = %err, "{context}");
    ApiError::new(ErrorCode::Internal, context)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
