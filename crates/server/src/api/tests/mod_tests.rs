use super::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::Tone;

struct FixedRephraser(Result<String, String>);

#[async_trait]
impl Rephraser for FixedRephraser {
    async fn rephrase(&self, _text: &str, _tone: Tone) -> Result<String> {
        self.0.clone().map_err(|e| anyhow!(e))
    }
}

async fn setup(engine: FixedRephraser) -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext {
        storage,
        rephraser: Arc::new(engine),
        history_limit: 50,
    }
}

fn new_entry(original: &str) -> NewHistoryEntry {
    NewHistoryEntry {
        original_text: original.to_string(),
        rephrased_text: format!("{original} (rephrased)"),
        tone: Tone::Conversational,
    }
}

#[tokio::test]
async fn rephrase_reports_counts_for_the_rephrased_text() {
    let ctx = setup(FixedRephraser(Ok("The feline was seated.".into()))).await;
    let result = rephrase(
        &ctx,
        RephraseRequest {
            text: "The cat sat.".into(),
            tone: Tone::Formal,
        },
    )
    .await
    .expect("rephrase");

    assert_eq!(result.rephrased_text, "The feline was seated.");
    assert_eq!(result.original_text, "The cat sat.");
    assert_eq!(result.tone, Tone::Formal);
    assert_eq!((result.word_count, result.char_count), (4, 22));
}

#[tokio::test]
async fn blank_text_is_a_validation_error() {
    let ctx = setup(FixedRephraser(Ok("unused".into()))).await;
    let err = rephrase(
        &ctx,
        RephraseRequest {
            text: "   ".into(),
            tone: Tone::Formal,
        },
    )
    .await
    .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn engine_failure_is_internal_with_reason() {
    let ctx = setup(FixedRephraser(Err("API key not configured".into()))).await;
    let err = rephrase(
        &ctx,
        RephraseRequest {
            text: "hello".into(),
            tone: Tone::Creative,
        },
    )
    .await
    .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(err.message, "Failed to rephrase text: API key not configured");
}

#[tokio::test]
async fn history_listing_respects_limit() {
    let mut ctx = setup(FixedRephraser(Ok(String::new()))).await;
    ctx.history_limit = 2;
    for original in ["one", "two", "three"] {
        create_history(&ctx, new_entry(original))
            .await
            .expect("create");
    }

    let listed = list_history(&ctx).await.expect("list");
    let originals: Vec<_> = listed.iter().map(|e| e.original_text.as_str()).collect();
    assert_eq!(originals, vec!["three", "two"]);
}

#[tokio::test]
async fn deleting_unknown_entry_is_not_found() {
    let ctx = setup(FixedRephraser(Ok(String::new()))).await;
    let created = create_history(&ctx, new_entry("keep"))
        .await
        .expect("create");

    let err = delete_history(&ctx, HistoryId::new_v4())
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);

    let ack = delete_history(&ctx, created.id).await.expect("delete");
    assert_eq!(ack.message, "History item deleted");
    assert!(list_history(&ctx).await.expect("list").is_empty());
}
