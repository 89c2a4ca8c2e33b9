//! Opaque LLM collaborator (C7 AI summaries, C12 distillation). The core
//! never depends on a specific provider — just a text in, text out (or
//! text in, JSON out) call with a timeout the caller enforces.

use async_trait::async_trait;

#[async_trait]
pub trait Llm: Send + Sync {
    /// Summarizes a consolidation group into 2-3 prose paragraphs. `None`
    /// on any failure — the caller falls back to the template summary.
    async fn summarize(&self, bullet_points: &[String]) -> Option<String>;

    /// Extracts candidate memories from a transcript as a JSON array of
    /// `{content, type, tags}` objects. Raw text is returned so the caller
    /// can apply its own noise-tolerant parsing (fenced code blocks, prose
    /// wrapping the array, etc). `None` on failure.
    async fn extract_memories(&self, transcript: &str, existing_context: &[String]) -> Option<String>;
}

/// No-op summarizer/extractor used when no LLM is configured. Consolidation
/// falls back to the template path; distillation yields no candidates.
pub struct NullLlm;

#[async_trait]
impl Llm for NullLlm {
    async fn summarize(&self, _bullet_points: &[String]) -> Option<String> {
        None
    }

    async fn extract_memories(&self, _transcript: &str, _existing_context: &[String]) -> Option<String> {
        None
    }
}
