//! Prompt assembly and answer generation.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use selfnotes_documents::{SourceRef, distinct_sources};
use selfnotes_embeddings::SearchHit;

use crate::error::ComposeError;
use crate::generation::GenerationProvider;

const INSTRUCTIONS: &str = "You are a helpful assistant that answers questions based ONLY on the provided notes.

Rules:
1. Answer ONLY using information from the notes below
2. If the answer is not in the notes, say \"I don't have information about that in my notes\"
3. Be concise and direct
4. When relevant, mention which note the information came from";

/// Placeholder used in place of notes when retrieval found nothing.
pub const NO_CONTEXT: &str = "(No relevant notes were found for this question.)";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// A generated answer and the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,

    /// Distinct source documents in rank order.
    pub sources: Vec<SourceRef>,
}

impl Answer {
    /// The answer followed by a markdown list of linked sources.
    pub fn with_citations(&self) -> String {
        if self.sources.is_empty() {
            return self.text.clone();
        }

        let mut rendered = format!("{}\n\n---\n**Sources:**\n", self.text);
        for source in &self.sources {
            if source.url.is_empty() {
                rendered.push_str(&format!("- {}\n", source.title));
            } else {
                rendered.push_str(&format!("- [{}]({})\n", source.title, source.url));
            }
        }
        rendered
    }
}

/// Build the generation prompt for `question` over the ranked `hits`.
pub fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let context = if hits.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        hits.iter()
            .map(|hit| {
                let chunk = &hit.chunk;
                if chunk.url.is_empty() {
                    format!("[From: {}]\n{}", chunk.title, chunk.text)
                } else {
                    format!("[From: {} | {}]\n{}", chunk.title, chunk.url, chunk.text)
                }
            })
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    };

    format!("{INSTRUCTIONS}\n\nNotes:\n{context}\n\nQuestion: {question}\n\nAnswer:")
}

/// Turns retrieved chunks and a question into an [`Answer`].
pub struct AnswerComposer {
    generator: Arc<dyn GenerationProvider>,
}

impl AnswerComposer {
    /// Create a composer generating with `generator`.
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    /// Generate an answer. The backend is called exactly once.
    pub async fn compose(&self, question: &str, hits: &[SearchHit]) -> Result<Answer, ComposeError> {
        let prompt = build_prompt(question, hits);
        let sources = distinct_sources(hits.iter().map(|hit| &hit.chunk));
        debug!(
            "Composing answer from {} chunks across {} sources",
            hits.len(),
            sources.len()
        );

        let text = self.generator.generate(&prompt).await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use selfnotes_documents::Document;

    use crate::error::GenerateError;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationProvider for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(GenerateError::Timeout)
            } else {
                Ok("  Do squats on Monday.\n".to_string())
            }
        }
    }

    fn hit(source: &str, title: &str, url: &str, text: &str, score: f32) -> SearchHit {
        let doc = Document::new(source, title, url, "");
        SearchHit {
            chunk: doc.chunk(0, text),
            score,
        }
    }

    #[test]
    fn test_prompt_lists_chunks_in_rank_order() {
        let hits = vec![
            hit("a", "Legs", "https://n/legs", "Squats", 0.9),
            hit("b", "Arms", "", "Curls", 0.5),
        ];

        let prompt = build_prompt("What on Monday?", &hits);

        let legs = prompt.find("[From: Legs | https://n/legs]\nSquats").unwrap();
        let arms = prompt.find("[From: Arms]\nCurls").unwrap();
        assert!(legs < arms);
        assert!(prompt.contains("Squats\n\n---\n\n[From: Arms]"));
        assert!(prompt.contains("answers questions based ONLY on the provided notes"));
        assert!(prompt.ends_with("Question: What on Monday?\n\nAnswer:"));
        assert!(!prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn test_prompt_without_context_says_so() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains(&format!("Notes:\n{NO_CONTEXT}\n\nQuestion: Anything?")));
    }

    #[tokio::test]
    async fn test_compose_calls_generator_once() {
        let generator = Arc::new(RecordingGenerator::default());
        let composer = AnswerComposer::new(generator.clone());
        let hits = vec![
            hit("a", "Legs", "https://n/legs", "Squats", 0.9),
            hit("b", "Arms", "https://n/arms", "Curls", 0.8),
            hit("a", "Legs", "https://n/legs", "Lunges", 0.7),
        ];

        let answer = composer.compose("What on Monday?", &hits).await.unwrap();

        assert_eq!(answer.text, "Do squats on Monday.");
        let titles: Vec<_> = answer.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Legs", "Arms"]);
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], build_prompt("What on Monday?", &hits));
    }

    #[tokio::test]
    async fn test_compose_propagates_generation_failure() {
        let generator = Arc::new(RecordingGenerator {
            fail: true,
            ..Default::default()
        });
        let composer = AnswerComposer::new(generator);

        let result = composer.compose("q", &[]).await;
        assert!(matches!(
            result,
            Err(ComposeError::GenerateFailed(GenerateError::Timeout))
        ));
    }

    #[test]
    fn test_with_citations() {
        let answer = Answer {
            text: "Squats.".to_string(),
            sources: vec![
                hit("a", "Legs", "https://n/legs", "", 1.0).chunk.source_ref(),
                hit("b", "Local", "", "", 1.0).chunk.source_ref(),
            ],
        };

        assert_eq!(
            answer.with_citations(),
            "Squats.\n\n---\n**Sources:**\n- [Legs](https://n/legs)\n- Local\n"
        );
    }

    #[test]
    fn test_with_citations_without_sources() {
        let answer = Answer {
            text: "Nothing found.".to_string(),
            sources: Vec::new(),
        };
        assert_eq!(answer.with_citations(), "Nothing found.");
    }
}
