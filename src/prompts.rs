//! Prompts: answer framing for questions and transcription framing for OCR.
//!
//! Every piece of prompt text lives here so wording changes touch one file,
//! and so the builder can be unit-tested without a model behind it.
//!
//! [`PromptBuilder`] turns the stored transcript and a question into the
//! final prompt, applying the configured [`ContextPolicy`] and the
//! character budget.

use crate::config::{ContextPolicy, ServiceConfig, UnmatchedQuestion};
use crate::error::PdfQaError;
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Answer given by the model when the document does not contain the answer.
pub const FALLBACK_ANSWER: &str = "Sorry, I don't know based on the PDF.";

/// Prompt sent with a page image to a vision model for OCR.
pub const OCR_TRANSCRIPTION_PROMPT: &str = "Transcribe all text visible in this scanned page exactly as written. \
Preserve reading order and line breaks. Output ONLY the transcribed text, with no commentary. \
If the page contains no text, output nothing.";

const UNRELATED_NOTE: &str =
    "Note: the question does not appear to relate to the uploaded PDF, so its content is not included.";

/// How the transcript was treated for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextDecision {
    /// The transcript (or its first `chars` characters) was included.
    Included { chars: usize, truncated: bool },
    /// The question failed the keyword gate; no document content was sent.
    Omitted,
    /// The question failed the keyword gate; an "unrelated" note was sent instead.
    NotedUnrelated,
}

/// A prompt ready for the inference relay.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub context: ContextDecision,
}

/// Builds prompts from the stored transcript and a question.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget: usize,
    gate: Option<(Regex, UnmatchedQuestion)>,
}

impl PromptBuilder {
    /// Compile the configured policy. Fails only on a keyword list that
    /// cannot form a regex (e.g. every entry blank).
    pub fn new(policy: &ContextPolicy, budget: usize) -> Result<Self, PdfQaError> {
        let gate = match policy {
            ContextPolicy::Bounded => None,
            ContextPolicy::KeywordGated(gate) => {
                let alternatives: Vec<String> = gate
                    .keywords
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty())
                    .map(regex::escape)
                    .collect();
                if alternatives.is_empty() {
                    return Err(PdfQaError::InvalidConfig(
                        "Keyword-gated context needs at least one keyword".into(),
                    ));
                }
                // Non-word neighbours instead of \b so keywords like "c++" still match.
                let pattern = format!(r"(?:^|\W)(?:{})(?:\W|$)", alternatives.join("|"));
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| PdfQaError::InvalidConfig(format!("Keyword pattern: {e}")))?;
                Some((re, gate.on_miss))
            }
        };
        Ok(Self {
            budget: budget.max(1),
            gate,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PdfQaError> {
        Self::new(&config.context_policy, config.context_char_budget)
    }

    /// True when the question passes the keyword gate (always true when ungated).
    pub fn is_relevant(&self, question: &str) -> bool {
        match &self.gate {
            None => true,
            Some((re, _)) => re.is_match(question),
        }
    }

    /// Build the prompt for `question` over `transcript`.
    pub fn build(&self, transcript: &str, question: &str) -> Prompt {
        let question = question.trim();

        if let Some((_, on_miss)) = &self.gate {
            if !self.is_relevant(question) {
                debug!("Question failed keyword gate ({:?})", on_miss);
                return match on_miss {
                    UnmatchedQuestion::OmitContext => Prompt {
                        text: omitted_prompt(question),
                        context: ContextDecision::Omitted,
                    },
                    UnmatchedQuestion::NoteUnrelated => Prompt {
                        text: unrelated_prompt(question),
                        context: ContextDecision::NotedUnrelated,
                    },
                };
            }
        }

        let (context, truncated) = truncate_chars(transcript.trim(), self.budget);
        let chars = context.chars().count();
        debug!("Prompt context: {} chars (truncated: {})", chars, truncated);

        Prompt {
            text: grounded_prompt(context, question),
            context: ContextDecision::Included { chars, truncated },
        }
    }
}

/// Return at most `max_chars` characters of `s`, cut on a char boundary,
/// and whether anything was dropped.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&s[..byte_idx], true),
        None => (s, false),
    }
}

fn grounded_prompt(content: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Use ONLY the following PDF content to answer the user's question.\n\n\
PDF Content:\n\"\"\"\n{content}\n\"\"\"\n\n\
If the answer is not clearly found in the above text, just respond with: \"{FALLBACK_ANSWER}\"\n\n\
Now answer this question:\n{question}\n"
    )
}

fn omitted_prompt(question: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about a PDF the user uploaded.\n\
Answer only with information from that document. If you cannot, just respond with: \"{FALLBACK_ANSWER}\"\n\n\
Now answer this question:\n{question}\n"
    )
}

fn unrelated_prompt(question: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about a PDF the user uploaded.\n\
{UNRELATED_NOTE}\n\
Confine your answer to the document. If you cannot, just respond with: \"{FALLBACK_ANSWER}\"\n\n\
Now answer this question:\n{question}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordGate;

    fn gated(on_miss: UnmatchedQuestion) -> PromptBuilder {
        let gate = KeywordGate::from_list("work, skills, acme corp", on_miss);
        PromptBuilder::new(&ContextPolicy::KeywordGated(gate), 100).unwrap()
    }

    #[test]
    fn bounded_includes_transcript_and_question() {
        let b = PromptBuilder::new(&ContextPolicy::Bounded, 4000).unwrap();
        let p = b.build("Suman worked at Acme Corp\n", "Where did Suman work?");
        assert!(p.text.contains("Use ONLY the following PDF content"));
        assert!(p.text.contains("Suman worked at Acme Corp"));
        assert!(p.text.contains("Where did Suman work?"));
        assert!(p.text.contains(FALLBACK_ANSWER));
        assert_eq!(
            p.context,
            ContextDecision::Included {
                chars: 25,
                truncated: false
            }
        );
    }

    #[test]
    fn bounded_truncates_to_budget() {
        let b = PromptBuilder::new(&ContextPolicy::Bounded, 10).unwrap();
        let p = b.build("0123456789ABCDEF", "q?");
        assert!(p.text.contains("0123456789"));
        assert!(!p.text.contains("ABCDEF"));
        assert_eq!(
            p.context,
            ContextDecision::Included {
                chars: 10,
                truncated: true
            }
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let (s, cut) = truncate_chars("héllo wörld", 4);
        assert_eq!(s, "héll");
        assert!(cut);
        let (s, cut) = truncate_chars("日本語", 5);
        assert_eq!(s, "日本語");
        assert!(!cut);
    }

    #[test]
    fn gate_matches_whole_words_case_insensitively() {
        let b = gated(UnmatchedQuestion::OmitContext);
        assert!(b.is_relevant("Where did she WORK?"));
        assert!(b.is_relevant("What are her skills"));
        assert!(b.is_relevant("When did she join Acme Corp?"));
        assert!(!b.is_relevant("Is the network down?"));
        assert!(!b.is_relevant("What is the capital of France?"));
    }

    #[test]
    fn gate_hit_includes_context() {
        let b = gated(UnmatchedQuestion::OmitContext);
        let p = b.build("Suman worked at Acme Corp", "Where did Suman work?");
        assert!(p.text.contains("Suman worked at Acme Corp"));
        assert!(matches!(p.context, ContextDecision::Included { .. }));
    }

    #[test]
    fn gate_miss_omits_context() {
        let b = gated(UnmatchedQuestion::OmitContext);
        let p = b.build("Suman worked at Acme Corp", "What is the capital of France?");
        assert_eq!(p.context, ContextDecision::Omitted);
        assert!(!p.text.contains("Acme"));
        assert!(p.text.contains("What is the capital of France?"));
    }

    #[test]
    fn gate_miss_notes_unrelated() {
        let b = gated(UnmatchedQuestion::NoteUnrelated);
        let p = b.build("Suman worked at Acme Corp", "What is the capital of France?");
        assert_eq!(p.context, ContextDecision::NotedUnrelated);
        assert!(p.text.contains("does not appear to relate"));
        assert!(!p.text.contains("Acme"));
        assert!(p.text.contains("capital of France"));
    }

    #[test]
    fn keywords_with_regex_metacharacters_are_literal() {
        let gate = KeywordGate::from_list("c++, .net", UnmatchedQuestion::OmitContext);
        let b = PromptBuilder::new(&ContextPolicy::KeywordGated(gate), 100).unwrap();
        assert!(b.is_relevant("does she know c++ well"));
        assert!(!b.is_relevant("does she know cxx well"));
    }

    #[test]
    fn blank_keyword_list_rejected() {
        let gate = KeywordGate {
            keywords: vec!["  ".into()],
            on_miss: UnmatchedQuestion::OmitContext,
        };
        assert!(PromptBuilder::new(&ContextPolicy::KeywordGated(gate), 100).is_err());
    }
}
