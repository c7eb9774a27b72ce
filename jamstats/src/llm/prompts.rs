//! Prompt templates for the query-understanding service.
//!
//! These templates use basic `format!()` interpolation for type safety.
//! Missing variables will cause compile-time errors.

/// System message sent with every intent-resolution request.
pub const INTENT_SYSTEM_PROMPT: &str = "You translate questions about a touring band's live history into structured JSON intents. You never answer the question yourself and you never invent statistics.";

/// Generate the intent-resolution prompt
///
/// Returns a prompt that asks the model to classify a question into one of
/// the catalog's intent kinds, extract its entities and propose a response
/// template using only the fields that kind can fill.
///
/// # Arguments
/// * `query` - The user's question, verbatim
/// * `context_summary` - Summary of recent turns in the session (may be empty)
/// * `capabilities` - The catalog's capability document as JSON text
/// * `strict` - Set on the retry after a malformed reply; adds a terse reminder
///   that only a single JSON object is accepted
///
/// # Example
/// ```
/// use jamstats::llm::prompts::intent_resolution_prompt;
///
/// let prompt = intent_resolution_prompt("What's the longest Tweezer ever?", "", "{}", false);
/// assert!(prompt.contains("longest Tweezer"));
/// assert!(!prompt.contains("STRICT"));
/// ```
pub fn intent_resolution_prompt(
    query: &str,
    context_summary: &str,
    capabilities: &str,
    strict: bool,
) -> String {
    let context = if context_summary.trim().is_empty() {
        "(no earlier questions in this conversation)".to_string()
    } else {
        context_summary.to_string()
    };

    let strict_block = if strict {
        r#"

STRICT: your previous reply could not be parsed. Reply with exactly one JSON object, no markdown fences, no commentary, no trailing text. Every key shown in the format below must be present; use null for entities that do not apply."#
    } else {
        ""
    };

    format!(
        r#"Classify the question below into exactly one intent kind from the capability document and extract its entities.

Capabilities:
{capabilities}

Recent conversation:
{context}

Question: {query}

Rules:
- "kind" must be one of the listed intent kinds. Use "compound" only for two or three independent questions and put each one in "parts".
- Copy song and venue names as the user wrote them; the system resolves nicknames itself.
- If the question leaves out a song, venue or date that an earlier question supplied ("what about in 2023?"), leave it null and list its role in "inherit".
- "response_template" is a sentence using {{placeholders}} drawn only from that kind's template_fields. Use null to accept the default.
- "confidence" is 0.0 to 1.0: how sure you are that the kind and entities are right.

Respond with valid JSON only. Example format:
{{
  "kind": "superlative-performance",
  "entities": {{
    "song": "Tweezer",
    "second_song": null,
    "venue": null,
    "start_date": null,
    "end_date": null,
    "year": null,
    "show_date": null,
    "country": null,
    "position": null,
    "threshold_minutes": null,
    "metric": "duration",
    "direction": "max",
    "limit": null,
    "percentile": null
  }},
  "inherit": [],
  "response_template": "The longest {{song}} ran {{duration}} at {{venue}} on {{date}}.",
  "confidence": 0.95,
  "parts": []
}}{strict_block}"#
    )
}

/// Summarize recent turns for the prompt, newest last.
///
/// # Example
/// ```
/// use jamstats::llm::prompts::context_summary_line;
///
/// let line = context_summary_line(1, "longest tweezer", "superlative-performance", &[("song", "Tweezer")]);
/// assert_eq!(line, "1. \"longest tweezer\" -> superlative-performance (song: Tweezer)");
/// ```
pub fn context_summary_line(
    index: usize,
    question: &str,
    kind: &str,
    entities: &[(&str, &str)],
) -> String {
    let entities = entities
        .iter()
        .map(|(role, value)| format!("{role}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    if entities.is_empty() {
        format!("{index}. \"{question}\" -> {kind}")
    } else {
        format!("{index}. \"{question}\" -> {kind} ({entities})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_resolution_prompt_format() {
        let prompt = intent_resolution_prompt(
            "What songs have never been played at MSG?",
            "",
            r#"{"intent_kinds": []}"#,
            false,
        );

        assert!(prompt.contains("never been played at MSG"));
        assert!(prompt.contains(r#"{"intent_kinds": []}"#));
        assert!(prompt.contains("no earlier questions"));
        assert!(prompt.contains(r#""kind""#));
        assert!(prompt.contains(r#""confidence""#));
        assert!(prompt.contains("{song}"));
        assert!(prompt.contains("valid JSON only"));
    }

    #[test]
    fn test_intent_resolution_prompt_includes_context() {
        let summary = "1. \"longest tweezer\" -> superlative-performance (song: Tweezer)";
        let prompt = intent_resolution_prompt("and in 2023?", summary, "{}", false);

        assert!(prompt.contains(summary));
        assert!(!prompt.contains("no earlier questions"));
        assert!(prompt.contains("inherit"));
    }

    #[test]
    fn test_strict_retry_prompt() {
        let prompt = intent_resolution_prompt("longest ghost", "", "{}", true);
        assert!(prompt.contains("STRICT"));
        assert!(prompt.contains("no markdown fences"));
    }

    #[test]
    fn test_context_summary_line_without_entities() {
        assert_eq!(
            context_summary_line(2, "how many shows", "show-count", &[]),
            "2. \"how many shows\" -> show-count"
        );
    }
}
