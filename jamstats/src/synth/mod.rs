//! Renders an [`AggregationResult`] into the fixed answer shape.

mod card;
mod related;

use crate::error::SynthesisFailure;
use crate::format;
use crate::models::{render_template, AggregationResult, Answer, Card, FieldValue, Intent, IntentKind};

/// Display form of a field: durations as `mm:ss`, dates as `Dec 31, 1995`.
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Count(n) => n.to_string(),
        FieldValue::DurationMs(ms) => format::duration(*ms),
        FieldValue::Date(d) => format::date(*d),
        FieldValue::Ratio(r) => format::ratio(*r),
        FieldValue::List(items) => format::list(items),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerSynthesizer;

impl AnswerSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        intent: &Intent,
        result: &AggregationResult,
    ) -> Result<Answer, SynthesisFailure> {
        if intent.kind == IntentKind::Compound {
            return self.synthesize_compound(intent, result);
        }

        let template = if intent.response_template.is_empty() {
            intent.default_template()
        } else {
            intent.response_template.as_str()
        };
        let text = render_template(template, |name| result.field(name).map(render_value))
            .map_err(SynthesisFailure::TemplateFieldMissing)?;

        let highlight = result
            .field(card::headline_field(intent, result))
            .map(render_value)
            .filter(|value| !value.is_empty() && text.contains(value.as_str()));

        let mut warnings: Vec<String> = result.warnings.iter().map(|w| w.message()).collect();
        warnings.dedup();

        Ok(Answer {
            answer: text,
            highlight,
            card: card::build(intent, result, card::context_line(result)),
            related: related::related_queries(intent),
            warnings,
        })
    }

    /// Parts answered in question order; the card belongs to the first part.
    fn synthesize_compound(
        &self,
        intent: &Intent,
        result: &AggregationResult,
    ) -> Result<Answer, SynthesisFailure> {
        let answers = intent
            .parts
            .iter()
            .zip(&result.parts)
            .map(|(part, part_result)| self.synthesize(part, part_result))
            .collect::<Result<Vec<_>, _>>()?;

        let mut related = Vec::new();
        let mut warnings = Vec::new();
        for answer in &answers {
            for q in &answer.related {
                if !related.contains(q) {
                    related.push(q.clone());
                }
            }
            for w in &answer.warnings {
                if !warnings.contains(w) {
                    warnings.push(w.clone());
                }
            }
        }
        related.truncate(3);

        let mut parts = answers.into_iter();
        let Some(first) = parts.next() else {
            return Ok(Answer {
                answer: String::new(),
                highlight: None,
                card: Card {
                    title: String::new(),
                    stat: String::new(),
                    subtitle: String::new(),
                    context: None,
                },
                related,
                warnings,
            });
        };

        let mut text = first.answer;
        for part in parts {
            text.push(' ');
            text.push_str(&part.answer);
        }

        Ok(Answer {
            answer: text,
            highlight: first.highlight,
            card: first.card,
            related,
            warnings,
        })
    }
}
