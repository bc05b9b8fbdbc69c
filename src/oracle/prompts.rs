//! Prompt text and strict JSON schemas for the four oracle capabilities,
//! plus the envelopes their answers decode into.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{Category, Classification, DraftTranslation, ExampleSentence};

/// Upper bound on synonyms kept from any answer.
pub const MAX_SYNONYMS: usize = 5;
/// Number of example sentences requested per short text.
pub const EXAMPLE_SENTENCE_COUNT: usize = 3;

/// The marker the classifier returns for non-understandable input.
pub const INVALID_INPUT: &str = "Invalid input";

/// A fully built structured-output request.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Schema name sent to the API; also used as a log label.
    pub name: &'static str,
    pub system: String,
    pub user: String,
    pub schema: Value,
}

const PREAMBLE: &str = "You are a linguistic expert. Process the user's input text \
following the instructions below and answer with JSON only.";

pub fn classify(text: &str) -> Prompt {
    Prompt {
        name: "language_and_category",
        system: format!(
            "{PREAMBLE}\n\n\
             Instructions:\n\
             1. Determine the language of the input text (English name, e.g. \"French\").\n\
             2. Determine its linguistic category: Word, Phrase, Sentence or Paragraph.\n\n\
             If the input is not understandable text (random characters, gibberish, empty), \
             answer {{ \"output\": {{ \"errorMessage\": \"{INVALID_INPUT}\" }} }} instead."
        ),
        user: text.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "output": {
                    "anyOf": [
                        {
                            "type": "object",
                            "properties": {
                                "language": { "type": "string" },
                                "category": {
                                    "type": "string",
                                    "enum": ["Word", "Phrase", "Sentence", "Paragraph"]
                                }
                            },
                            "required": ["language", "category"],
                            "additionalProperties": false
                        },
                        {
                            "type": "object",
                            "properties": {
                                "errorMessage": { "type": "string", "enum": [INVALID_INPUT] }
                            },
                            "required": ["errorMessage"],
                            "additionalProperties": false
                        }
                    ]
                }
            },
            "required": ["output"],
            "additionalProperties": false
        }),
    }
}

pub fn translate(
    text: &str,
    want_synonyms: bool,
    source_language: &str,
    target_language: &str,
) -> Prompt {
    let mut system = format!(
        "{PREAMBLE}\n\nInstructions:\n1. Translate the text from {source_language} into {target_language}."
    );
    let schema = if want_synonyms {
        system.push_str(&format!(
            "\n2. Give at most {MAX_SYNONYMS} synonyms of the translated text in {target_language}. \
             Use an empty list when there are none."
        ));
        json!({
            "type": "object",
            "properties": {
                "translation": { "type": "string" },
                "synonyms": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["translation", "synonyms"],
            "additionalProperties": false
        })
    } else {
        json!({
            "type": "object",
            "properties": { "translation": { "type": "string" } },
            "required": ["translation"],
            "additionalProperties": false
        })
    };
    Prompt {
        name: "translation",
        system,
        user: text.to_string(),
        schema,
    }
}

pub fn synonyms(text: &str, language: &str) -> Prompt {
    Prompt {
        name: "synonyms",
        system: format!(
            "{PREAMBLE}\n\nInstruction: give at most {MAX_SYNONYMS} synonyms of the input text \
             in {language}. Use an empty list when there are none."
        ),
        user: text.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "synonyms": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["synonyms"],
            "additionalProperties": false
        }),
    }
}

pub fn example_sentences(text: &str, source_language: &str, target_language: &str) -> Prompt {
    Prompt {
        name: "example_sentences",
        system: format!(
            "{PREAMBLE}\n\nInstructions:\n\
             1. Write {EXAMPLE_SENTENCE_COUNT} example sentences in {source_language} that use the input text.\n\
             2. Translate each example sentence into {target_language}."
        ),
        user: text.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "output": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sentence": { "type": "string" },
                            "translation": { "type": "string" }
                        },
                        "required": ["sentence", "translation"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["output"],
            "additionalProperties": false
        }),
    }
}

// --- Answer envelopes ---

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyEnvelope {
    output: ClassifyOutput,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyOutput {
    Detected {
        language: String,
        category: Category,
    },
    Rejected {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl From<ClassifyEnvelope> for Classification {
    fn from(envelope: ClassifyEnvelope) -> Self {
        match envelope.output {
            ClassifyOutput::Detected { language, category } => Classification::Detected {
                language: language.trim().to_string(),
                category,
            },
            ClassifyOutput::Rejected { error_message } => Classification::Rejected {
                message: error_message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranslationEnvelope {
    translation: String,
    #[serde(default)]
    synonyms: Vec<String>,
}

impl From<TranslationEnvelope> for DraftTranslation {
    fn from(envelope: TranslationEnvelope) -> Self {
        DraftTranslation {
            translation: envelope.translation,
            synonyms: clean_synonyms(envelope.synonyms),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SynonymsEnvelope {
    synonyms: Vec<String>,
}

impl From<SynonymsEnvelope> for Vec<String> {
    fn from(envelope: SynonymsEnvelope) -> Self {
        clean_synonyms(envelope.synonyms)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamplesEnvelope {
    output: Vec<ExampleSentence>,
}

impl From<ExamplesEnvelope> for Vec<ExampleSentence> {
    fn from(envelope: ExamplesEnvelope) -> Self {
        envelope
            .output
            .into_iter()
            .filter(|e| !e.sentence.trim().is_empty() && !e.translation.trim().is_empty())
            .take(EXAMPLE_SENTENCE_COUNT)
            .collect()
    }
}

/// Trim, drop blanks and duplicates, cap at `MAX_SYNONYMS`.
fn clean_synonyms(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len().min(MAX_SYNONYMS));
    for s in raw {
        let s = s.trim();
        if s.is_empty() || out.iter().any(|o| o == s) {
            continue;
        }
        out.push(s.to_string());
        if out.len() == MAX_SYNONYMS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_detected_classification() {
        let env: ClassifyEnvelope = serde_json::from_str(
            r#"{"output":{"language":"English ","category":"Word"}}"#,
        )
        .unwrap();
        assert_eq!(
            Classification::from(env),
            Classification::Detected {
                language: "English".into(),
                category: Category::Word
            }
        );
    }

    #[test]
    fn decodes_rejected_classification() {
        let env: ClassifyEnvelope =
            serde_json::from_str(r#"{"output":{"errorMessage":"Invalid input"}}"#).unwrap();
        assert_eq!(
            Classification::from(env),
            Classification::Rejected {
                message: INVALID_INPUT.into()
            }
        );
    }

    #[test]
    fn translation_without_synonyms_field() {
        let env: TranslationEnvelope = serde_json::from_str(r#"{"translation":"comer"}"#).unwrap();
        let draft = DraftTranslation::from(env);
        assert_eq!(draft.translation, "comer");
        assert!(draft.synonyms.is_empty());
    }

    #[test]
    fn synonyms_are_cleaned_and_capped() {
        let env: SynonymsEnvelope = serde_json::from_str(
            r#"{"synonyms":["dine"," dine ","","feast","consume","devour","munch","graze"]}"#,
        )
        .unwrap();
        let synonyms: Vec<String> = env.into();
        assert_eq!(synonyms, vec!["dine", "feast", "consume", "devour", "munch"]);
    }

    #[test]
    fn examples_are_capped_at_three() {
        let env: ExamplesEnvelope = serde_json::from_str(
            r#"{"output":[
                {"sentence":"a","translation":"A"},
                {"sentence":"b","translation":"B"},
                {"sentence":"","translation":"C"},
                {"sentence":"d","translation":"D"},
                {"sentence":"e","translation":"E"}]}"#,
        )
        .unwrap();
        let examples: Vec<ExampleSentence> = env.into();
        let sentences: Vec<&str> = examples.iter().map(|e| e.sentence.as_str()).collect();
        assert_eq!(sentences, vec!["a", "b", "d"]);
    }

    #[test]
    fn translate_schema_requires_synonyms_only_when_requested() {
        let with = translate("eat", true, "English", "Spanish");
        assert_eq!(with.schema["required"], json!(["translation", "synonyms"]));
        assert!(with.system.contains("synonyms"));

        let without = translate("eat", false, "English", "Spanish");
        assert_eq!(without.schema["required"], json!(["translation"]));
        assert!(!without.system.contains("synonyms"));
    }
}
