use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const DEFAULT_LORA_STRENGTH: f64 = 1.0;

/// A LoRA reference embedded in prompt text as `<lora:name:strength>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraRef {
    pub name: String,
    pub strength: f64,
    /// Exact text the reference was matched from. Only used to strip it from the prompt.
    #[serde(skip)]
    pub source_tag: String,
}

/// Result of pulling LoRA tags out of a positive prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoraExtraction {
    pub loras: Vec<LoraRef>,
    pub cleaned_prompt: String,
}

fn lora_tag_regex() -> &'static Regex {
    static LORA_TAG: OnceLock<Regex> = OnceLock::new();
    LORA_TAG.get_or_init(|| {
        Regex::new(r"(?i)<lora:([^:>]+)(?::([+-]?[0-9.]*))?>").expect("valid LoRA tag pattern")
    })
}

fn repeated_comma_regex() -> &'static Regex {
    static REPEATED_COMMA: OnceLock<Regex> = OnceLock::new();
    REPEATED_COMMA.get_or_init(|| Regex::new(r",(?:\s*,)+").expect("valid comma pattern"))
}

fn whitespace_run_regex() -> &'static Regex {
    static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Extracts every `<lora:...>` reference from the prompt, in order of appearance,
/// and returns the prompt with those tags removed.
///
/// Cleaning happens in three passes over the stripped text:
/// - runs of `, ,` collapse to a single `", "`
/// - whitespace runs collapse to a single space
/// - leading/trailing commas and spaces are trimmed
pub fn extract_loras(prompt: &str) -> LoraExtraction {
    let loras: Vec<LoraRef> = lora_tag_regex()
        .captures_iter(prompt)
        .filter_map(|captures| {
            let tag = captures.get(0)?;
            let name = captures.get(1)?.as_str().trim().to_string();
            let strength = captures
                .get(2)
                .map(|value| parse_strength(value.as_str()))
                .unwrap_or(DEFAULT_LORA_STRENGTH);
            Some(LoraRef {
                name,
                strength,
                source_tag: tag.as_str().to_string(),
            })
        })
        .collect();

    let mut stripped = prompt.to_string();
    for lora in &loras {
        stripped = stripped.replace(&lora.source_tag, "");
    }

    LoraExtraction {
        cleaned_prompt: normalize_stripped_prompt(&stripped),
        loras,
    }
}

fn parse_strength(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_LORA_STRENGTH)
}

fn normalize_stripped_prompt(prompt: &str) -> String {
    let collapsed_commas = repeated_comma_regex().replace_all(prompt, ", ");
    let collapsed_spaces = whitespace_run_regex().replace_all(&collapsed_commas, " ");
    collapsed_spaces
        .trim_matches(|c: char| c == ',' || c == ' ')
        .to_string()
}
