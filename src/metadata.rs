use crate::error::ExtractError;
use crate::lora::{extract_loras, LoraRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const DEFAULT_STEPS: i64 = 20;
pub const DEFAULT_CFG_SCALE: f64 = 7.0;
pub const DEFAULT_SAMPLER: &str = "Euler a";
pub const DEFAULT_SCHEDULER: &str = "normal";
pub const DEFAULT_SEED: i64 = -1;
pub const DEFAULT_SIZE: &str = "512x512";

/// A numeric metadata value.
///
/// Values that matched their label but failed numeric coercion (e.g. `Seed: 99999999999999999999`
/// overflowing `i64`, or `CFG scale: 7.5.1`) are kept verbatim as `Raw` instead of being replaced
/// by the default. Serializes untagged: a number for `Typed`, a string for `Raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue<T> {
    Typed(T),
    Raw(String),
}

impl<T: Copy> FieldValue<T> {
    pub fn typed(&self) -> Option<T> {
        match self {
            Self::Typed(value) => Some(*value),
            Self::Raw(_) => None,
        }
    }
}

impl<T: FromStr> FieldValue<T> {
    /// Coerces `raw` into `T`, falling back to the raw text when that fails.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        trimmed
            .parse::<T>()
            .map(Self::Typed)
            .unwrap_or_else(|_| Self::Raw(trimmed.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for FieldValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(value) => value.fmt(f),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl<T: Serialize> FieldValue<T> {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Generation parameters extracted from A1111/Civitai caption text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedParameters {
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub steps: FieldValue<i64>,
    pub cfg_scale: FieldValue<f64>,
    pub sampler: String,
    pub scheduler: String,
    pub seed: FieldValue<i64>,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vae: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<FieldValue<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<FieldValue<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<FieldValue<f64>>,
    pub loras: Vec<LoraRef>,
}

impl Default for ParsedParameters {
    fn default() -> Self {
        Self {
            positive_prompt: String::new(),
            negative_prompt: String::new(),
            steps: FieldValue::Typed(DEFAULT_STEPS),
            cfg_scale: FieldValue::Typed(DEFAULT_CFG_SCALE),
            sampler: DEFAULT_SAMPLER.to_string(),
            scheduler: DEFAULT_SCHEDULER.to_string(),
            seed: FieldValue::Typed(DEFAULT_SEED),
            size: DEFAULT_SIZE.to_string(),
            model: None,
            vae: None,
            clip_skip: None,
            eta: None,
            denoising_strength: None,
            loras: Vec::new(),
        }
    }
}

impl ParsedParameters {
    /// LoRA references found in the positive prompt, in order of first appearance.
    pub fn loras(&self) -> &[LoraRef] {
        &self.loras
    }

    /// The whole record as one structured JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Integer,
    Float,
    Size,
    Text,
}

impl Capture {
    fn pattern(self) -> &'static str {
        match self {
            Self::Integer => r"([0-9]+)",
            Self::Float => r"([0-9.]+)",
            Self::Size => r"([0-9]+x[0-9]+)",
            Self::Text => r"([^,\n]+)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Steps,
    CfgScale,
    Sampler,
    ScheduleType,
    Seed,
    Size,
    Model,
    Vae,
    ClipSkip,
    Eta,
    DenoisingStrength,
}

/// Recognized `Label: value` parameters and the shape of their captured value.
const FIELD_LABELS: &[(Field, &str, Capture)] = &[
    (Field::Steps, "Steps", Capture::Integer),
    (Field::CfgScale, "CFG scale", Capture::Float),
    (Field::Sampler, "Sampler", Capture::Text),
    (Field::ScheduleType, "Schedule type", Capture::Text),
    (Field::Seed, "Seed", Capture::Integer),
    (Field::Size, "Size", Capture::Size),
    (Field::Model, "Model", Capture::Text),
    (Field::Vae, "VAE", Capture::Text),
    (Field::ClipSkip, "Clip skip", Capture::Integer),
    (Field::Eta, "Eta", Capture::Float),
    (Field::DenoisingStrength, "Denoising strength", Capture::Float),
];

struct FieldPattern {
    field: Field,
    regex: Regex,
}

fn compile_field_patterns() -> Result<Vec<FieldPattern>, ExtractError> {
    FIELD_LABELS
        .iter()
        .map(|(field, label, capture)| {
            let pattern = format!(r"(?i){}:\s*{}", regex::escape(label), capture.pattern());
            Regex::new(&pattern)
                .map(|regex| FieldPattern {
                    field: *field,
                    regex,
                })
                .map_err(|error| ExtractError::Pattern {
                    field: label.to_string(),
                    message: error.to_string(),
                })
        })
        .collect()
}

fn field_patterns() -> Result<&'static [FieldPattern], ExtractError> {
    static PATTERNS: OnceLock<Result<Vec<FieldPattern>, ExtractError>> = OnceLock::new();
    PATTERNS
        .get_or_init(compile_field_patterns)
        .as_deref()
        .map_err(Clone::clone)
}

fn section_boundary_regex() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        Regex::new(r"(?i)negative prompt:|steps:").expect("valid section boundary pattern")
    })
}

fn prompt_label_regex() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| {
        Regex::new(r"(?i)^(?:prompt:|positive prompt:)").expect("valid prompt label pattern")
    })
}

fn negative_section_regex() -> &'static Regex {
    static NEGATIVE: OnceLock<Regex> = OnceLock::new();
    NEGATIVE.get_or_init(|| {
        Regex::new(r"(?is)negative prompt:\s*(.*?)(?:steps:|$)")
            .expect("valid negative prompt pattern")
    })
}

/// Parses free-form A1111/Civitai metadata into [`ParsedParameters`].
///
/// Never fails: internal faults are logged and yield the defaults record.
pub fn extract(text: &str) -> ParsedParameters {
    match try_extract(text) {
        Ok(params) => params,
        Err(error) => {
            log::warn!("Metadata extraction failed, using defaults: {}", error);
            ParsedParameters::default()
        }
    }
}

/// Fallible form of [`extract`].
///
/// Format: `{prompt}\nNegative prompt: {neg}\nSteps: N, Sampler: X, ...`
///
/// Every labeled parameter is searched independently over the whole text, so the
/// parameter block may sit on the same line as the prompt or be split across lines.
pub fn try_extract(text: &str) -> Result<ParsedParameters, ExtractError> {
    let mut params = ParsedParameters::default();

    let text = text.trim();
    if text.is_empty() {
        return Ok(params);
    }

    let positive = extract_positive_section(text);
    let extraction = extract_loras(&positive);
    params.positive_prompt = extraction.cleaned_prompt;
    params.loras = extraction.loras;

    if let Some(negative) = extract_negative_section(text) {
        params.negative_prompt = negative;
    }

    for pattern in field_patterns()? {
        let Some(value) = pattern
            .regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|value| value.as_str().trim())
        else {
            continue;
        };
        apply_field(&mut params, pattern.field, value);
    }

    log::debug!(
        "Extracted metadata: {} LoRA(s), steps={}, sampler={}, size={}",
        params.loras.len(),
        params.steps,
        params.sampler,
        params.size
    );

    Ok(params)
}

fn extract_positive_section(text: &str) -> String {
    let end = section_boundary_regex()
        .find(text)
        .map(|boundary| boundary.start())
        .unwrap_or(text.len());
    let section = text[..end].trim();
    prompt_label_regex().replace(section, "").trim().to_string()
}

fn extract_negative_section(text: &str) -> Option<String> {
    negative_section_regex()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|negative| negative.as_str().trim().to_string())
}

fn apply_field(params: &mut ParsedParameters, field: Field, value: &str) {
    match field {
        Field::Steps => params.steps = FieldValue::coerce(value),
        Field::CfgScale => params.cfg_scale = FieldValue::coerce(value),
        Field::Sampler => params.sampler = value.to_string(),
        Field::ScheduleType => params.scheduler = value.to_string(),
        Field::Seed => params.seed = FieldValue::coerce(value),
        Field::Size => params.size = value.to_string(),
        Field::Model => params.model = Some(value.to_string()),
        Field::Vae => params.vae = Some(value.to_string()),
        Field::ClipSkip => params.clip_skip = Some(FieldValue::coerce(value)),
        Field::Eta => params.eta = Some(FieldValue::coerce(value)),
        Field::DenoisingStrength => params.denoising_strength = Some(FieldValue::coerce(value)),
    }
}
