//! Heuristic check deciding whether OCR output is worth sending to a model.

use std::collections::HashSet;

/// Characters stripped from both ends of a word before vocabulary counting.
const WORD_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\''];

/// The individual checks, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    TooShort,
    TooFewWords,
    TooNoisy,
    RepeatedCharacters,
    LowVocabulary,
}

impl QualityCheck {
    /// User-facing explanation of the rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            QualityCheck::TooShort => "Lo siento, el texto extraído de la imagen es demasiado corto o está vacío. Por favor, toma una foto más clara del documento completo, asegurándote de que todo el texto sea visible y legible.",
            QualityCheck::TooFewWords => "El texto extraído parece ser muy corto o incompleto. Por favor, intenta tomar una foto más nítida del documento, asegurándote de capturar todo el contenido visible.",
            QualityCheck::TooNoisy => "El texto extraído parece contener demasiados caracteres especiales o no es legible. Por favor, toma una foto más clara del documento, con buena iluminación y sin reflejos.",
            QualityCheck::RepeatedCharacters => "El texto extraído parece contener ruido o caracteres repetidos. Por favor, intenta tomar una foto más nítida del documento, evitando sombras y asegurándote de que el texto esté bien enfocado.",
            QualityCheck::LowVocabulary => "El texto extraído parece ser muy repetitivo o no contiene suficiente información. Por favor, toma una foto del documento completo, asegurándote de capturar todo el contenido.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub ok: bool,
    /// Empty when `ok`.
    pub reason: String,
    pub failed_check: Option<QualityCheck>,
}

impl GateResult {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: String::new(),
            failed_check: None,
        }
    }

    fn reject(check: QualityCheck) -> Self {
        Self {
            ok: false,
            reason: check.reason().to_string(),
            failed_check: Some(check),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextQualityGate {
    pub min_chars: usize,
    pub min_words: usize,
    pub min_alphanumeric_ratio: f64,
    /// Longest run of one repeated character still accepted.
    pub max_char_run: usize,
    pub min_distinct_words: usize,
}

impl Default for TextQualityGate {
    fn default() -> Self {
        Self {
            min_chars: 50,
            min_words: 10,
            min_alphanumeric_ratio: 0.5,
            max_char_run: 5,
            min_distinct_words: 5,
        }
    }
}

impl TextQualityGate {
    /// Runs the checks in order and stops at the first failure.
    pub fn evaluate(&self, raw_text: &str) -> GateResult {
        let text = raw_text.trim();

        let total_chars = text.chars().count();
        if total_chars < self.min_chars {
            return GateResult::reject(QualityCheck::TooShort);
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() < self.min_words {
            return GateResult::reject(QualityCheck::TooFewWords);
        }

        let readable = text
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .count();
        if (readable as f64 / total_chars as f64) < self.min_alphanumeric_ratio {
            return GateResult::reject(QualityCheck::TooNoisy);
        }

        if longest_char_run(text) > self.max_char_run {
            return GateResult::reject(QualityCheck::RepeatedCharacters);
        }

        if distinct_words(&words) < self.min_distinct_words {
            return GateResult::reject(QualityCheck::LowVocabulary);
        }

        GateResult::pass()
    }
}

fn longest_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars() {
        if Some(c) == previous {
            current += 1;
        } else {
            previous = Some(c);
            current = 1;
        }
        longest = longest.max(current);
    }
    longest
}

fn distinct_words(words: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.trim_matches(WORD_PUNCTUATION).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<HashSet<_>>()
        .len()
}
