//! Parsers for the two line-oriented formats the model is asked to answer in.

pub const UNKNOWN_DOC_TYPE: &str = "desconocido";

const TYPE_PREFIX: &str = "TIPO:";
const CATEGORY_PREFIX: &str = "CATEGORÍA:";
const LANGUAGE_PREFIX: &str = "IDIOMA:";

const SUMMARY_HEADER: &str = "RESUMEN:";
const RISKS_HEADER: &str = "LETRA CHICA / RIESGOS:";
const ACTIONS_HEADER: &str = "PRÓXIMOS PASOS:";

/// Explanation length used when no summary bullet could be parsed.
pub const FALLBACK_EXPLANATION_CHARS: usize = 500;

const SUMMARY_BULLET: &str = "• ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentCategory {
    Legal,
    Administrative,
    Commercial,
}

impl DocumentCategory {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "LEGAL" => Some(Self::Legal),
            "ADMINISTRATIVO" => Some(Self::Administrative),
            "COMERCIAL" => Some(Self::Commercial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub doc_type: String,
    pub language: String,
    pub category: Option<DocumentCategory>,
}

/// Reads `TIPO:`, `CATEGORÍA:` and `IDIOMA:` lines.
///
/// Prefixes are case-sensitive and must start the line. A repeated prefix
/// overwrites the earlier value.
pub fn parse_classification(response: &str) -> Classification {
    let mut classification = Classification {
        doc_type: UNKNOWN_DOC_TYPE.to_string(),
        language: super::state::DEFAULT_LANGUAGE.to_string(),
        category: None,
    };

    for line in response.trim().lines() {
        if let Some(value) = line.strip_prefix(TYPE_PREFIX) {
            classification.doc_type = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix(LANGUAGE_PREFIX) {
            classification.language = value.trim().to_lowercase();
        } else if let Some(value) = line.strip_prefix(CATEGORY_PREFIX) {
            classification.category = DocumentCategory::parse(value);
        }
    }

    classification
}

/// Where the analysis parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    None,
    Summary,
    Risks,
    Actions,
}

impl Section {
    /// Returns the section a header line opens, if `line` is a header.
    pub fn from_header(line: &str) -> Option<Self> {
        if line.starts_with(SUMMARY_HEADER) {
            Some(Section::Summary)
        } else if line.starts_with(RISKS_HEADER) {
            Some(Section::Risks)
        } else if line.starts_with(ACTIONS_HEADER) {
            Some(Section::Actions)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub simplified_explanation: String,
    pub identified_risks: Vec<String>,
    pub action_items: Vec<String>,
}

/// Line-by-line state machine over the three-section answer.
#[derive(Debug)]
pub struct AnalysisParser {
    section: Section,
    summary: Vec<String>,
    risks: Vec<String>,
    actions: Vec<String>,
}

impl Default for AnalysisParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisParser {
    pub fn new() -> Self {
        Self {
            section: Section::None,
            summary: Vec::new(),
            risks: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    /// Feeds one line. Header lines switch section and are not kept.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim();

        if let Some(section) = Section::from_header(line) {
            self.section = section;
            return;
        }

        match self.section {
            Section::None => {}
            Section::Summary => {
                if starts_with_list_marker(line) {
                    let item = strip_numbered_marker(line);
                    if !item.is_empty() {
                        self.summary.push(format!("{SUMMARY_BULLET}{item}"));
                    }
                }
            }
            Section::Risks => {
                if let Some(item) = bullet_item(line) {
                    self.risks.push(item);
                }
            }
            Section::Actions => {
                if let Some(item) = bullet_item(line) {
                    self.actions.push(item);
                }
            }
        }
    }

    /// Finishes parsing. `response` supplies the fallback explanation when no
    /// summary line was recognised.
    pub fn finish(self, response: &str) -> Analysis {
        let simplified_explanation = if self.summary.is_empty() {
            crate::sanitize::truncate_chars(response.trim(), FALLBACK_EXPLANATION_CHARS)
                .to_string()
        } else {
            self.summary.join("\n")
        };

        Analysis {
            simplified_explanation,
            identified_risks: self.risks,
            action_items: self.actions,
        }
    }
}

pub fn parse_analysis(response: &str) -> Analysis {
    let response = response.trim();
    let mut parser = AnalysisParser::new();
    for line in response.lines() {
        parser.feed(line);
    }
    parser.finish(response)
}

fn starts_with_list_marker(line: &str) -> bool {
    matches!(line.chars().next(), Some(c) if c.is_ascii_digit() || c == '-' || c == '*')
}

fn strip_numbered_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | '*' | ' '))
        .trim()
}

fn bullet_item(line: &str) -> Option<String> {
    if !line.starts_with(['-', '*']) {
        return None;
    }
    let item = line.trim_start_matches(['-', '*', ' ']).trim();
    (!item.is_empty()).then(|| item.to_string())
}
