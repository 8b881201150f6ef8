use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const NO_TEXT_SENTINEL: &str = "No text could be extracted from this document.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub locator: String,
    pub label: Option<String>,
}

impl DocumentReference {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            label: None,
        }
    }

    pub fn with_label(locator: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            label: Some(label.into()),
        }
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label} ({})", self.locator),
            None => f.write_str(&self.locator),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PageSource {
    TextLayer,
    Ocr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedPage {
    pub page_number: u32,
    pub text: String,
    pub sourced_via: PageSource,
}

impl ExtractedPage {
    pub fn render(&self) -> String {
        match self.sourced_via {
            PageSource::TextLayer => format!("Page {}:\n{}\n\n", self.page_number, self.text),
            PageSource::Ocr => format!("Page {} (OCR):\n{}\n\n", self.page_number, self.text),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub pages: Vec<ExtractedPage>,
}

impl ExtractedDocument {
    pub fn to_text(&self) -> String {
        self.pages.iter().map(ExtractedPage::render).collect()
    }

    pub fn ocr_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.sourced_via == PageSource::Ocr)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub render_scale: f32,
    pub ocr_language: String,
    pub ocr_timeout: Option<Duration>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            ocr_language: "eng".to_string(),
            ocr_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    #[default]
    Default,
    GrandTest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub mode: SynthesisMode,
    pub q_count: usize,
}

impl SynthesisConfig {
    pub fn manual(q_count: usize) -> Self {
        Self {
            mode: SynthesisMode::Default,
            q_count,
        }
    }

    pub fn grand_test() -> Self {
        Self {
            mode: SynthesisMode::GrandTest,
            ..Self::default()
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::Default,
            q_count: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Mcq,
    ShortAnswer,
    Theory,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::ShortAnswer => "short_answer",
            QuestionKind::Theory => "theory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Mcq {
        id: String,
        question: String,
        options: Vec<String>,
        correct: String,
    },
    ShortAnswer {
        id: String,
        question: String,
        answer: String,
    },
    Theory {
        id: String,
        question: String,
        answer: String,
    },
}

impl Question {
    pub fn id(&self) -> &str {
        match self {
            Question::Mcq { id, .. }
            | Question::ShortAnswer { id, .. }
            | Question::Theory { id, .. } => id,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Question::Mcq { question, .. }
            | Question::ShortAnswer { question, .. }
            | Question::Theory { question, .. } => question,
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::Mcq { .. } => QuestionKind::Mcq,
            Question::ShortAnswer { .. } => QuestionKind::ShortAnswer,
            Question::Theory { .. } => QuestionKind::Theory,
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            Question::Mcq { options, .. } => options,
            Question::ShortAnswer { .. } | Question::Theory { .. } => &[],
        }
    }

    pub fn correct_answer(&self) -> &str {
        match self {
            Question::Mcq { correct, .. } => correct,
            Question::ShortAnswer { answer, .. } | Question::Theory { answer, .. } => answer,
        }
    }

    pub fn correct_index(&self) -> Option<usize> {
        match self {
            Question::Mcq {
                options, correct, ..
            } => options.iter().position(|option| option == correct),
            Question::ShortAnswer { .. } | Question::Theory { .. } => None,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        !matches!(self, Question::Mcq { .. })
    }
}

pub type QuestionSet = Vec<Question>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentOptions {
    pub advance_delay: Duration,
    pub min_questions: usize,
    pub max_questions: usize,
    pub default_questions: usize,
}

impl Default for AssessmentOptions {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(1_500),
            min_questions: 3,
            max_questions: 20,
            default_questions: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_headers_distinguish_text_layer_from_ocr() {
        let document = ExtractedDocument {
            pages: vec![
                ExtractedPage {
                    page_number: 1,
                    text: "alpha beta".to_string(),
                    sourced_via: PageSource::TextLayer,
                },
                ExtractedPage {
                    page_number: 2,
                    text: "scanned".to_string(),
                    sourced_via: PageSource::Ocr,
                },
            ],
        };

        assert_eq!(
            document.to_text(),
            "Page 1:\nalpha beta\n\nPage 2 (OCR):\nscanned\n\n"
        );
        assert_eq!(document.ocr_page_count(), 1);
    }

    #[test]
    fn question_serializes_with_type_tag() {
        let question = Question::ShortAnswer {
            id: "sa-0".to_string(),
            question: "Why?".to_string(),
            answer: "Because.".to_string(),
        };

        let value = serde_json::to_value(&question).expect("question should serialize");
        assert_eq!(value["type"], "short_answer");
        assert_eq!(value["answer"], "Because.");
    }

    #[test]
    fn correct_index_follows_option_order() {
        let question = Question::Mcq {
            id: "mcq-0".to_string(),
            question: "The _______ holds.".to_string(),
            options: vec![
                "Analysis".to_string(),
                "Framework".to_string(),
                "Variable".to_string(),
            ],
            correct: "Framework".to_string(),
        };

        assert_eq!(question.correct_index(), Some(1));
        assert!(!question.is_open_ended());
    }
}
