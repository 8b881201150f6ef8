use crate::error::ExportError;
use crate::models::{Flashcard, Question};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const CARD_SEPARATOR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashcardFormat {
    Json,
    Csv,
    Txt,
}

impl FromStr for FlashcardFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "txt" => Ok(Self::Txt),
            _ => Err(ExportError::UnsupportedFormat {
                kind: "flashcard",
                format: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFormat {
    Json,
    Csv,
    AnswerKey,
}

impl FromStr for TestFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "answer_key" => Ok(Self::AnswerKey),
            _ => Err(ExportError::UnsupportedFormat {
                kind: "test",
                format: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub content: String,
}

pub fn export_flashcards(
    cards: &[Flashcard],
    format: FlashcardFormat,
    filename: &str,
) -> Result<ExportArtifact, ExportError> {
    let artifact = match format {
        FlashcardFormat::Json => ExportArtifact {
            file_name: format!("{filename}.json"),
            mime_type: "application/json",
            content: serde_json::to_string_pretty(cards)?,
        },
        FlashcardFormat::Csv => ExportArtifact {
            file_name: format!("{filename}.csv"),
            mime_type: "text/csv",
            content: to_csv(
                &["question", "answer"],
                cards
                    .iter()
                    .map(|card| vec![card.question.as_str(), card.answer.as_str()]),
            ),
        },
        FlashcardFormat::Txt => ExportArtifact {
            file_name: format!("{filename}.txt"),
            mime_type: "text/plain",
            content: cards
                .iter()
                .enumerate()
                .map(|(index, card)| {
                    format!(
                        "Card {}:\nQ: {}\nA: {}\n{}\n",
                        index + 1,
                        card.question,
                        card.answer,
                        "-".repeat(CARD_SEPARATOR_WIDTH)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        },
    };
    Ok(artifact)
}

pub fn export_test(
    questions: &[Question],
    format: TestFormat,
    filename: &str,
) -> Result<ExportArtifact, ExportError> {
    let artifact = match format {
        TestFormat::Json => ExportArtifact {
            file_name: format!("{filename}.json"),
            mime_type: "application/json",
            content: serde_json::to_string_pretty(questions)?,
        },
        TestFormat::Csv => ExportArtifact {
            file_name: format!("{filename}.csv"),
            mime_type: "text/csv",
            content: to_csv(
                &[
                    "question",
                    "option_a",
                    "option_b",
                    "option_c",
                    "option_d",
                    "correct_answer",
                    "type",
                ],
                questions.iter().map(|question| {
                    let options = question.options();
                    let slot = |index: usize| options.get(index).map(String::as_str).unwrap_or("");
                    vec![
                        question.prompt(),
                        slot(0),
                        slot(1),
                        slot(2),
                        slot(3),
                        question.correct_answer(),
                        question.kind().as_str(),
                    ]
                }),
            ),
        },
        TestFormat::AnswerKey => ExportArtifact {
            file_name: format!("{filename}_answer_key.txt"),
            mime_type: "text/plain",
            content: questions
                .iter()
                .enumerate()
                .map(|(index, question)| {
                    let letter = option_letter(question.correct_index().unwrap_or(0));
                    format!("{}. {letter} - {}", index + 1, question.correct_answer())
                })
                .collect::<Vec<_>>()
                .join("\n"),
        },
    };
    Ok(artifact)
}

pub fn option_letter(index: usize) -> char {
    char::from_u32('A' as u32 + index as u32).unwrap_or('?')
}

pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(',') || value.contains('"') {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn to_csv<'a, I>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    let mut lines = vec![headers.join(",")];
    lines.extend(rows.into_iter().map(|row| {
        row.iter()
            .map(|value| csv_field(value))
            .collect::<Vec<_>>()
            .join(",")
    }));
    lines.join("\n")
}

pub trait FileSink {
    fn deliver(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError>;
}

pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSink for DirectorySink {
    fn deliver(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(&artifact.file_name);
        fs::write(&path, &artifact.content)?;
        info!(path = %path.display(), mime = artifact.mime_type, "export written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::default_question_deck;

    fn cards() -> Vec<Flashcard> {
        vec![
            Flashcard::new("A, \"quoted\", thing", "plain"),
            Flashcard::new("What is a quorum?", "The minimum number of members present."),
        ]
    }

    #[test]
    fn flashcard_json_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let artifact = export_flashcards(&cards(), FlashcardFormat::Json, "deck")?;
        let parsed: Vec<Flashcard> = serde_json::from_str(&artifact.content)?;

        assert_eq!(parsed, cards());
        assert_eq!(artifact.file_name, "deck.json");
        assert_eq!(artifact.mime_type, "application/json");
        Ok(())
    }

    #[test]
    fn flashcard_csv_quotes_commas_and_quotes() -> Result<(), Box<dyn std::error::Error>> {
        let artifact = export_flashcards(&cards(), FlashcardFormat::Csv, "deck")?;
        let lines = artifact.content.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "question,answer");
        assert_eq!(lines[1], "\"A, \"\"quoted\"\", thing\",plain");
        assert_eq!(lines[2], "What is a quorum?,The minimum number of members present.");
        Ok(())
    }

    #[test]
    fn flashcard_txt_numbers_each_card() -> Result<(), Box<dyn std::error::Error>> {
        let artifact = export_flashcards(&cards()[1..], FlashcardFormat::Txt, "deck")?;
        assert_eq!(
            artifact.content,
            format!(
                "Card 1:\nQ: What is a quorum?\nA: The minimum number of members present.\n{}\n",
                "-".repeat(50)
            )
        );
        Ok(())
    }

    #[test]
    fn test_csv_leaves_missing_option_slots_empty() -> Result<(), Box<dyn std::error::Error>> {
        let deck = default_question_deck();
        let artifact = export_test(&deck[1..2], TestFormat::Csv, "test")?;

        assert_eq!(
            artifact.content,
            "question,option_a,option_b,option_c,option_d,correct_answer,type\n\
             Which body approves the budget?,The Executive,The Legislature,The Media,,The Legislature,mcq"
        );
        Ok(())
    }

    #[test]
    fn answer_key_uses_option_letters() -> Result<(), Box<dyn std::error::Error>> {
        let mut questions = default_question_deck();
        questions.push(Question::Theory {
            id: "th-0".to_string(),
            question: "Discuss.".to_string(),
            answer: "Power is divided.".to_string(),
        });
        let artifact = export_test(&questions, TestFormat::AnswerKey, "test")?;

        assert_eq!(artifact.file_name, "test_answer_key.txt");
        assert_eq!(
            artifact.content,
            "1. B - Everyone is subject to the law\n\
             2. B - The Legislature\n\
             3. B - Rule by the people\n\
             4. A - Power is divided."
        );
        Ok(())
    }

    #[test]
    fn test_json_keeps_the_tagged_shape() -> Result<(), Box<dyn std::error::Error>> {
        let deck = default_question_deck();
        let artifact = export_test(&deck, TestFormat::Json, "test")?;
        let parsed: Vec<Question> = serde_json::from_str(&artifact.content)?;
        assert_eq!(parsed, deck);
        assert!(artifact.content.contains("\"type\": \"mcq\""));
        Ok(())
    }

    #[test]
    fn unknown_formats_are_rejected() {
        assert!(matches!(
            "pdf".parse::<FlashcardFormat>(),
            Err(ExportError::UnsupportedFormat { kind: "flashcard", .. })
        ));
        assert!(matches!(
            "txt".parse::<TestFormat>(),
            Err(ExportError::UnsupportedFormat { kind: "test", .. })
        ));
        assert_eq!("ANSWER_KEY".parse::<TestFormat>().ok(), Some(TestFormat::AnswerKey));
    }

    #[test]
    fn directory_sink_writes_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sink = DirectorySink::new(dir.path().join("exports"));
        let artifact = export_flashcards(&cards(), FlashcardFormat::Txt, "deck")?;

        let path = sink.deliver(&artifact)?;
        assert_eq!(fs::read_to_string(path)?, artifact.content);
        Ok(())
    }
}
