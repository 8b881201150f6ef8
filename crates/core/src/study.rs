use crate::aggregate::aggregate;
use crate::assessment::AssessmentSession;
use crate::catalog::GrandTestSources;
use crate::error::{AggregationError, SessionError};
use crate::extractor::TextExtractor;
use crate::flashcards::FlashcardDeck;
use crate::models::{AssessmentOptions, DocumentReference, NO_TEXT_SENTINEL};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

const GRAND_TEST_NOTES_KEY: &str = "grand_test";

#[derive(Debug, Clone)]
pub enum StudyTarget {
    Document {
        reference: DocumentReference,
        title: Option<String>,
    },
    Course {
        course_code: String,
        sources: GrandTestSources,
    },
    GrandTest {
        course_code: String,
        sources: GrandTestSources,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Analyzing,
    Ready(String),
    Failed(String),
}

pub struct StudySession {
    target: StudyTarget,
    analysis: AnalysisState,
    deck: FlashcardDeck,
    assessment: AssessmentSession,
}

impl StudySession {
    pub fn new(target: StudyTarget, options: AssessmentOptions) -> Self {
        let assessment = match &target {
            StudyTarget::Document { .. } | StudyTarget::Course { .. } => {
                AssessmentSession::manual(options)
            }
            StudyTarget::GrandTest { .. } => AssessmentSession::grand_test(options),
        };

        Self {
            target,
            analysis: AnalysisState::Idle,
            deck: FlashcardDeck::from_corpus(None),
            assessment,
        }
    }

    pub fn target(&self) -> &StudyTarget {
        &self.target
    }

    pub fn analysis(&self) -> &AnalysisState {
        &self.analysis
    }

    pub fn deck(&self) -> &FlashcardDeck {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut FlashcardDeck {
        &mut self.deck
    }

    pub fn assessment(&self) -> &AssessmentSession {
        &self.assessment
    }

    pub fn assessment_mut(&mut self) -> &mut AssessmentSession {
        &mut self.assessment
    }

    pub fn into_assessment(self) -> AssessmentSession {
        self.assessment
    }

    pub fn is_grand_test(&self) -> bool {
        matches!(self.target, StudyTarget::GrandTest { .. })
    }

    pub fn title(&self) -> String {
        match &self.target {
            StudyTarget::Document { title, .. } => title
                .clone()
                .unwrap_or_else(|| "Document Study".to_string()),
            StudyTarget::Course { course_code, .. } => course_code.clone(),
            StudyTarget::GrandTest { course_code, .. } => format!("{course_code} - Grand Test"),
        }
    }

    pub fn corpus(&self) -> Option<&str> {
        match &self.analysis {
            AnalysisState::Ready(text) if !text.trim().is_empty() && text != NO_TEXT_SENTINEL => {
                Some(text)
            }
            _ => None,
        }
    }

    pub fn word_count(&self) -> usize {
        match &self.analysis {
            AnalysisState::Ready(text) => text.split_whitespace().count(),
            _ => 0,
        }
    }

    pub fn notes_key(&self) -> String {
        let candidate = match &self.target {
            StudyTarget::Document { title, .. } => title.as_deref(),
            StudyTarget::Course { course_code, .. } | StudyTarget::GrandTest { course_code, .. } => {
                Some(course_code.as_str())
            }
        };
        candidate
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(GRAND_TEST_NOTES_KEY)
            .to_string()
    }

    pub async fn analyze<E>(&mut self, extractor: Arc<E>) -> Result<(), AggregationError>
    where
        E: TextExtractor + ?Sized + 'static,
    {
        self.analysis = AnalysisState::Analyzing;

        let text = match &self.target {
            StudyTarget::Document { reference, .. } => extractor.extract_text(reference).await,
            StudyTarget::Course { sources, .. } | StudyTarget::GrandTest { sources, .. } => {
                match aggregate(extractor, &sources.references, &sources.labels).await {
                    Ok(corpus) => corpus,
                    Err(aggregation_error) => {
                        warn!(error = %aggregation_error, "analysis failed");
                        self.analysis = AnalysisState::Failed(aggregation_error.to_string());
                        return Err(aggregation_error);
                    }
                }
            }
        };

        self.apply_corpus_with_rng(text, &mut rand::thread_rng());
        Ok(())
    }

    pub fn apply_corpus_with_rng<R: Rng + ?Sized>(&mut self, text: String, rng: &mut R) {
        self.analysis = AnalysisState::Ready(text);
        let corpus = self.corpus().map(str::to_string);
        self.deck = FlashcardDeck::from_corpus(corpus.as_deref());

        info!(
            title = %self.title(),
            words = self.word_count(),
            cards = self.deck.len(),
            "analysis complete"
        );

        if let Some(corpus) = corpus {
            match self.assessment.corpus_ready(&corpus, rng) {
                Ok(true) => info!(title = %self.title(), "grand test started"),
                Ok(false) => {}
                Err(session_error) => warn!(error = %session_error, "grand test did not start"),
            }
        }
    }

    pub fn begin_quiz(&mut self) -> Result<usize, SessionError> {
        let corpus = self.corpus().map(str::to_string);
        self.assessment.begin(corpus.as_deref())
    }
}
