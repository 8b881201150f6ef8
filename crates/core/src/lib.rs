pub mod aggregate;
pub mod assessment;
pub mod catalog;
pub mod error;
pub mod export;
pub mod extractor;
pub mod flashcards;
pub mod models;
pub mod notes;
pub mod ocr;
pub mod segment;
pub mod study;
pub mod synthesis;

pub use aggregate::aggregate;
pub use assessment::{
    default_question_deck, score_percent, Advance, AnswerRecord, AssessmentRunner,
    AssessmentSession, Response, SessionStep,
};
pub use catalog::{
    discover_pdf_files, folder_sources, grand_test_sources, group_by_course, load_catalog,
    CatalogRecord, CourseGroup, GrandTestSources, GRAND_TEST_DOCUMENTS,
};
pub use error::{AggregationError, CatalogError, ExportError, ExtractError, NoteError, SessionError};
pub use export::{
    export_flashcards, export_test, DirectorySink, ExportArtifact, FileSink, FlashcardFormat,
    TestFormat,
};
pub use extractor::{
    DocumentFetcher, LocatorFetcher, LopdfBackend, PageRaster, PageRenderer, PdfBackend,
    PdfDocument, PdfTextExtractor, PdfiumRenderer, TextExtractor,
};
pub use flashcards::{fallback_flashcards, generate_flashcards, FlashcardDeck};
pub use models::{
    AssessmentOptions, DocumentReference, ExtractedDocument, ExtractedPage, ExtractorOptions,
    Flashcard, PageSource, Question, QuestionKind, QuestionSet, SynthesisConfig, SynthesisMode,
    NO_TEXT_SENTINEL,
};
pub use notes::{InMemoryNoteStore, JsonFileNoteStore, NoteStore};
pub use ocr::{HttpOcrEngine, OcrEndpointConfig, OcrEngine};
pub use study::{AnalysisState, StudySession, StudyTarget};
pub use synthesis::{synthesize, synthesize_with_rng, QuestionSynthesizer};
