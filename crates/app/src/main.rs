use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use study_archive_core::export::option_letter;
use study_archive_core::{
    export_flashcards, export_test, folder_sources, grand_test_sources, group_by_course,
    load_catalog, AssessmentOptions, AssessmentRunner, DirectorySink, DocumentReference,
    ExportArtifact, ExtractorOptions, FileSink, FlashcardFormat, GrandTestSources, HttpOcrEngine,
    JsonFileNoteStore, NoteStore, OcrEndpointConfig, PdfTextExtractor, Question, Response,
    SessionStep, StudySession, StudyTarget, TestFormat,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "study-archive", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OCR service endpoint used for pages without a text layer
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Bearer token for the OCR service
    #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// Per-page OCR timeout in seconds
    #[arg(long, env = "OCR_TIMEOUT_SECS")]
    ocr_timeout_secs: Option<u64>,

    /// OCR language code
    #[arg(long, default_value = "eng")]
    ocr_language: String,

    /// Scale used when a page is rendered for OCR
    #[arg(long, default_value_t = 1.5)]
    render_scale: f32,
}

/// Where a session's documents come from: explicit locators, a course in the
/// catalog, or a local folder of PDFs.
#[derive(Args, Clone)]
struct SourceArgs {
    /// PDF path or URL; repeat for several documents
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Label for the matching --source, in order
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Title of a single-document session
    #[arg(long)]
    title: Option<String>,

    /// Catalog JSON file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Course code to pull from the catalog
    #[arg(long)]
    course: Option<String>,

    /// Prefix joined to catalog links
    #[arg(long, default_value = "")]
    base_url: String,

    /// Folder scanned recursively for PDFs
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the extracted text of one document.
    Extract {
        /// PDF path or URL.
        #[arg(long)]
        source: String,
    },
    /// Generate flashcards from a document or course.
    Flashcards {
        #[command(flatten)]
        sources: SourceArgs,
        /// json, csv or txt.
        #[arg(long, default_value = "json")]
        format: String,
        /// Directory to write the export into; prints to stdout when absent.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Base file name of the export.
        #[arg(long, default_value = "flashcards")]
        name: String,
    },
    /// Generate a test and export it.
    Test {
        #[command(flatten)]
        sources: SourceArgs,
        /// Run the course-wide grand test (70 questions).
        #[arg(long, default_value_t = false)]
        grand: bool,
        /// Number of questions for a manual test.
        #[arg(long, default_value = "5")]
        count: usize,
        /// json, csv or answer_key.
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "test")]
        name: String,
    },
    /// Take a test in the terminal.
    Quiz {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long, default_value_t = false)]
        grand: bool,
        #[arg(long, default_value = "5")]
        count: usize,
    },
    /// List catalog courses and their documents.
    Courses {
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Read or write study notes.
    Notes {
        #[command(subcommand)]
        action: NotesAction,
        /// Notes file.
        #[arg(long, default_value = "notes.json")]
        store: PathBuf,
    },
}

#[derive(Subcommand)]
enum NotesAction {
    Get {
        #[arg(long)]
        key: String,
    },
    Set {
        #[arg(long)]
        key: String,
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let extractor = Arc::new(build_extractor(&cli)?);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "study-archive boot"
    );

    match cli.command {
        Command::Extract { source } => {
            let text = extractor.extract(&DocumentReference::new(source)).await;
            if text.is_empty() {
                warn!("no text returned");
            }
            println!("{text}");
        }
        Command::Flashcards {
            sources,
            format,
            out,
            name,
        } => {
            let format = format.parse::<FlashcardFormat>()?;
            let target = resolve_target(&sources, false)?;
            let mut session = StudySession::new(target, AssessmentOptions::default());
            session.analyze(Arc::clone(&extractor)).await?;

            let artifact = export_flashcards(session.deck().cards(), format, &name)?;
            deliver(&artifact, out)?;
        }
        Command::Test {
            sources,
            grand,
            count,
            format,
            out,
            name,
        } => {
            let format = format.parse::<TestFormat>()?;
            let session = prepare_quiz(&extractor, &sources, grand, count).await?;

            let artifact = export_test(session.assessment().questions(), format, &name)?;
            deliver(&artifact, out)?;
        }
        Command::Quiz {
            sources,
            grand,
            count,
        } => {
            let session = prepare_quiz(&extractor, &sources, grand, count).await?;
            println!("{}", session.title());
            run_quiz(AssessmentRunner::new(session.into_assessment())).await?;
        }
        Command::Courses { catalog } => {
            let records = load_catalog(&catalog)
                .with_context(|| format!("reading catalog {}", catalog.display()))?;
            for group in group_by_course(&records) {
                println!("{} ({} documents)", group.course_code, group.records.len());
                for record in group.records {
                    println!("  [{}] {} - {}", record.topic_number, record.title, record.date);
                }
            }
        }
        Command::Notes { action, store } => {
            let notes = JsonFileNoteStore::new(store);
            match action {
                NotesAction::Get { key } => match notes.load(&key).await? {
                    Some(text) => println!("{text}"),
                    None => println!("no notes for {key}"),
                },
                NotesAction::Set { key, text } => {
                    notes.save(&key, &text).await?;
                    println!("notes saved for {key}");
                }
            }
        }
    }

    Ok(())
}

fn build_extractor(cli: &Cli) -> anyhow::Result<PdfTextExtractor> {
    let options = ExtractorOptions {
        render_scale: cli.render_scale,
        ocr_language: cli.ocr_language.clone(),
        ocr_timeout: cli.ocr_timeout_secs.map(Duration::from_secs),
    };
    let extractor = PdfTextExtractor::new(options);

    match cli.ocr_endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            let config = OcrEndpointConfig {
                endpoint: endpoint.to_string(),
                api_key: cli.ocr_api_key.clone(),
                timeout: cli.ocr_timeout_secs.map(Duration::from_secs),
            };
            Ok(extractor.with_ocr(Arc::new(HttpOcrEngine::new(config)?)))
        }
        _ => {
            info!("no OCR endpoint configured, scanned pages will come back empty");
            Ok(extractor)
        }
    }
}

fn resolve_target(args: &SourceArgs, grand: bool) -> anyhow::Result<StudyTarget> {
    if let (Some(catalog), Some(course)) = (&args.catalog, &args.course) {
        let records = load_catalog(catalog)
            .with_context(|| format!("reading catalog {}", catalog.display()))?;
        let sources = grand_test_sources(&records, course, &args.base_url)?;
        return Ok(collection(course.clone(), sources, grand));
    }

    if let Some(folder) = &args.folder {
        let sources = folder_sources(folder);
        if sources.references.is_empty() {
            bail!("no PDFs found under {}", folder.display());
        }
        let course_code = args.course.clone().unwrap_or_else(|| {
            folder
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        return Ok(collection(course_code, sources, grand));
    }

    match args.sources.as_slice() {
        [] => bail!("provide --source, --folder, or --catalog with --course"),
        [single] if !grand => Ok(StudyTarget::Document {
            reference: DocumentReference::new(single.clone()),
            title: args.title.clone(),
        }),
        many => Ok(collection(
            args.course.clone().unwrap_or_default(),
            GrandTestSources {
                references: many.iter().cloned().map(DocumentReference::new).collect(),
                labels: args.labels.clone(),
            },
            grand,
        )),
    }
}

fn collection(course_code: String, sources: GrandTestSources, grand: bool) -> StudyTarget {
    if grand {
        StudyTarget::GrandTest {
            course_code,
            sources,
        }
    } else {
        StudyTarget::Course {
            course_code,
            sources,
        }
    }
}

/// Analyzes the sources and leaves the session in the quiz step.
async fn prepare_quiz(
    extractor: &Arc<PdfTextExtractor>,
    sources: &SourceArgs,
    grand: bool,
    count: usize,
) -> anyhow::Result<StudySession> {
    let target = resolve_target(sources, grand)?;
    let mut session = StudySession::new(target, AssessmentOptions::default());

    if !session.is_grand_test() {
        let clamped = session.assessment_mut().set_question_count(count)?;
        if clamped != count {
            warn!(requested = count, used = clamped, "question count clamped");
        }
    }

    session.analyze(Arc::clone(extractor)).await?;

    if session.assessment().step() == SessionStep::Config {
        session.begin_quiz()?;
    }
    Ok(session)
}

fn deliver(artifact: &ExportArtifact, out: Option<PathBuf>) -> anyhow::Result<()> {
    match out {
        Some(dir) => {
            let path = DirectorySink::new(dir).deliver(artifact)?;
            println!("wrote {}", path.display());
        }
        None => println!("{}", artifact.content),
    }
    Ok(())
}

async fn run_quiz(mut runner: AssessmentRunner) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let (question, position, total) = {
            let session = runner.lock().await;
            if session.step() == SessionStep::Result {
                let score = session.score().unwrap_or_default();
                let correct = session.answers().filter(|answer| answer.is_correct).count();
                println!("\nScore: {score}% ({correct}/{})", session.questions().len());
                return Ok(());
            }
            match session.current_question() {
                Some(question) => (
                    question.clone(),
                    session.current_index() + 1,
                    session.questions().len(),
                ),
                None => bail!("quiz has no current question"),
            }
        };

        println!("\nQuestion {position} of {total} [{}]", question.kind().as_str());
        println!("{}", question.prompt());
        for (index, option) in question.options().iter().enumerate() {
            println!("  {}. {option}", option_letter(index));
        }
        if question.is_open_ended() {
            println!("(press enter to reveal the model answer)");
        }

        let Some(line) = lines.next_line().await? else {
            runner.cancel_pending();
            println!("quiz abandoned");
            return Ok(());
        };

        let response = match parse_response(&question, &line) {
            Some(response) => response,
            None => {
                println!("answer with one of the option letters");
                continue;
            }
        };

        match runner.respond(response).await {
            Ok(record) if question.is_open_ended() => {
                println!("Model answer: {}", question.correct_answer());
                info!(question = record.question_index, "open-ended answer accepted");
            }
            Ok(record) if record.is_correct => println!("Correct."),
            Ok(_) => println!("Incorrect. Answer: {}", question.correct_answer()),
            Err(session_error) => {
                println!("{session_error}");
                continue;
            }
        }

        runner.settle().await;
    }
}

fn parse_response(question: &Question, line: &str) -> Option<Response> {
    if question.is_open_ended() {
        return Some(Response::Accept);
    }

    let input = line.trim();
    let mut chars = input.chars();
    let index = match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            (letter.to_ascii_uppercase() as usize).checked_sub('A' as usize)?
        }
        _ => input.parse::<usize>().ok()?.checked_sub(1)?,
    };

    (index < question.options().len()).then_some(Response::Choice(index))
}
