use crate::error::SessionError;
use crate::models::{AssessmentOptions, Question, QuestionSet, SynthesisConfig, SynthesisMode};
use crate::synthesis::synthesize_with_rng;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Config,
    Quiz,
    Result,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::Config => "config",
            SessionStep::Quiz => "quiz",
            SessionStep::Result => "result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Choice(usize),
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub selected: usize,
    pub correct_index: Option<usize>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextQuestion(usize),
    Finished(u32),
    Stale,
}

pub fn default_question_deck() -> QuestionSet {
    let civics = [
        (
            "The concept of 'Rule of Law' implies that:",
            [
                "The King is above the law",
                "Everyone is subject to the law",
                "Judges make the laws",
            ],
        ),
        (
            "Which body approves the budget?",
            ["The Executive", "The Legislature", "The Media"],
        ),
        (
            "Democracy literally means:",
            ["Rule by the few", "Rule by the people", "Rule by wealth"],
        ),
    ];

    civics
        .iter()
        .enumerate()
        .map(|(index, (question, options))| Question::Mcq {
            id: format!("default-{index}"),
            question: (*question).to_string(),
            options: options.iter().map(|option| (*option).to_string()).collect(),
            correct: options[1].to_string(),
        })
        .collect()
}

pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 * 100.0) / total as f64).round() as u32
}

#[derive(Debug, Clone)]
pub struct AssessmentSession {
    id: Uuid,
    mode: SynthesisMode,
    question_count: usize,
    options: AssessmentOptions,
    step: SessionStep,
    questions: QuestionSet,
    current: usize,
    answers: Vec<Option<AnswerRecord>>,
    score: Option<u32>,
    epoch: u64,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AssessmentSession {
    pub fn new(mode: SynthesisMode, options: AssessmentOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            question_count: options.default_questions,
            options,
            step: SessionStep::Config,
            questions: Vec::new(),
            current: 0,
            answers: Vec::new(),
            score: None,
            epoch: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn manual(options: AssessmentOptions) -> Self {
        Self::new(SynthesisMode::Default, options)
    }

    pub fn grand_test(options: AssessmentOptions) -> Self {
        Self::new(SynthesisMode::GrandTest, options)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> SynthesisMode {
        self.mode
    }

    pub fn step(&self) -> SessionStep {
        self.step
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn options(&self) -> &AssessmentOptions {
        &self.options
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.step {
            SessionStep::Quiz => self.questions.get(self.current),
            SessionStep::Config | SessionStep::Result => None,
        }
    }

    pub fn answers(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.answers.iter().flatten()
    }

    pub fn score(&self) -> Option<u32> {
        self.score
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_locked(&self) -> bool {
        self.answers
            .get(self.current)
            .is_some_and(|answer| answer.is_some())
    }

    pub fn set_question_count(&mut self, requested: usize) -> Result<usize, SessionError> {
        self.expect_step(SessionStep::Config)?;
        self.question_count =
            requested.clamp(self.options.min_questions, self.options.max_questions);
        Ok(self.question_count)
    }

    pub fn begin(&mut self, corpus: Option<&str>) -> Result<usize, SessionError> {
        self.begin_with_rng(corpus, &mut rand::thread_rng())
    }

    pub fn begin_with_rng<R: Rng + ?Sized>(
        &mut self,
        corpus: Option<&str>,
        rng: &mut R,
    ) -> Result<usize, SessionError> {
        self.expect_step(SessionStep::Config)?;

        let config = SynthesisConfig {
            mode: self.mode,
            q_count: self.question_count,
        };
        let synthesized = corpus
            .filter(|text| !text.trim().is_empty())
            .map(|text| synthesize_with_rng(text, &config, rng))
            .unwrap_or_default();

        self.questions = if synthesized.is_empty() {
            debug!(session = %self.id, "no synthesized questions, using default deck");
            default_question_deck()
        } else {
            synthesized
        };

        self.answers = vec![None; self.questions.len()];
        self.current = 0;
        self.score = None;
        self.step = SessionStep::Quiz;
        self.epoch += 1;
        self.started_at = Some(Utc::now());
        self.completed_at = None;

        info!(
            session = %self.id,
            mode = ?self.mode,
            questions = self.questions.len(),
            "quiz started"
        );
        Ok(self.questions.len())
    }

    pub fn corpus_ready<R: Rng + ?Sized>(
        &mut self,
        corpus: &str,
        rng: &mut R,
    ) -> Result<bool, SessionError> {
        if self.mode != SynthesisMode::GrandTest || self.step != SessionStep::Config {
            return Ok(false);
        }
        if corpus.trim().is_empty() {
            return Ok(false);
        }
        self.begin_with_rng(Some(corpus), rng)?;
        Ok(true)
    }

    pub fn respond(&mut self, response: Response) -> Result<AnswerRecord, SessionError> {
        self.expect_step(SessionStep::Quiz)?;
        if self.is_locked() {
            return Err(SessionError::AlreadyAnswered(self.current));
        }

        let index = self.current;
        let question = &self.questions[index];
        let record = match (question.is_open_ended(), response) {
            (false, Response::Choice(selected)) => {
                let available = question.options().len();
                if selected >= available {
                    return Err(SessionError::OptionOutOfRange {
                        selected,
                        available,
                    });
                }
                let correct_index = question.correct_index();
                AnswerRecord {
                    question_index: index,
                    selected,
                    correct_index,
                    is_correct: correct_index == Some(selected),
                }
            }
            (true, Response::Accept) => AnswerRecord {
                question_index: index,
                selected: 0,
                correct_index: Some(0),
                is_correct: true,
            },
            (false, Response::Accept) => {
                return Err(SessionError::ResponseMismatch {
                    index,
                    expected: "an option choice",
                })
            }
            (true, Response::Choice(_)) => {
                return Err(SessionError::ResponseMismatch {
                    index,
                    expected: "accept",
                })
            }
        };

        self.answers[index] = Some(record.clone());
        Ok(record)
    }

    // `epoch` is the value observed when the answer was recorded.
    pub fn advance(&mut self, epoch: u64) -> Result<Advance, SessionError> {
        if epoch != self.epoch {
            return Ok(Advance::Stale);
        }
        self.expect_step(SessionStep::Quiz)?;
        if !self.is_locked() {
            return Err(SessionError::ResponseMismatch {
                index: self.current,
                expected: "an answer before advancing",
            });
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            return Ok(Advance::NextQuestion(self.current));
        }

        let correct = self.answers().filter(|answer| answer.is_correct).count();
        let score = score_percent(correct, self.questions.len());
        self.score = Some(score);
        self.step = SessionStep::Result;
        self.completed_at = Some(Utc::now());
        info!(session = %self.id, score, correct, total = self.questions.len(), "quiz finished");
        Ok(Advance::Finished(score))
    }

    pub fn restart(&mut self) {
        self.step = SessionStep::Config;
        self.questions.clear();
        self.answers.clear();
        self.current = 0;
        self.score = None;
        self.epoch += 1;
        self.started_at = None;
        self.completed_at = None;
    }

    fn expect_step(&self, expected: SessionStep) -> Result<(), SessionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(SessionError::WrongStep {
                expected: expected.as_str(),
                actual: self.step.as_str(),
            })
        }
    }
}

pub struct AssessmentRunner {
    session: Arc<Mutex<AssessmentSession>>,
    pending: Option<JoinHandle<()>>,
    delay: Duration,
}

impl AssessmentRunner {
    pub fn new(session: AssessmentSession) -> Self {
        let delay = session.options().advance_delay;
        Self {
            session: Arc::new(Mutex::new(session)),
            pending: None,
            delay,
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, AssessmentSession> {
        self.session.lock().await
    }

    pub fn has_pending_advance(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn respond(&mut self, response: Response) -> Result<AnswerRecord, SessionError> {
        let (record, epoch) = {
            let mut session = self.session.lock().await;
            let record = session.respond(response)?;
            (record, session.epoch())
        };

        self.cancel_pending();
        let session = Arc::clone(&self.session);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut session = session.lock().await;
            match session.advance(epoch) {
                Ok(outcome) => debug!(?outcome, "auto-advanced"),
                Err(session_error) => debug!(error = %session_error, "auto-advance skipped"),
            }
        }));

        Ok(record)
    }

    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending.take() {
            let _ = handle.await;
        }
    }

    pub async fn restart(&mut self) {
        self.cancel_pending();
        self.session.lock().await.restart();
    }

    pub fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for AssessmentRunner {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn started_default_deck() -> AssessmentSession {
        let mut session = AssessmentSession::manual(AssessmentOptions::default());
        session.begin(None).expect("config step should begin");
        session
    }

    fn corpus(sentences: usize) -> String {
        (0..sentences)
            .map(|index| format!("Article {index} guarantees representation for every citizen. "))
            .collect()
    }

    #[test]
    fn scoring_rounds_to_nearest_percent() {
        let mut session = started_default_deck();
        assert_eq!(session.questions().len(), 3);

        for (position, choice) in [1, 0, 1].into_iter().enumerate() {
            let epoch = session.epoch();
            let record = session
                .respond(Response::Choice(choice))
                .expect("answer should be accepted");
            assert_eq!(record.question_index, position);
            session.advance(epoch).expect("advance should succeed");
        }

        assert_eq!(session.step(), SessionStep::Result);
        assert_eq!(session.score(), Some(67));
        assert!(session.completed_at().is_some());
    }

    #[test]
    fn answered_question_is_locked() {
        let mut session = started_default_deck();
        session.respond(Response::Choice(2)).expect("first answer");
        assert!(session.is_locked());
        assert_eq!(
            session.respond(Response::Choice(1)),
            Err(SessionError::AlreadyAnswered(0))
        );
    }

    #[test]
    fn invalid_responses_are_rejected() {
        let mut session = started_default_deck();
        assert_eq!(
            session.respond(Response::Choice(3)),
            Err(SessionError::OptionOutOfRange {
                selected: 3,
                available: 3
            })
        );
        assert!(matches!(
            session.respond(Response::Accept),
            Err(SessionError::ResponseMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn cannot_advance_before_answering() {
        let mut session = started_default_deck();
        let epoch = session.epoch();
        assert!(session.advance(epoch).is_err());
    }

    #[test]
    fn manual_count_is_clamped() {
        let mut session = AssessmentSession::manual(AssessmentOptions::default());
        assert_eq!(session.set_question_count(1), Ok(3));
        assert_eq!(session.set_question_count(50), Ok(20));
        assert_eq!(session.set_question_count(8), Ok(8));
    }

    #[test]
    fn manual_quiz_uses_synthesized_questions() {
        let mut session = AssessmentSession::manual(AssessmentOptions::default());
        session.set_question_count(4).expect("count in config");
        let mut rng = StdRng::seed_from_u64(21);
        let count = session
            .begin_with_rng(Some(&corpus(10)), &mut rng)
            .expect("begin");

        assert_eq!(count, 4);
        assert!(session
            .questions()
            .iter()
            .all(|question| question.id().starts_with("mcq-")));
    }

    #[test]
    fn unusable_corpus_falls_back_to_default_deck() {
        let mut session = AssessmentSession::manual(AssessmentOptions::default());
        session.begin(Some("Short.")).expect("begin");
        assert_eq!(session.questions(), default_question_deck().as_slice());
    }

    #[test]
    fn grand_test_starts_when_corpus_arrives() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut manual = AssessmentSession::manual(AssessmentOptions::default());
        assert_eq!(manual.corpus_ready(&corpus(100), &mut rng), Ok(false));
        assert_eq!(manual.step(), SessionStep::Config);

        let mut grand = AssessmentSession::grand_test(AssessmentOptions::default());
        assert_eq!(grand.corpus_ready("   ", &mut rng), Ok(false));
        assert_eq!(grand.corpus_ready(&corpus(100), &mut rng), Ok(true));
        assert_eq!(grand.step(), SessionStep::Quiz);
        assert_eq!(grand.questions().len(), 70);
    }

    #[test]
    fn open_ended_questions_are_accepted_as_correct() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut session = AssessmentSession::grand_test(AssessmentOptions::default());
        session
            .corpus_ready(&corpus(100), &mut rng)
            .expect("grand test should start");

        let first_open = session
            .questions()
            .iter()
            .position(Question::is_open_ended)
            .expect("grand test has open-ended questions");
        while session.current_index() < first_open {
            let epoch = session.epoch();
            session.respond(Response::Choice(0)).expect("answer");
            session.advance(epoch).expect("advance");
        }

        assert!(matches!(
            session.respond(Response::Choice(0)),
            Err(SessionError::ResponseMismatch { .. })
        ));
        let record = session.respond(Response::Accept).expect("accept");
        assert!(record.is_correct);
    }

    #[test]
    fn restart_discards_answers_and_invalidates_pending_advance() {
        let mut session = started_default_deck();
        let epoch = session.epoch();
        session.respond(Response::Choice(1)).expect("answer");
        session.restart();

        assert_eq!(session.step(), SessionStep::Config);
        assert_eq!(session.answers().count(), 0);
        assert_eq!(session.advance(epoch), Ok(Advance::Stale));
        assert_eq!(session.step(), SessionStep::Config);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_advances_after_delay() {
        let mut runner = AssessmentRunner::new(started_default_deck());
        runner.respond(Response::Choice(1)).await.expect("answer");

        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(runner.lock().await.current_index(), 0);
        assert!(runner.lock().await.is_locked());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runner.lock().await.current_index(), 1);
        assert!(!runner.lock().await.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn runner_finishes_on_last_question() {
        let mut runner = AssessmentRunner::new(started_default_deck());
        for choice in [1, 1, 0] {
            runner.respond(Response::Choice(choice)).await.expect("answer");
            runner.settle().await;
        }

        let session = runner.lock().await;
        assert_eq!(session.step(), SessionStep::Result);
        assert_eq!(session.score(), Some(67));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_the_pending_advance() {
        let mut runner = AssessmentRunner::new(started_default_deck());
        runner.respond(Response::Choice(1)).await.expect("answer");
        assert!(runner.has_pending_advance());

        runner.restart().await;
        assert!(!runner.has_pending_advance());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let session = runner.lock().await;
        assert_eq!(session.step(), SessionStep::Config);
        assert!(session.questions().is_empty());
    }
}
