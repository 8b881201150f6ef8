use crate::models::{Question, QuestionSet, SynthesisConfig, SynthesisMode};
use crate::segment::{
    char_len, first_long_word, fixed_chunks, letters_only, normalize_whitespace, split_sentences,
    truncate_chars,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

pub const BLANK: &str = "_______";
pub const FALLBACK_TERM: &str = "Concept";
pub const MCQ_DISTRACTORS: [&str; 3] = ["Analysis", "Structure", "Variable"];
const RESERVE_DISTRACTOR: &str = "Principle";

pub const GRAND_TEST_MCQ: usize = 40;
pub const GRAND_TEST_SHORT_ANSWER: usize = 20;
pub const GRAND_TEST_THEORY: usize = 10;

const MCQ_MIN_EXCLUSIVE: usize = 20;
const MCQ_MAX_EXCLUSIVE: usize = 150;
const SHORT_ANSWER_MIN_EXCLUSIVE: usize = 30;
const SHORT_ANSWER_PROMPT_CHARS: usize = 50;
const THEORY_CHUNK_CHARS: usize = 200;
const THEORY_PROMPT_CHARS: usize = 100;
const THEORY_ANSWER_CHARS: usize = 300;

pub fn synthesize(corpus: &str, config: &SynthesisConfig) -> QuestionSet {
    synthesize_with_rng(corpus, config, &mut rand::thread_rng())
}

pub fn synthesize_with_rng<R: Rng + ?Sized>(
    corpus: &str,
    config: &SynthesisConfig,
    rng: &mut R,
) -> QuestionSet {
    let synthesizer = QuestionSynthesizer::new(corpus);

    let questions = match config.mode {
        SynthesisMode::GrandTest => {
            let mut questions = synthesizer.generate_mcq(GRAND_TEST_MCQ, rng);
            questions.extend(synthesizer.generate_short_answer(GRAND_TEST_SHORT_ANSWER, rng));
            questions.extend(synthesizer.generate_theory(GRAND_TEST_THEORY, rng));
            questions
        }
        SynthesisMode::Default => synthesizer.generate_mcq(config.q_count, rng),
    };

    debug!(
        mode = ?config.mode,
        requested = config.q_count,
        produced = questions.len(),
        "synthesized question set"
    );
    questions
}

pub struct QuestionSynthesizer {
    normalized: String,
}

impl QuestionSynthesizer {
    pub fn new(corpus: &str) -> Self {
        Self {
            normalized: normalize_whitespace(corpus),
        }
    }

    pub fn generate_mcq<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        let suitable = split_sentences(&self.normalized)
            .into_iter()
            .filter(|sentence| {
                let length = char_len(sentence);
                length > MCQ_MIN_EXCLUSIVE && length < MCQ_MAX_EXCLUSIVE
            })
            .collect::<Vec<_>>();

        sample(suitable, count, rng)
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| {
                let sentence = sentence.trim();
                let target = key_term(sentence);

                let mut options = option_set(&target);
                options.shuffle(rng);

                Question::Mcq {
                    id: format!("mcq-{index}"),
                    question: blank_first_occurrence(sentence, &target),
                    options,
                    correct: target,
                }
            })
            .collect()
    }

    pub fn generate_short_answer<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let suitable = split_sentences(&self.normalized)
            .into_iter()
            .filter(|sentence| char_len(sentence) > SHORT_ANSWER_MIN_EXCLUSIVE)
            .collect::<Vec<_>>();

        sample(suitable, count, rng)
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| {
                let sentence = sentence.trim();
                Question::ShortAnswer {
                    id: format!("sa-{index}"),
                    question: format!(
                        "Briefly explain the context of this statement: \"{}...\"",
                        truncate_chars(sentence, SHORT_ANSWER_PROMPT_CHARS)
                    ),
                    answer: sentence.to_string(),
                }
            })
            .collect()
    }

    pub fn generate_theory<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        let chunks = fixed_chunks(&self.normalized, THEORY_CHUNK_CHARS);

        sample(chunks, count, rng)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| Question::Theory {
                id: format!("th-{index}"),
                question: format!(
                    "Discuss the implications of the following passage: \"{}...\"",
                    truncate_chars(chunk, THEORY_PROMPT_CHARS)
                ),
                answer: truncate_chars(chunk, THEORY_ANSWER_CHARS).to_string(),
            })
            .collect()
    }
}

pub(crate) fn key_term(sentence: &str) -> String {
    first_long_word(sentence)
        .map(letters_only)
        .filter(|term| !term.is_empty())
        .unwrap_or_else(|| FALLBACK_TERM.to_string())
}

fn sample<T, R: Rng + ?Sized>(mut pool: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}

fn option_set(target: &str) -> Vec<String> {
    let mut options = vec![target.to_string()];
    options.extend(MCQ_DISTRACTORS.iter().map(|distractor| {
        if *distractor == target {
            RESERVE_DISTRACTOR.to_string()
        } else {
            (*distractor).to_string()
        }
    }));
    options
}

// A target whose surface form changed during letter stripping may not be
// found; the sentence is then returned without a blank.
fn blank_first_occurrence(sentence: &str, target: &str) -> String {
    if target.is_empty() {
        return sentence.to_string();
    }
    sentence.replacen(target, BLANK, 1)
}
