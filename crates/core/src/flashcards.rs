use crate::models::Flashcard;
use crate::segment::{char_len, split_sentences};
use crate::synthesis::key_term;

pub const MAX_FLASHCARDS: usize = 10;
const MIN_CORPUS_CHARS: usize = 100;
const SENTENCE_MIN_EXCLUSIVE: usize = 30;
const SENTENCE_MAX_EXCLUSIVE: usize = 150;

pub fn fallback_flashcards() -> Vec<Flashcard> {
    vec![
        Flashcard::new(
            "What is the primary function of the Executive?",
            "To enforce and implement laws.",
        ),
        Flashcard::new(
            "Define 'Separation of Powers'.",
            "Division of government responsibilities into distinct branches.",
        ),
        Flashcard::new("Who authored 'The Prince'?", "Niccolò Machiavelli."),
    ]
}

pub fn generate_flashcards(corpus: Option<&str>) -> Vec<Flashcard> {
    let corpus = match corpus {
        Some(text) if char_len(text) > MIN_CORPUS_CHARS => text,
        _ => return fallback_flashcards(),
    };

    let cards = split_sentences(corpus)
        .into_iter()
        .filter(|sentence| {
            let length = char_len(sentence);
            length > SENTENCE_MIN_EXCLUSIVE && length < SENTENCE_MAX_EXCLUSIVE
        })
        .take(MAX_FLASHCARDS)
        .map(|sentence| {
            let term = key_term(sentence);
            Flashcard::new(
                format!("What does \"{term}\" refer to in this context?"),
                sentence.trim(),
            )
        })
        .collect::<Vec<_>>();

    if cards.is_empty() {
        fallback_flashcards()
    } else {
        cards
    }
}

#[derive(Debug, Clone)]
pub struct FlashcardDeck {
    cards: Vec<Flashcard>,
    index: usize,
    flipped: bool,
}

impl FlashcardDeck {
    pub fn from_corpus(corpus: Option<&str>) -> Self {
        Self::new(generate_flashcards(corpus))
    }

    pub fn new(cards: Vec<Flashcard>) -> Self {
        let cards = if cards.is_empty() {
            fallback_flashcards()
        } else {
            cards
        };
        Self {
            cards,
            index: 0,
            flipped: false,
        }
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn current(&self) -> &Flashcard {
        &self.cards[self.index]
    }

    pub fn visible_face(&self) -> &str {
        let card = self.current();
        if self.flipped {
            &card.answer
        } else {
            &card.question
        }
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    pub fn next(&mut self) {
        self.flipped = false;
        self.index = (self.index + 1) % self.cards.len();
    }

    pub fn previous(&mut self) {
        self.flipped = false;
        self.index = (self.index + self.cards.len() - 1) % self.cards.len();
    }
}
