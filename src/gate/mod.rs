//! Plausibility rules deciding which transcriptions may become a name.

use std::fmt;

use log::{debug, info};

use crate::{
    candidate::{Candidate, Corroboration, NameCandidates, Signals},
    text::{
        alpha_len, clean_name, is_uppercase_word, letters_upper, levenshtein, mentions_label_word,
        vowel_count, vowel_ratio,
    },
};

const MIN_ALPHA: usize = 3;
const MIN_AGREED_ALPHA: usize = 2;
const MAX_TOKENS: usize = 3;
const MIN_VOWELS: usize = 2;
const MIN_VOWEL_RATIO: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    PunctuationRun,
    TooShort,
    TooManyTokens,
    Stopword,
    LabelWord,
    ConsonantHeavy,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Empty => "empty",
            Rejection::PunctuationRun => "punctuation run",
            Rejection::TooShort => "fewer than 3 letters",
            Rejection::TooManyTokens => "more than 3 words",
            Rejection::Stopword => "address vocabulary",
            Rejection::LabelWord => "caption word",
            Rejection::ConsonantHeavy => "too few vowels for an uppercase word",
        };
        f.write_str(reason)
    }
}

pub fn is_plausible_name(candidate: &str) -> bool {
    let text = clean_name(candidate);
    check(&text, &Signals::of(&text), Corroboration::None).is_ok()
}

/// Gate verdict for a strategy's candidate.
pub fn judge(candidate: &Candidate) -> Result<(), Rejection> {
    check(&candidate.text, &candidate.signals, candidate.corroboration)
}

fn check(text: &str, signals: &Signals, corroboration: Corroboration) -> Result<(), Rejection> {
    if text.trim().is_empty() {
        return Err(Rejection::Empty);
    }
    if ["--", "..", "-.", ".-"].iter().any(|run| text.contains(run)) {
        return Err(Rejection::PunctuationRun);
    }
    let min_alpha = match corroboration {
        Corroboration::Consensus => MIN_AGREED_ALPHA,
        _ => MIN_ALPHA,
    };
    if signals.alpha_length < min_alpha {
        return Err(Rejection::TooShort);
    }
    if signals.token_count > MAX_TOKENS {
        return Err(Rejection::TooManyTokens);
    }
    if signals.matches_stopword {
        return Err(Rejection::Stopword);
    }
    if signals.matches_label_word {
        return Err(Rejection::LabelWord);
    }
    if corroboration == Corroboration::None
        && signals.token_count == 1
        && signals.alpha_length >= 4
        && is_uppercase_word(text)
        && (vowel_count(text) < MIN_VOWELS || signals.vowel_ratio < MIN_VOWEL_RATIO)
    {
        return Err(Rejection::ConsonantHeavy);
    }
    Ok(())
}

/// Drops every candidate the gate rejects, logging each verdict.
pub fn filter(candidates: NameCandidates) -> NameCandidates {
    let mut accepted = NameCandidates::default();
    for candidate in candidates.iter() {
        match judge(candidate) {
            Ok(()) => {
                info!(
                    "accepted {} {:?} from {} ({:?})",
                    candidate.field.key(),
                    candidate.text,
                    candidate.source,
                    candidate.corroboration
                );
                accepted.set(candidate.field, Some(candidate.clone()));
            }
            Err(reason) => debug!(
                "rejected {} {:?} from {}: {}",
                candidate.field.key(),
                candidate.text,
                candidate.source,
                reason
            ),
        }
    }
    accepted
}

/// `improved` replaces `original` only when it carries clearly more letters.
pub fn prefer_candidate(original: &str, improved: &str) -> String {
    if alpha_len(improved) > MIN_AGREED_ALPHA.max(alpha_len(original)) {
        improved.to_owned()
    } else {
        original.to_owned()
    }
}

/// Text both passes agree on, when it is long enough and not a caption.
pub fn consensus(a: &str, b: &str) -> Option<String> {
    let a = clean_name(a);
    let b = clean_name(b);
    (!a.is_empty()
        && a.eq_ignore_ascii_case(&b)
        && alpha_len(&a) >= MIN_AGREED_ALPHA
        && !mentions_label_word(&a))
    .then_some(a)
}

/// Longest pass; ties go to the one closest to `prior`.
pub fn pick_pass(prior: &str, passes: &[&str]) -> String {
    passes
        .iter()
        .map(|p| clean_name(p))
        .filter(|p| !p.is_empty())
        .min_by_key(|p| {
            (
                std::cmp::Reverse(alpha_len(p)),
                levenshtein(&p.to_uppercase(), &prior.to_uppercase()),
            )
        })
        .unwrap_or_default()
}

/// Whether an uppercase word sounds like a surname rather than an acronym.
pub fn is_pronounceable(word: &str) -> bool {
    alpha_len(word) >= 4 && vowel_count(word) >= MIN_VOWELS && vowel_ratio(word) >= MIN_VOWEL_RATIO
}

/// Best surname-shaped word in `text`, scored by length, vowel ratio and a
/// trailing vowel.
pub fn best_upper(text: &str) -> Option<String> {
    text.to_uppercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| is_pronounceable(w))
        .map(|w| {
            let ends_with_vowel = w.ends_with(|c: char| matches!(c, 'A' | 'E' | 'I' | 'O' | 'U'));
            let score = w.len() as f32 + 0.5 * vowel_ratio(w) + if ends_with_vowel { 0.5 } else { 0. };
            (w.to_owned(), score)
        })
        .fold(None, |best: Option<(String, f32)>, (w, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((w, score)),
        })
        .map(|(w, _)| w)
}

/// Keeps `original` unless the re-read holds a longer surname-shaped word.
pub fn choose_upper(original: &str, improved: &str) -> String {
    let from_original = best_upper(original);
    let from_improved = best_upper(improved);
    match (from_original, from_improved) {
        (o, Some(i)) if i.len() > o.as_ref().map_or(0, String::len) => i,
        (Some(o), _) => o,
        _ => letters_upper(original),
    }
}
