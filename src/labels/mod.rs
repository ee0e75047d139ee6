//! Locates the printed name captions among the recognised words.

use crate::{
    candidate::Field,
    geometry::{LabelRect, Token},
    text::{approx_equals, letters_lower, LABEL_WORDS},
};

/// How one name field's caption can be printed.
#[derive(Debug, Clone, Copy)]
pub struct FieldLabel {
    pub field: Field,
    pub pair: (&'static str, &'static str),
    pub combined: &'static [&'static str],
}

pub const FIELD_LABELS: [FieldLabel; 3] = [
    FieldLabel {
        field: Field::Last,
        pair: ("last", "name"),
        combined: &["last name", "surname"],
    },
    FieldLabel {
        field: Field::First,
        pair: ("first", "name"),
        combined: &["first name", "given name"],
    },
    FieldLabel {
        field: Field::Middle,
        pair: ("middle", "name"),
        combined: &["middle name", "middle"],
    },
];

pub fn field_label(field: Field) -> &'static FieldLabel {
    match field {
        Field::Last => &FIELD_LABELS[0],
        Field::First => &FIELD_LABELS[1],
        Field::Middle => &FIELD_LABELS[2],
    }
}

/// Caption for `label`, as a word pair or failing that a single fused token.
pub fn find_label(tokens: &[Token], label: &FieldLabel) -> Option<LabelRect> {
    find_label_pair(tokens, label.pair.0, label.pair.1)
        .or_else(|| find_combined_label(tokens, label.combined))
}

/// Two tokens reading `first` then `second` on one row, exact matches
/// before fuzzy ones.
pub fn find_label_pair(tokens: &[Token], first: &str, second: &str) -> Option<LabelRect> {
    let exact = |text: &str, word: &str| letters_lower(text) == word;
    scan_pair(tokens, first, second, exact).or_else(|| scan_pair(tokens, first, second, approx_equals))
}

fn scan_pair<F>(tokens: &[Token], first: &str, second: &str, matches: F) -> Option<LabelRect>
where
    F: Fn(&str, &str) -> bool,
{
    tokens
        .iter()
        .enumerate()
        .filter(|(_, a)| matches(&a.text, first))
        .find_map(|(i, a)| {
            let slack = 10.max((0.8 * a.height as f32) as i32);
            tokens
                .iter()
                .enumerate()
                .find(|(j, b)| {
                    *j != i
                        && b.left > a.left
                        && (b.top - a.top).abs() <= slack
                        && matches(&b.text, second)
                })
                .map(|(_, b)| LabelRect::union(a, b))
        })
}

/// Single token whose letters contain every word of one of `variants`,
/// e.g. "LastName" for "last name".
pub fn find_combined_label(tokens: &[Token], variants: &[&str]) -> Option<LabelRect> {
    tokens
        .iter()
        .find(|t| {
            let letters = letters_lower(&t.text);
            !letters.is_empty()
                && variants.iter().any(|v| {
                    v.split_whitespace()
                        .all(|w| letters.contains(&w.to_lowercase()))
                })
        })
        .map(LabelRect::of)
}

/// Printed caption word, with or without a trailing period.
pub fn is_label_token(text: &str) -> bool {
    let word = text.trim().trim_end_matches('.').to_lowercase();
    LABEL_WORDS.contains(&word.as_str())
}

/// Whether the caption of `field` appears anywhere on the page.
pub fn has_label(tokens: &[Token], field: Field) -> bool {
    find_label(tokens, field_label(field)).is_some()
}
