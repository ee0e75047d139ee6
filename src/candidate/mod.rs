use std::fmt;

use serde::Serialize;

use crate::text::{
    alpha_len, clean_name, mentions_label_word, mentions_stopword, vowel_ratio,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Last,
    First,
    Middle,
}

impl Field {
    /// Box order on the form, left to right.
    pub const ALL: [Field; 3] = [Field::Last, Field::First, Field::Middle];

    pub fn key(self) -> &'static str {
        match self {
            Field::Last => "last_name",
            Field::First => "first_name",
            Field::Middle => "middle_name",
        }
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    LabelTsv,
    LabelReocr,
    RawTextLabel,
    FallbackAboveName,
    FallbackDensityBand,
    FallbackThreeCol,
    FallbackKmeans,
    FallbackLongestUpper,
    RawTextHeuristic,
}

impl Source {
    /// Label-anchored sources read the value next to its printed caption;
    /// everything else guesses from layout or free text.
    pub fn is_fallback(self) -> bool {
        !matches!(
            self,
            Source::LabelTsv | Source::LabelReocr | Source::RawTextLabel
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::LabelTsv => "label_tsv",
            Source::LabelReocr => "label_reocr",
            Source::RawTextLabel => "raw_text_label",
            Source::FallbackAboveName => "fallback_above_name",
            Source::FallbackDensityBand => "fallback_density_band",
            Source::FallbackThreeCol => "fallback_three_col",
            Source::FallbackKmeans => "fallback_kmeans",
            Source::FallbackLongestUpper => "fallback_longest_upper",
            Source::RawTextHeuristic => "raw_text_heuristic",
        };
        f.write_str(name)
    }
}

/// Independent evidence that a candidate's text is what was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Corroboration {
    #[default]
    None,
    /// The text is one of three x-gap separated boxes on a single line.
    Layout,
    /// Two independent OCR passes returned the same text.
    Consensus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub alpha_length: usize,
    pub vowel_ratio: f32,
    pub token_count: usize,
    pub matches_stopword: bool,
    pub matches_label_word: bool,
}

impl Signals {
    pub fn of(text: &str) -> Signals {
        Signals {
            alpha_length: alpha_len(text),
            vowel_ratio: vowel_ratio(text),
            token_count: text.split_whitespace().count(),
            matches_stopword: mentions_stopword(text),
            matches_label_word: mentions_label_word(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub field: Field,
    pub text: String,
    pub source: Source,
    pub signals: Signals,
    pub corroboration: Corroboration,
}

impl Candidate {
    /// Cleans `text` and computes its signals; `None` when nothing is left.
    pub fn new(field: Field, text: &str, source: Source) -> Option<Candidate> {
        let text = clean_name(text);
        if text.is_empty() {
            return None;
        }
        Some(Candidate {
            field,
            signals: Signals::of(&text),
            text,
            source,
            corroboration: Corroboration::None,
        })
    }

    pub fn corroborated(self, corroboration: Corroboration) -> Candidate {
        Candidate {
            corroboration,
            ..self
        }
    }
}

/// One optional candidate per name field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameCandidates {
    pub last: Option<Candidate>,
    pub first: Option<Candidate>,
    pub middle: Option<Candidate>,
}

impl NameCandidates {
    /// Maps up to three left-to-right segments onto last, first and middle.
    pub fn from_segments<S: AsRef<str>>(
        segments: &[S],
        source: Source,
        corroboration: Corroboration,
    ) -> NameCandidates {
        let mut names = NameCandidates::default();
        for (field, segment) in Field::ALL.iter().zip(segments) {
            names.set(
                *field,
                Candidate::new(*field, segment.as_ref(), source).map(|c| c.corroborated(corroboration)),
            );
        }
        names
    }

    pub fn get(&self, field: Field) -> Option<&Candidate> {
        match field {
            Field::Last => self.last.as_ref(),
            Field::First => self.first.as_ref(),
            Field::Middle => self.middle.as_ref(),
        }
    }

    pub fn set(&mut self, field: Field, candidate: Option<Candidate>) {
        match field {
            Field::Last => self.last = candidate,
            Field::First => self.first = candidate,
            Field::Middle => self.middle = candidate,
        }
    }

    pub fn text(&self, field: Field) -> &str {
        self.get(field).map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        [&self.last, &self.first, &self.middle]
            .into_iter()
            .filter_map(|c| c.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// A surname or a first name is present; a middle name alone is not
    /// enough to stop looking.
    pub fn has_primary(&self) -> bool {
        self.last.is_some() || self.first.is_some()
    }
}
