//! Ordered extraction strategies, from caption-anchored reads down to
//! plain-text guessing.

mod above_name;
mod ink_band;
mod kmeans;
mod label_based;
mod longest_upper;
mod raw_line;
mod three_column;

use std::fmt;

use image::{DynamicImage, GenericImageView};
use log::{debug, info};

use crate::{
    candidate::{Candidate, Corroboration, Field, NameCandidates, Source},
    gate,
    geometry::{joined_text, PageBounds, Roi, Token},
    reocr::{FieldHint, Passes, ReOcr},
    roi::compute_band_bottom,
    text::{has_letter_run, is_uppercase_word, letters_lower, within_edit_tolerance, LABEL_WORDS},
};

pub use kmeans::cluster_three;

/// Everything a strategy may look at for one form.
pub struct ExtractionContext<'a> {
    pub tokens: &'a [Token],
    pub bounds: PageBounds,
    /// Decoded page; `None` when the upload could not be decoded, in which
    /// case image strategies are skipped.
    pub page: Option<&'a DynamicImage>,
    pub raw_text: &'a str,
    pub reocr: ReOcr<'a>,
}

impl<'a> ExtractionContext<'a> {
    pub fn band_bottom(&self) -> i32 {
        compute_band_bottom(self.tokens, &self.bounds)
    }

    /// Both re-read passes of `roi`, empty without a page image.
    pub fn read_region(&self, roi: &Roi, hint: FieldHint) -> Passes {
        match self.page {
            Some(page) => self.reocr.region(page, roi, hint),
            None => Passes::default(),
        }
    }

    /// Pixel dimensions of the page image.
    pub fn image_bounds(&self) -> Option<PageBounds> {
        self.page.map(|page| {
            let (width, height) = page.dimensions();
            PageBounds {
                width: width as i32,
                height: height as i32,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    LabelBased,
    AboveNameAnchor,
    LongestUppercaseInBand,
    DynamicInkDensityBand,
    ThreeColumnSplit,
    KMeansThreeCluster,
    RawTextLineHeuristic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::LabelBased => "label_based",
            Strategy::AboveNameAnchor => "above_name_anchor",
            Strategy::LongestUppercaseInBand => "longest_uppercase_in_band",
            Strategy::DynamicInkDensityBand => "dynamic_ink_density_band",
            Strategy::ThreeColumnSplit => "three_column_split",
            Strategy::KMeansThreeCluster => "kmeans_three_cluster",
            Strategy::RawTextLineHeuristic => "raw_text_line_heuristic",
        };
        f.write_str(name)
    }
}

type StrategyFn = fn(&ExtractionContext) -> Option<NameCandidates>;

/// Strategies in the order they are tried.
pub const CHAIN: [(Strategy, StrategyFn); 7] = [
    (Strategy::LabelBased, label_based::extract),
    (Strategy::AboveNameAnchor, above_name::extract),
    (Strategy::LongestUppercaseInBand, longest_upper::extract),
    (Strategy::DynamicInkDensityBand, ink_band::extract),
    (Strategy::ThreeColumnSplit, three_column::extract),
    (Strategy::KMeansThreeCluster, kmeans::extract),
    (Strategy::RawTextLineHeuristic, raw_line::extract),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainOutcome {
    /// Gate-accepted names of the winning strategy.
    pub names: NameCandidates,
    pub strategy: Option<Strategy>,
    /// A fallback strategy supplied at least one accepted value.
    pub fallback_used: bool,
    /// Some strategy had an acceptable first or middle name, whether or not
    /// it settled the chain.
    pub given_proposed: bool,
}

/// Tries every strategy in turn and stops at the first whose gated output
/// holds a surname or a first name. Exhausting the chain is not an error:
/// the outcome is then empty.
pub fn run_chain(ctx: &ExtractionContext) -> ChainOutcome {
    let mut given_proposed = false;
    for (strategy, extract) in CHAIN {
        let names = match extract(ctx) {
            Some(names) => names,
            None => {
                debug!("{} found nothing", strategy);
                continue;
            }
        };
        let accepted = gate::filter(names);
        given_proposed |= accepted.first.is_some() || accepted.middle.is_some();
        if accepted.has_primary() {
            let fallback_used = accepted.iter().any(|c| c.source.is_fallback());
            info!(
                "{} settled last={:?} first={:?} middle={:?}",
                strategy,
                accepted.text(Field::Last),
                accepted.text(Field::First),
                accepted.text(Field::Middle)
            );
            return ChainOutcome {
                names: accepted,
                strategy: Some(strategy),
                fallback_used,
                given_proposed,
            };
        }
        debug!("{} produced no acceptable surname or first name", strategy);
    }
    info!("all strategies exhausted, no name found");
    ChainOutcome {
        given_proposed,
        ..ChainOutcome::default()
    }
}

/// Handwriting-like tokens of the top writing band: no captions, a run of
/// three letters, no dangling hyphen.
fn band_candidates<'a>(ctx: &ExtractionContext<'a>) -> Vec<&'a Token> {
    let bottom = ctx.band_bottom();
    ctx.tokens
        .iter()
        .filter(|t| t.top <= bottom)
        .filter(|t| !is_caption_word(&t.text))
        .filter(|t| has_letter_run(&t.text, 3) && !t.text.ends_with('-'))
        .collect()
}

/// Caption word, exactly or within edit tolerance.
fn is_caption_word(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    let letters = letters_lower(text);
    LABEL_WORDS.iter().any(|l| {
        lower == *l
            || lower.strip_suffix('.') == Some(*l)
            || (!letters.is_empty() && within_edit_tolerance(&letters, l))
    })
}

const SEGMENT_PAD: i32 = 6;

/// Maps the first three x-gap segments onto last, first and middle, each
/// re-read from the page when one is available.
fn read_segments(ctx: &ExtractionContext, segments: &[Vec<&Token>], source: Source) -> NameCandidates {
    let mut names = NameCandidates::default();
    for (field, segment) in Field::ALL.into_iter().zip(segments) {
        let layout = joined_text(segment);
        let passes = Roi::around(segment, SEGMENT_PAD, &ctx.bounds)
            .map(|roi| ctx.read_region(&roi, FieldHint::for_field(field)))
            .unwrap_or_default();
        names.set(field, reconcile(field, &layout, &passes, source));
    }
    names
}

fn reconcile(field: Field, layout: &str, passes: &Passes, source: Source) -> Option<Candidate> {
    let reread = gate::pick_pass(layout, &[&passes.word, &passes.line]);
    let single_upper = layout.split_whitespace().count() == 1 && is_uppercase_word(layout);
    let text = match field {
        Field::Last if single_upper => gate::choose_upper(layout, &reread),
        _ => gate::prefer_candidate(layout, &reread),
    };
    if text != layout {
        debug!("{} segment {:?} re-read as {:?}", field.key(), layout, text);
    }

    let agreed = gate::consensus(&passes.word, &passes.line);
    let corroboration = if agreed.map_or(false, |a| a.eq_ignore_ascii_case(&text)) {
        Corroboration::Consensus
    } else if letters_lower(&text) == letters_lower(layout) {
        Corroboration::Layout
    } else {
        Corroboration::None
    };
    Candidate::new(field, &text, source).map(|c| c.corroborated(corroboration))
}
