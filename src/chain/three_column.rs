use std::cmp::Reverse;

use log::debug;

use super::{band_candidates, read_segments, ExtractionContext};
use crate::{
    candidate::{Corroboration, NameCandidates, Source},
    geometry::{cluster_into_lines, joined_text, partition_by_x_gap, Token, COLUMN_GAP, LINE_TOLERANCE},
};

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let band = band_candidates(ctx);
    if band.is_empty() {
        return None;
    }
    gap_segments(ctx, &band).or_else(|| fixed_thirds(ctx, &band))
}

/// The most populated line of the band, when it splits into three boxes.
fn gap_segments(ctx: &ExtractionContext, band: &[&Token]) -> Option<NameCandidates> {
    let mut lines = cluster_into_lines(band, LINE_TOLERANCE);
    lines.sort_by_key(|l| Reverse(l.tokens.len()));
    let segments = lines
        .iter()
        .map(|l| partition_by_x_gap(&l.tokens, COLUMN_GAP))
        .find(|segments| segments.len() >= 3)?;
    Some(read_segments(ctx, &segments, Source::FallbackThreeCol))
}

/// Tokens placed by the page third they fit in.
fn fixed_thirds(ctx: &ExtractionContext, band: &[&Token]) -> Option<NameCandidates> {
    if ctx.bounds.is_empty() {
        return None;
    }
    let width = ctx.bounds.width;
    let third = width / 3;
    let height = ctx.band_bottom().max(40);
    let columns = [(0, third), (third + 1, 2 * third), (2 * third + 1, width)];

    let mut texts = columns.map(|(left, right)| {
        let inside: Vec<&Token> = band
            .iter()
            .copied()
            .filter(|t| t.left >= left && t.right <= right && t.bottom <= height)
            .collect();
        joined_text(&inside)
    });
    rebalance(&mut texts);
    debug!("page thirds read as {:?}", texts);
    if texts.iter().all(String::is_empty) {
        return None;
    }
    Some(NameCandidates::from_segments(
        &texts,
        Source::FallbackThreeCol,
        Corroboration::None,
    ))
}

/// Shifts values left when the surname column came out empty.
fn rebalance(texts: &mut [String; 3]) {
    let [last, first, middle] = texts;
    if !last.is_empty() || first.is_empty() {
        return;
    }
    if middle.is_empty() {
        std::mem::swap(last, first);
    } else {
        *last = std::mem::take(first);
        *first = std::mem::take(middle);
    }
}
