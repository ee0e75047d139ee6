use std::cmp::Reverse;

use log::{debug, info};

use super::{read_segments, ExtractionContext};
use crate::{
    candidate::{NameCandidates, Source},
    geometry::{cluster_into_lines, partition_by_x_gap, Token, COLUMN_GAP, LINE_TOLERANCE},
    labels::is_label_token,
    text::{approx_equals, has_letter_run, letters_lower},
};

/// Height of the writing area searched above the "Name" caption.
const SEARCH_HEIGHT: i32 = 220;

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let caption_height = median_height(ctx.tokens)?;
    let name_top = ctx
        .tokens
        .iter()
        .filter(|t| is_name_anchor(t, caption_height))
        .map(|t| t.top)
        .min()?;
    let bottom = (name_top - 4).max(0);
    let top = (bottom - SEARCH_HEIGHT).max(0);

    let candidates: Vec<&Token> = ctx
        .tokens
        .iter()
        .filter(|t| t.top >= top && t.bottom <= bottom)
        .filter(|t| !is_label_token(&t.text))
        .filter(|t| has_letter_run(&t.text, 2) && !t.text.ends_with('-'))
        .collect();
    if candidates.is_empty() {
        debug!("nothing written between {} and {} above the Name caption", top, bottom);
        return None;
    }

    let mut lines = cluster_into_lines(&candidates, LINE_TOLERANCE);
    lines.sort_by_key(|l| Reverse((l.width(), l.tokens.len())));
    let segments = lines
        .iter()
        .map(|l| partition_by_x_gap(&l.tokens, COLUMN_GAP))
        .find(|segments| segments.len() >= 3)?;
    info!("line above the Name caption splits into {} segments", segments.len());
    Some(read_segments(ctx, &segments, Source::FallbackAboveName))
}

/// "Name" as printed, or a near miss no taller than the median word. Tall
/// near misses ("JANE", "NAMO") are handwriting.
fn is_name_anchor(token: &Token, median: i32) -> bool {
    letters_lower(&token.text) == "name" || (token.height < median && approx_equals(&token.text, "name"))
}

fn median_height(tokens: &[Token]) -> Option<i32> {
    let mut heights: Vec<i32> = tokens.iter().map(|t| t.height).collect();
    heights.sort_unstable();
    heights.get(heights.len() / 2).copied()
}
