use log::debug;

use super::ExtractionContext;
use crate::{
    candidate::{Candidate, Field, NameCandidates, Source},
    geometry::{joined_text, LabelRect},
    labels::{field_label, find_label},
    reocr::{FieldHint, Passes},
    roi::{collect_value_tokens, extract_around_label, region_below_label},
    text::{alpha_len, is_weak_name, looks_like_label, mentions_vocabulary, ADDRESS_ANCHORS},
};

/// Fragments that mark a value below a caption as part of an address even
/// when OCR splits the word.
const BELOW_BLOCKLIST: [&str; 13] = [
    "prov", "region", "city", "muni", "barang", "street", "house", "zone", "purok", "sitio", "vill",
    "pob", "brgy",
];

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let mut names = NameCandidates::default();
    for field in Field::ALL {
        let label = match find_label(ctx.tokens, field_label(field)) {
            Some(label) => label,
            None => continue,
        };
        debug!("{} caption at {:?}", field.key(), label);
        names.set(field, read_label_value(ctx, field, &label));
    }
    (!names.is_empty()).then_some(names)
}

fn read_label_value(ctx: &ExtractionContext, field: Field, label: &LabelRect) -> Option<Candidate> {
    let hint = FieldHint::for_field(field);
    let above = extract_around_label(label, &ctx.bounds);
    let above_tokens = collect_value_tokens(ctx.tokens, &above);
    if !above_tokens.is_empty() {
        let mut joined = joined_text(&above_tokens);
        if mentions_vocabulary(&joined, &ADDRESS_ANCHORS) {
            debug!("discarding {:?} above the {} caption", joined, field.key());
            joined.clear();
        }
        return settle(field, &joined, &ctx.read_region(&above, hint), false);
    }

    if let Some(below) = region_below_label(label, &ctx.bounds) {
        let below_tokens = collect_value_tokens(ctx.tokens, &below);
        if !below_tokens.is_empty() {
            let joined = joined_text(&below_tokens);
            let blocked = below_tokens.iter().any(|t| {
                let lower = t.text.to_lowercase();
                BELOW_BLOCKLIST.iter().any(|b| lower.contains(b))
            });
            return settle(field, &joined, &ctx.read_region(&below, hint), blocked);
        }
    }

    let (text, corroboration) = ctx.read_region(&above, hint).reading("");
    Candidate::new(field, &text, Source::LabelReocr).map(|c| c.corroborated(corroboration))
}

/// Chooses between the words found in a region and its crop re-read.
fn settle(field: Field, joined: &str, passes: &Passes, blocked: bool) -> Option<Candidate> {
    let (crop, corroboration) = passes.reading(joined);
    let crop_wins = blocked
        || joined.is_empty()
        || looks_like_label(joined)
        || is_weak_name(joined)
        || alpha_len(&crop) > 2.max(alpha_len(joined));
    if crop_wins {
        debug!("{} taken from crop {:?} over {:?}", field.key(), crop, joined);
        Candidate::new(field, &crop, Source::LabelReocr).map(|c| c.corroborated(corroboration))
    } else {
        Candidate::new(field, joined, Source::LabelTsv)
    }
}
