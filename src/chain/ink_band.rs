use image::{imageops, GrayImage};
use log::{debug, info};

use super::{above_name, label_based, ExtractionContext};
use crate::{
    candidate::{Corroboration, Field, NameCandidates, Source},
    gate,
    geometry::PageBounds,
    imaging::{self, Enhancement},
    ocr::{parse_tokens, OcrRequest, Psm, LETTER_WHITELIST, NAME_WHITELIST},
    roi::top_band,
    text::{alpha_len, clean_name, is_weak_name, looks_like_address, looks_like_label},
};

/// Column spans for last, first and middle as fractions of the band width.
const COLUMNS: [(f32, f32); 3] = [(0.0, 0.33), (0.33, 0.66), (0.66, 0.88)];
/// Crops shorter than this are read without the companion script.
const MIN_PREPROCESS_HEIGHT: u32 = 70;
const MIN_NAME_LETTERS: usize = 6;

/// Lays out the top band from its own word boxes, then falls back to reading
/// fixed columns of its densest handwriting rows. Both readings are tried on
/// the band as scanned and turned a quarter either way.
pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let bounds = ctx.image_bounds()?;
    let crop = imaging::crop(ctx.page?, &top_band(&bounds))?;
    let band = imaging::enhance(&crop, &Enhancement::band(ctx.reocr.settings().contrast));
    let rotations = imaging::rotations(&band);

    for (degrees, rotated) in &rotations {
        if let Some(names) = band_layout(ctx, rotated) {
            if is_substantial(&names) {
                info!("top band laid out at {} degrees: {:?}", degrees, names);
                return Some(names);
            }
            debug!("top band layout at {} degrees too thin: {:?}", degrees, names);
        }
    }

    for (degrees, rotated) in &rotations {
        let ink = match imaging::find_ink_band(rotated) {
            Some(ink) => imaging::fit_band(ink, rotated.height()),
            None => {
                debug!("no handwriting band at {} degrees", degrees);
                continue;
            }
        };
        let strip =
            imageops::crop_imm(rotated, 0, ink.top, rotated.width(), ink.bottom - ink.top).to_image();
        let texts: Vec<String> = COLUMNS
            .iter()
            .zip(Field::ALL)
            .map(|(&(from, to), field)| {
                let mut column = imaging::column(&strip, from, to);
                imaging::whiten_rule_lines(&mut column);
                read_column(ctx, &column, field)
            })
            .collect();

        let names = gate::filter(NameCandidates::from_segments(
            &texts,
            Source::FallbackDensityBand,
            Corroboration::None,
        ));
        if is_substantial(&names) {
            info!("handwriting band at {} degrees read as {:?}", degrees, texts);
            return Some(names);
        }
        debug!("band at {} degrees gave nothing usable: {:?}", degrees, texts);
    }
    None
}

/// Word boxes of the band, sparse first and as a block when that finds no
/// surname or first name, handed to the caption and Name-anchor layouts.
fn band_layout(ctx: &ExtractionContext, band: &GrayImage) -> Option<NameCandidates> {
    for psm in [Psm::SparseText, Psm::Block] {
        let request = OcrRequest::tsv(psm).whitelist(NAME_WHITELIST);
        let tokens = parse_tokens(&ctx.reocr.read(band, None, &[request]).concat());
        if tokens.is_empty() {
            continue;
        }
        let nested = ExtractionContext {
            tokens: &tokens,
            bounds: PageBounds::of(&tokens),
            page: None,
            raw_text: "",
            reocr: ctx.reocr.clone(),
        };
        let names = match label_based::extract(&nested).or_else(|| above_name::extract(&nested)) {
            Some(names) => gate::filter(names),
            None => continue,
        };
        if !names.has_primary() {
            continue;
        }
        if names.iter().any(|c| looks_like_address(&c.text)) {
            debug!("top band layout reads as an address: {:?}", names);
            return None;
        }
        let mut relabelled = NameCandidates::default();
        for mut candidate in names.iter().cloned() {
            candidate.source = Source::FallbackDensityBand;
            relabelled.set(candidate.field, Some(candidate));
        }
        return Some(relabelled);
    }
    None
}

/// Enough letters between surname and first name to be a name rather than
/// stray strokes, and nothing caption-like or fragmentary.
fn is_substantial(names: &NameCandidates) -> bool {
    let letters = |field| alpha_len(names.text(field));
    let (last, first) = (letters(Field::Last), letters(Field::First));
    if (last <= 3 && first <= 3) || last + first + letters(Field::Middle) < MIN_NAME_LETTERS {
        return false;
    }
    names
        .iter()
        .all(|c| !looks_like_label(&c.text) && !is_weak_name(&c.text))
}

/// Word pass first, line pass when it yields fewer than three letters. The
/// result is blanked when it reads as an address, a caption or noise.
fn read_column(ctx: &ExtractionContext, column: &GrayImage, field: Field) -> String {
    let deskew = (column.height() >= MIN_PREPROCESS_HEIGHT).then_some(true);
    let request = |psm| {
        OcrRequest::text(psm)
            .whitelist(LETTER_WHITELIST)
            .without_dictionary()
    };

    let mut text = ctx
        .reocr
        .read(column, deskew, &[request(Psm::SingleWord)])
        .concat();
    if alpha_len(&text) < 3 {
        text = ctx
            .reocr
            .read(column, deskew, &[request(Psm::SingleLine)])
            .concat();
    }
    let cleaned = clean_name(&text);
    if looks_like_address(&text) || looks_like_label(&cleaned) || is_weak_name(&cleaned) {
        if !cleaned.is_empty() {
            debug!("{} column {:?} discarded", field.key(), text.trim());
        }
        return String::new();
    }
    cleaned
}
