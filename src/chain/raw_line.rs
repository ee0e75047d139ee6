use image::DynamicImage;
use log::debug;

use super::ExtractionContext;
use crate::{
    candidate::{Corroboration, NameCandidates, Source},
    imaging::{self, Enhancement},
    ocr::{OcrRequest, Psm, NAME_WHITELIST},
    raw_text,
    roi::top_band,
};

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let segments = ctx
        .page
        .and_then(|page| top_band_text(ctx, page))
        .and_then(|text| raw_text::line_segments(&text))
        .or_else(|| raw_text::line_segments(ctx.raw_text))?;
    Some(NameCandidates::from_segments(
        &segments,
        Source::RawTextHeuristic,
        Corroboration::None,
    ))
}

/// Plain text of the page's top band, sparse mode first then block mode.
fn top_band_text(ctx: &ExtractionContext, page: &DynamicImage) -> Option<String> {
    let bounds = ctx.image_bounds()?;
    let crop = imaging::crop(page, &top_band(&bounds))?;
    let settings = ctx.reocr.settings();
    let gray = imaging::enhance(&crop, &Enhancement::crop(settings.upscale, settings.contrast));
    let request = |psm| OcrRequest::text(psm).whitelist(NAME_WHITELIST);
    let text = ctx
        .reocr
        .read_with_backup(&gray, None, &[request(Psm::SparseText)], &request(Psm::Block))
        .concat();
    if text.trim().is_empty() {
        debug!("top band OCR came back empty");
        return None;
    }
    Some(text)
}
