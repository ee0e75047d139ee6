use log::{debug, info};

use super::ExtractionContext;
use crate::{
    candidate::{Candidate, Corroboration, Field, NameCandidates, Source},
    gate::{best_upper, is_pronounceable},
    geometry::{Roi, Token},
    imaging::{self, Enhancement},
    ocr::{OcrRequest, Psm, UPPER_MARKS_WHITELIST},
};

const MIN_RUN: usize = 5;
const MAX_RUN: usize = 20;
/// Share of the page width where the surname box sits.
const LEFT_COLUMN: f32 = 0.40;
const LABEL_FRAGMENTS: [&str; 5] = ["LASTNAME", "FIRSTNAME", "MIDDLENAME", "SURNAME", "NAME"];

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    if ctx.bounds.is_empty() {
        return None;
    }
    let right = ctx.bounds.x(LEFT_COLUMN).max(10);
    let bottom = ctx.band_bottom();
    let inside: Vec<&Token> = ctx
        .tokens
        .iter()
        .filter(|t| t.top <= bottom && t.left >= 0 && t.right <= right)
        .collect();

    let (pick, corroboration) = match heuristic_pick(&inside) {
        Some(pick) => (pick, Corroboration::None),
        None => {
            let region = Roi::from_edges(0, 0, right, bottom.max(30), &ctx.bounds);
            reread_pick(ctx, &region)?
        }
    };
    info!("longest uppercase run in the surname column: {:?}", pick);
    let last = Candidate::new(Field::Last, &pick, Source::FallbackLongestUpper)
        .map(|c| c.corroborated(corroboration));
    Some(NameCandidates {
        last,
        ..NameCandidates::default()
    })
}

fn eligible(word: &str) -> bool {
    word.len() <= MAX_RUN
        && !LABEL_FRAGMENTS.iter().any(|l| word.contains(l))
        && is_pronounceable(word)
}

/// Longest pronounceable uppercase run among the tokens, also trying their
/// uppercase letters run together ("DELA CRUZ" as "DELACRUZ").
fn heuristic_pick(tokens: &[&Token]) -> Option<String> {
    let text = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let upper_only: String = text
        .chars()
        .map(|c| if c.is_ascii_uppercase() { c } else { ' ' })
        .collect();

    let mut runs: Vec<String> = upper_only
        .split_whitespace()
        .filter(|w| w.len() >= MIN_RUN)
        .map(str::to_owned)
        .collect();
    let collapsed: String = upper_only.split_whitespace().collect();
    if collapsed.len() >= MIN_RUN {
        runs.push(collapsed);
    }

    let mut pick: Option<String> = None;
    for run in runs {
        if !eligible(&run) {
            debug!("uppercase run {:?} rejected", run);
            continue;
        }
        if pick.as_ref().map_or(true, |p| run.len() > p.len()) {
            pick = Some(run);
        }
    }
    pick
}

fn upper_words(output: &str) -> Vec<String> {
    output
        .to_uppercase()
        .split(|c: char| !c.is_ascii_uppercase())
        .filter(|w| w.len() >= 4)
        .map(str::to_owned)
        .collect()
}

/// Re-reads the surname column with block-letter settings. Words every pass
/// agrees on are preferred over the union of all passes.
fn reread_pick(ctx: &ExtractionContext, region: &Roi) -> Option<(String, Corroboration)> {
    let page = ctx.page?;
    let crop = imaging::crop(page, region)?;
    let settings = ctx.reocr.settings();
    let gray = imaging::enhance(
        &crop,
        &Enhancement::surname(settings.surname_upscale, settings.contrast),
    );
    let request = |psm| {
        OcrRequest::text(psm)
            .whitelist(UPPER_MARKS_WHITELIST)
            .without_dictionary()
    };
    let outputs = ctx.reocr.read_with_backup(
        &gray,
        Some(true),
        &[Psm::SingleLine, Psm::SingleWord, Psm::RawLine].map(request),
        &request(Psm::Block),
    );
    let passes: Vec<Vec<String>> = outputs.iter().map(|o| upper_words(o)).collect();
    let (head, rest) = passes.split_first()?;

    let agreed: Vec<&String> = head
        .iter()
        .filter(|w| rest.iter().all(|p| p.contains(*w)))
        .collect();
    let (pool, corroboration) = if agreed.is_empty() {
        let mut union: Vec<&String> = vec![];
        for word in passes.iter().flatten() {
            if !union.contains(&word) {
                union.push(word);
            }
        }
        (union, Corroboration::None)
    } else {
        (agreed, Corroboration::Consensus)
    };
    debug!("surname column re-read pool {:?}", pool);

    let pool: Vec<&str> = pool
        .into_iter()
        .map(String::as_str)
        .filter(|w| eligible(w))
        .collect();
    best_upper(&pool.join(" ")).map(|pick| (pick, corroboration))
}
