//! Final precedence between caption-anchored values, plain-text captions and
//! fallback guesses.

use log::{debug, info};
use serde::Serialize;

use crate::{
    candidate::{Candidate, Corroboration, Field, NameCandidates, Source},
    chain::{run_chain, ExtractionContext},
    gate,
    geometry::Roi,
    labels::{field_label, find_label, has_label},
    raw_text::{self, Choice, LabelPatterns, LabelValues},
    reocr::{FieldHint, Passes},
    roi::surname_region,
    text::{alpha_len, is_uppercase_word, letters_upper, levenshtein},
};

/// Re-reads of the surname box that are printed form text, not a name.
const REFINE_NOISE: [&str; 8] = ["FT", "NOT", "NAME", "LAST", "FIRST", "MIDDLE", "SURNAME", "GIVEN"];
/// Share of the page height re-read for a word-level surname guess.
const PAGE_TOP: f32 = 0.35;
const MIN_PAGE_TOP: i32 = 40;

/// The three name fields handed back to callers. Empty strings mean no
/// acceptable value was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    /// At least one value came from a layout or plain-text guess rather than
    /// a printed caption.
    pub fallback_used: bool,
}

impl FieldResult {
    fn of(names: &NameCandidates) -> FieldResult {
        FieldResult {
            last_name: names.text(Field::Last).to_owned(),
            first_name: names.text(Field::First).to_owned(),
            middle_name: names.text(Field::Middle).to_owned(),
            fallback_used: names.iter().any(|c| c.source.is_fallback()),
        }
    }

    /// No name was found; the form was still processed.
    pub fn is_empty(&self) -> bool {
        self.last_name.is_empty() && self.first_name.is_empty() && self.middle_name.is_empty()
    }
}

/// Runs the strategy chain and settles every field.
///
/// The chain's surname is re-read from its box when it looks like a single
/// uppercase word, caption values from plain text may then replace chain
/// values, and a page-wide line or word guess fills an otherwise empty
/// result. Every value returned has passed the gate.
pub fn assemble(ctx: &ExtractionContext, patterns: &LabelPatterns) -> FieldResult {
    let outcome = run_chain(ctx);
    let mut names = outcome.names;

    refine_surname(ctx, &mut names);
    override_from_labels(&mut names, &patterns.label_values(ctx.raw_text));
    if names.is_empty() && !outcome.fallback_used {
        let given_allowed = outcome.given_proposed
            || has_label(ctx.tokens, Field::First)
            || has_label(ctx.tokens, Field::Middle);
        global_guess(ctx, &mut names, given_allowed);
    }

    let result = FieldResult::of(&names);
    info!(
        "assembled last={:?} first={:?} middle={:?} fallback_used={}",
        result.last_name, result.first_name, result.middle_name, result.fallback_used
    );
    result
}

fn refine_surname(ctx: &ExtractionContext, names: &mut NameCandidates) {
    let current = match names.last.as_ref() {
        Some(current) => current,
        None => return,
    };
    if ctx.page.is_none()
        || current.signals.token_count != 1
        || current.signals.alpha_length < 4
        || !is_uppercase_word(&current.text)
    {
        return;
    }

    let label = find_label(ctx.tokens, field_label(Field::Last));
    let roi = surname_region(label.as_ref(), &ctx.bounds);
    let passes = ctx.read_region(&roi, FieldHint::Surname);
    if passes.is_empty() {
        debug!("surname box re-read came back empty, keeping {:?}", current.text);
        return;
    }
    let (text, corroboration) = match better_surname(&current.text, &passes) {
        Some(better) => better,
        None => {
            debug!("surname re-read {:?} does not improve on {:?}", passes, current.text);
            return;
        }
    };

    let refined = match Candidate::new(Field::Last, &text, current.source) {
        Some(refined) => refined.corroborated(corroboration),
        None => return,
    };
    match gate::judge(&refined) {
        Ok(()) => {
            info!("surname refined from {:?} to {:?}", current.text, refined.text);
            names.last = Some(refined);
        }
        Err(reason) => debug!("refined surname {:?} rejected: {}", refined.text, reason),
    }
}

/// A re-read that should replace `current`: both passes agreeing on
/// something other than caption noise, or else the better pass when it is
/// longer or clearly different.
fn better_surname(current: &str, passes: &Passes) -> Option<(String, Corroboration)> {
    let word = letters_upper(&passes.word);
    let line = letters_upper(&passes.line);

    let (text, corroboration) = if word == line && word.len() >= 2 && !is_noise(&word) {
        (word, Corroboration::Consensus)
    } else {
        let pick = gate::pick_pass(current, &[&word, &line]);
        let len = alpha_len(&pick);
        let longer = len > 2.max(alpha_len(current));
        let different = len >= 2 && levenshtein(&pick, current) >= 2;
        if is_noise(&pick) || !(longer || different) {
            return None;
        }
        (pick, Corroboration::None)
    };
    (text != current).then_some((text, corroboration))
}

fn is_noise(word: &str) -> bool {
    REFINE_NOISE.contains(&word)
}

fn override_from_labels(names: &mut NameCandidates, values: &LabelValues) {
    for field in Field::ALL {
        let raw = match values.get(field) {
            Some(raw) => raw,
            None => continue,
        };
        let current = names.text(field);
        if raw_text::prefer_name(current, raw) == Choice::Layout {
            debug!("{} keeps {:?} over caption text {:?}", field.key(), current, raw);
            continue;
        }
        let candidate = match Candidate::new(field, raw, Source::RawTextLabel) {
            Some(candidate) => candidate,
            None => continue,
        };
        match gate::judge(&candidate) {
            Ok(()) => {
                info!("{} {:?} replaced by caption text {:?}", field.key(), current, candidate.text);
                names.set(field, Some(candidate));
            }
            Err(reason) => debug!(
                "caption text {:?} for {} rejected: {}",
                candidate.text,
                field.key(),
                reason
            ),
        }
    }
}

/// Page-wide guess: the best text line, or failing that the best uppercase
/// word, whose surname is then checked against a re-read of the top of the
/// page. Given names are only taken when allowed; otherwise address lines
/// would become names.
fn global_guess(ctx: &ExtractionContext, names: &mut NameCandidates, given_allowed: bool) {
    let (segments, surname_corroboration) = match raw_text::global_line_names(ctx.raw_text) {
        Some(segments) => (segments, Corroboration::None),
        None => match raw_text::global_word_names(ctx.raw_text) {
            Some(mut segments) => {
                let corroboration = segments
                    .first_mut()
                    .map_or(Corroboration::None, |surname| reread_page_top(ctx, surname));
                (segments, corroboration)
            }
            None => return,
        },
    };
    for (field, segment) in Field::ALL.into_iter().zip(&segments) {
        if field != Field::Last && !given_allowed {
            debug!("no given-name evidence, dropping {:?} for {}", segment, field.key());
            continue;
        }
        let candidate = match Candidate::new(field, segment, Source::RawTextHeuristic) {
            Some(candidate) if field == Field::Last => candidate.corroborated(surname_corroboration),
            Some(candidate) => candidate,
            None => continue,
        };
        match gate::judge(&candidate) {
            Ok(()) => {
                info!("{} guessed from page text: {:?}", field.key(), candidate.text);
                names.set(field, Some(candidate));
            }
            Err(reason) => debug!("page-text guess {:?} rejected: {}", candidate.text, reason),
        }
    }
}

/// Reads the top of the page as one block-letter word and keeps the better
/// of that and `surname`.
fn reread_page_top(ctx: &ExtractionContext, surname: &mut String) -> Corroboration {
    let (page, bounds) = match (ctx.page, ctx.image_bounds()) {
        (Some(page), Some(bounds)) => (page, bounds),
        _ => return Corroboration::None,
    };
    let roi = Roi::from_edges(0, 0, bounds.width, bounds.y(PAGE_TOP).max(MIN_PAGE_TOP), &bounds);
    let passes = ctx.reocr.region(page, &roi, FieldHint::Surname);
    match better_surname(surname.as_str(), &passes) {
        Some((text, corroboration)) => {
            info!("page-top re-read turns {:?} into {:?}", surname, text);
            *surname = text;
            corroboration
        }
        None => {
            debug!("page-top re-read {:?} keeps {:?}", passes, surname);
            Corroboration::None
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, Luma};

    use super::*;
    use crate::{
        chain::tests::{context, top_row},
        geometry::{PageBounds, Token},
        ocr::{scripted::ScriptedEngine, OutputMode, Psm},
    };

    fn labelled(value: &str) -> Vec<Token> {
        vec![
            Token::new(value, 90, 10, 110, 35),
            Token::new("Last", 100, 50, 40, 14),
            Token::new("Name", 160, 52, 40, 14),
        ]
    }

    fn patterns() -> LabelPatterns {
        LabelPatterns::new().unwrap()
    }

    #[test]
    fn caption_value_needs_no_fallback() {
        let tokens = labelled("DELACRUZ");
        let engine = ScriptedEngine::new();
        let result = assemble(&context(&tokens, "", &engine), &patterns());
        assert_eq!(result.last_name, "DELACRUZ");
        assert_eq!(result.first_name, "");
        assert!(!result.fallback_used);
    }

    #[test]
    fn top_row_is_a_fallback_result() {
        let tokens = top_row();
        let engine = ScriptedEngine::new();
        let result = assemble(&context(&tokens, "", &engine), &patterns());
        assert_eq!(
            result,
            FieldResult {
                last_name: "SANTOS".to_owned(),
                first_name: "MARIA".to_owned(),
                middle_name: "REYES".to_owned(),
                fallback_used: true,
            }
        );
    }

    #[test]
    fn address_only_page_gives_an_empty_result() {
        let tokens = vec![
            Token::new("BARANGAY", 10, 10, 150, 30),
            Token::new("POBLACION", 200, 10, 160, 30),
            Token::new("LINGAYEN", 400, 10, 150, 30),
        ];
        let engine = ScriptedEngine::new();
        let result = assemble(
            &context(&tokens, "BARANGAY POBLACION LINGAYEN", &engine),
            &patterns(),
        );
        assert!(result.is_empty());
        assert!(!result.fallback_used);
    }

    #[test]
    fn assembling_twice_gives_the_same_result() {
        let tokens = top_row();
        let engine = ScriptedEngine::new();
        let ctx = context(&tokens, "Last Name: SANTOS", &engine);
        assert_eq!(assemble(&ctx, &patterns()), assemble(&ctx, &patterns()));
    }

    #[test]
    fn caption_text_replaces_fused_surname() {
        let tokens = labelled("DELACRUZ");
        let engine = ScriptedEngine::new();
        let result = assemble(
            &context(&tokens, "Last Name: DELA CRUZ\n", &engine),
            &patterns(),
        );
        assert_eq!(result.last_name, "DELA CRUZ");
        assert!(!result.fallback_used);
    }

    #[test]
    fn implausible_caption_text_is_ignored() {
        let tokens = labelled("DELACRUZ");
        let engine = ScriptedEngine::new();
        let result = assemble(
            &context(&tokens, "Last Name: Brgy San Roque\n", &engine),
            &patterns(),
        );
        assert_eq!(result.last_name, "DELACRUZ");
    }

    #[test]
    fn page_guess_fills_given_names_only_under_a_caption() {
        let engine = ScriptedEngine::new();
        let result = assemble(&context(&[], "MENDOZA Pedro\n", &engine), &patterns());
        assert_eq!(result.last_name, "MENDOZA");
        assert_eq!(result.first_name, "");
        assert!(result.fallback_used);

        let captions = vec![
            Token::new("First", 100, 50, 40, 14),
            Token::new("Name", 160, 52, 40, 14),
        ];
        let result = assemble(&context(&captions, "MENDOZA Pedro\n", &engine), &patterns());
        assert_eq!(result.last_name, "MENDOZA");
        assert_eq!(result.first_name, "Pedro");
    }

    #[test]
    fn page_word_guess_fills_the_surname() {
        let engine = ScriptedEngine::new();
        let result = assemble(&context(&[], "ana del ROMERO\n", &engine), &patterns());
        assert_eq!(result.last_name, "ROMERO");
        assert_eq!(result.first_name, "");
        assert!(result.fallback_used);
    }

    #[test]
    fn page_top_reread_corrects_a_word_guess() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(600, 400, Luma([255])));
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleWord, "ROMANO")
            .answer(OutputMode::Text, Psm::SingleLine, "ROMANO");
        let mut ctx = context(&[], "ana del ROMERO\n", &engine);
        ctx.page = Some(&page);

        let result = assemble(&ctx, &patterns());
        assert_eq!(result.last_name, "ROMANO");
        assert!(result.fallback_used);
        assert!(engine
            .calls()
            .iter()
            .filter(|c| c.mode == OutputMode::Text)
            .all(|c| c.whitelist == Some(crate::ocr::UPPER_WHITELIST) && !c.dictionary));
    }

    #[test]
    fn word_guess_keeps_given_names_after_an_accepted_middle_name() {
        let text = "Name: BAUTISTA Carlo Reyes\n";
        let engine = ScriptedEngine::new();
        let result = assemble(&context(&[], text, &engine), &patterns());
        assert_eq!(result.last_name, "BAUTISTA");
        assert_eq!(result.first_name, "");

        let tokens = vec![
            Token::new("ZONE", 10, 10, 100, 30),
            Token::new("DISTRICT", 200, 10, 160, 30),
            Token::new("LINGAYEN", 420, 10, 150, 30),
        ];
        let result = assemble(&context(&tokens, text, &engine), &patterns());
        assert_eq!(
            result,
            FieldResult {
                last_name: "BAUTISTA".to_owned(),
                first_name: "Carlo".to_owned(),
                middle_name: "Reyes".to_owned(),
                fallback_used: true,
            }
        );
    }

    #[test]
    fn agreeing_surname_reads_replace_the_layout_value() {
        let tokens = labelled("REYEZ");
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(600, 400, Luma([255])));
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleWord, "REYES")
            .answer(OutputMode::Text, Psm::SingleLine, "REYES");
        let mut ctx = context(&tokens, "", &engine);
        ctx.page = Some(&page);
        ctx.bounds = PageBounds {
            width: 600,
            height: 400,
        };

        let result = assemble(&ctx, &patterns());
        assert_eq!(result.last_name, "REYES");
        assert!(!result.fallback_used);
    }

    #[test]
    fn caption_noise_does_not_refine_the_surname() {
        let tokens = labelled("REYES");
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(600, 400, Luma([255])));
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleWord, "NAME")
            .answer(OutputMode::Text, Psm::SingleLine, "NAME");
        let mut ctx = context(&tokens, "", &engine);
        ctx.page = Some(&page);
        ctx.bounds = PageBounds {
            width: 600,
            height: 400,
        };

        assert_eq!(assemble(&ctx, &patterns()).last_name, "REYES");
    }
}
