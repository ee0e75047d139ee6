//! Regions where a handwritten value is expected relative to its caption or
//! to the page.

use crate::{
    geometry::{LabelRect, PageBounds, Roi, Token},
    labels::is_label_token,
    text::{alpha_len, letters_lower, matches_vocabulary, ADDRESS_ANCHORS, LABEL_WORDS},
};

/// Words never taken as part of a value inside a label region.
const VALUE_EXCLUDED: [&str; 10] = [
    "province",
    "region",
    "city",
    "municipality",
    "barangay",
    "street",
    "house",
    "purok",
    "sitio",
    "village",
];

/// Captions are never closer than this to the top edge when a usable
/// region exists below them.
const MIN_TOP_FOR_BELOW: i32 = 40;

/// Band above `label` where the handwritten value usually sits.
pub fn extract_around_label(label: &LabelRect, bounds: &PageBounds) -> Roi {
    let band = 80.max(4 * label.height);
    let bottom = label.top - 5;
    horizontal_span(label, bottom - band, bottom, bounds)
}

/// Same band below `label`; `None` for captions printed at the very top.
pub fn region_below_label(label: &LabelRect, bounds: &PageBounds) -> Option<Roi> {
    if label.top <= MIN_TOP_FOR_BELOW {
        return None;
    }
    let band = 80.max(4 * label.height);
    let top = label.bottom + 5;
    Some(horizontal_span(label, top, top + band, bounds))
}

fn horizontal_span(label: &LabelRect, top: i32, bottom: i32, bounds: &PageBounds) -> Roi {
    let left = label.left - 20;
    let right = label.right + 120.max(bounds.x(0.15));
    Roi::from_edges(left, top, right, bottom, bounds)
}

/// Lower edge of the handwriting band at the top of the form.
///
/// Uses the topmost caption word less a margin. When the captions sit at
/// the very top, or there are none, the topmost address caption bounds the
/// band instead, and failing both a third of the page height is assumed.
pub fn compute_band_bottom(tokens: &[Token], bounds: &PageBounds) -> i32 {
    let label_top = tokens
        .iter()
        .filter(|t| LABEL_WORDS.contains(&letters_lower(&t.text).as_str()))
        .map(|t| t.top)
        .min();
    if let Some(top) = label_top {
        if top > 24.max(bounds.y(0.06)) {
            return (top - 12.max(bounds.y(0.06))).max(0);
        }
    }

    let anchor_top = tokens
        .iter()
        .filter(|t| matches_vocabulary(&t.text, &ADDRESS_ANCHORS))
        .map(|t| t.top)
        .min();
    match anchor_top {
        Some(top) => (top - 10.max(bounds.y(0.04))).max(0),
        None => bounds.y(0.33),
    }
}

/// Tokens inside `roi` that can be part of a written value, left to right.
pub fn collect_value_tokens<'a>(tokens: &'a [Token], roi: &Roi) -> Vec<&'a Token> {
    let mut values: Vec<&Token> = tokens
        .iter()
        .filter(|t| roi.contains(t))
        .filter(|t| is_value_word(&t.text))
        .collect();
    values.sort_by_key(|t| t.left);
    values
}

fn is_value_word(text: &str) -> bool {
    let mut chars = text.chars();
    let starts_well = chars.next().map_or(false, |c| c.is_ascii_alphanumeric());
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '\''))
        && !text.ends_with('.')
        && !VALUE_EXCLUDED.contains(&text.to_lowercase().as_str())
        && !is_label_token(text)
        && alpha_len(text) >= 2
}

/// Top band of the page where the name boxes are printed.
pub fn top_band(bounds: &PageBounds) -> Roi {
    let height = 120.max(bounds.y(0.24));
    Roi::from_edges(0, 0, bounds.width, height, bounds)
}

/// Where a surname is re-read: below its caption when one was found,
/// otherwise the left part of the top band.
pub fn surname_region(label: Option<&LabelRect>, bounds: &PageBounds) -> Roi {
    match label {
        Some(label) => {
            let top = label.bottom + 5;
            let height = 120.max(bounds.y(0.25));
            let right = label.right + 160.max(bounds.x(0.20));
            Roi::from_edges(label.left - 20, top, right, top + height, bounds)
        }
        None => {
            let height = 140.max(bounds.y(0.22));
            Roi::from_edges(0, 0, bounds.x(0.36), height, bounds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_scenario() -> (Vec<Token>, LabelRect, PageBounds) {
        let tokens = vec![
            Token::new("DELACRUZ", 90, 10, 110, 35),
            Token::new("Last", 100, 50, 40, 14),
            Token::new("Name", 160, 52, 40, 14),
        ];
        let label = LabelRect::union(&tokens[1], &tokens[2]);
        let bounds = PageBounds::of(&tokens);
        (tokens, label, bounds)
    }

    #[test]
    fn above_band_covers_the_handwriting() {
        let (tokens, label, bounds) = label_scenario();
        let roi = extract_around_label(&label, &bounds);
        assert_eq!(
            roi,
            Roi {
                x: 80,
                y: 0,
                width: 120,
                height: 45
            }
        );
        let values = collect_value_tokens(&tokens, &roi);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].text, "DELACRUZ");
    }

    #[test]
    fn no_below_region_near_the_top() {
        let (_, label, bounds) = label_scenario();
        assert_eq!(region_below_label(&label, &bounds), None);

        let lower = LabelRect {
            top: 300,
            bottom: 314,
            ..label
        };
        let bounds = PageBounds {
            width: 1000,
            height: 1400,
        };
        let below = region_below_label(&lower, &bounds).unwrap();
        assert_eq!(below.y, 319);
        assert_eq!(below.height, 80);
        assert_eq!(below.x, 80);
        assert_eq!(below.right(), 200 + 150);
    }

    #[test]
    fn value_words() {
        assert!(is_value_word("DELA-CRUZ"));
        assert!(is_value_word("O'NEIL"));
        assert!(!is_value_word("Jr."));
        assert!(!is_value_word("Province"));
        assert!(!is_value_word("Name"));
        assert!(!is_value_word("|X"));
        assert!(!is_value_word("A1"));
    }

    #[test]
    fn band_bottom_from_captions() {
        let tokens = vec![
            Token::new("SANTOS", 20, 40, 100, 40),
            Token::new("Last", 20, 200, 40, 14),
            Token::new("Name", 70, 200, 40, 14),
            Token::new("x", 900, 1000, 10, 10),
        ];
        let bounds = PageBounds::of(&tokens);
        assert_eq!(compute_band_bottom(&tokens, &bounds), 200 - 60);
    }

    #[test]
    fn band_bottom_from_address_anchor() {
        let tokens = vec![
            Token::new("SANTOS", 20, 40, 100, 40),
            Token::new("Barangay", 20, 300, 80, 14),
            Token::new("x", 900, 1000, 10, 10),
        ];
        let bounds = PageBounds::of(&tokens);
        assert_eq!(compute_band_bottom(&tokens, &bounds), 300 - 40);
    }

    #[test]
    fn band_bottom_defaults_to_a_third() {
        let tokens = vec![Token::new("SANTOS", 20, 40, 100, 40), Token::new("x", 900, 990, 10, 10)];
        let bounds = PageBounds::of(&tokens);
        assert_eq!(compute_band_bottom(&tokens, &bounds), 330);
    }
}
