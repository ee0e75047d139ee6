//! Name guessing from plain OCR text, without coordinates.

use log::debug;
use regex::Regex;

use crate::{
    candidate::Field,
    gate::best_upper,
    text::{
        alpha_len, clean_name, is_uppercase_word, letters_upper, mentions_label_word,
        mentions_stopword, mentions_vocabulary, ADDRESS_VOCABULARY,
    },
};

/// Printed form text that shows up in plain OCR output next to names.
const FORM_BOILERPLATE: [&str; 26] = [
    "thru",
    "date",
    "birth",
    "religion",
    "ethnic",
    "place",
    "id",
    "osca",
    "contact",
    "number",
    "philhealth",
    "tin",
    "identifying",
    "information",
    "extension",
    "ext",
    "supported",
    "file",
    "types",
    "jpg",
    "jpeg",
    "png",
    "pdf",
    "ft",
    "pt",
    "not",
];

fn long_words(words: &[&str]) -> usize {
    words.iter().filter(|w| w.len() >= 4).count()
}

fn has_upper_signal(word: &str) -> bool {
    is_uppercase_word(word) && alpha_len(word) >= 4
}

/// Splits the best candidate line of `text` into last, first and middle at
/// the 1/3 and 2/3 word positions.
///
/// Lines mentioning "name" or address vocabulary are skipped; the rest are
/// scored by length, long words and an uppercase word of four letters or
/// more. The winning line needs three words, two of them long, one of five
/// letters or more.
pub fn line_segments(text: &str) -> Option<[String; 3]> {
    let mut best: Option<(usize, String)> = None;
    for line in text.lines() {
        if line.to_lowercase().contains("name") || mentions_stopword(line) {
            continue;
        }
        let clean = clean_name(line);
        let words: Vec<&str> = clean.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let upper = if words.iter().any(|w| has_upper_signal(w)) { 10 } else { 0 };
        let score = clean.len() + 5 * long_words(&words) + upper;
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, clean));
        }
    }

    let (_, line) = best?;
    let words: Vec<&str> = line.split_whitespace().collect();
    let n = words.len();
    let max_len = words.iter().map(|w| w.len()).max().unwrap_or(0);
    if n < 3 || max_len < 5 || long_words(&words) < 2 {
        debug!("best plain-text line {:?} is too thin to split", line);
        return None;
    }
    let cut1 = (n / 3).max(1);
    let cut2 = (2 * n / 3).max(cut1 + 1);
    let segments = [
        words[..cut1].join(" "),
        words[cut1..cut2].join(" "),
        words[cut2..].join(" "),
    ];
    debug!("plain-text line {:?} split as {:?}", line, segments);
    Some(segments)
}

fn looks_like_form_text(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit())
        || mentions_vocabulary(line, &ADDRESS_VOCABULARY)
        || mentions_vocabulary(line, &FORM_BOILERPLATE)
        || mentions_stopword(line)
}

fn is_name_word(word: &str) -> bool {
    alpha_len(word) >= 3
        && !(is_uppercase_word(word) && word.len() <= 3)
        && !FORM_BOILERPLATE.contains(&word.to_lowercase().as_str())
}

/// Whole-page guess used when nothing else produced a name: the best line
/// carrying an uppercase word, mapped word by word onto last, first and
/// middle, any words past the third joining the middle name.
pub fn global_line_names(text: &str) -> Option<Vec<String>> {
    let mut best: Option<(usize, String)> = None;
    for line in text.lines() {
        if line.trim().is_empty()
            || looks_like_form_text(line)
            || line.to_lowercase().contains("name")
        {
            continue;
        }
        let clean = clean_name(line);
        let words: Vec<&str> = clean.split_whitespace().filter(|w| is_name_word(w)).collect();
        let strong = words.iter().any(|w| w.len() >= 5);
        if long_words(&words) == 0 || !strong || !words.iter().any(|w| has_upper_signal(w)) {
            continue;
        }
        let score = clean.len() + 5 * long_words(&words) + 10;
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, clean));
        }
    }

    let (_, line) = best?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut segments: Vec<String> = parts.iter().take(2).map(|p| p.to_string()).collect();
    if parts.len() > 2 {
        segments.push(parts[2..].join(" "));
    }

    let head: Vec<&str> = segments.iter().take(2).map(String::as_str).collect();
    let long_enough = head.iter().any(|s| s.len() >= 4);
    let upper_signal = head.iter().any(|s| has_upper_signal(s));
    if !long_enough || !upper_signal {
        debug!("global line {:?} lacks a surname-like word", line);
        return None;
    }
    debug!("global line {:?} mapped to {:?}", line, segments);
    Some(segments)
}

/// Word-level guess for pages where no single line qualifies: the best
/// uppercase word of five letters or more becomes the surname, and the words
/// after it on its line the first and middle names. Lines with address
/// vocabulary are ignored, as are caption and boilerplate words.
pub fn global_word_names(text: &str) -> Option<Vec<String>> {
    let lines: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !mentions_vocabulary(line, &ADDRESS_VOCABULARY) && !mentions_stopword(line))
        .map(|line| {
            clean_name(line)
                .split_whitespace()
                .filter(|w| is_name_word(w) && !mentions_label_word(w))
                .map(str::to_owned)
                .collect()
        })
        .collect();

    let pool: Vec<&str> = lines
        .iter()
        .flatten()
        .filter(|w| alpha_len(w) >= 5 && is_uppercase_word(w))
        .map(String::as_str)
        .collect();
    let surname = best_upper(&pool.join(" "))?;
    let (line, at) = lines.iter().find_map(|line| {
        line.iter()
            .position(|w| letters_upper(w).contains(&surname))
            .map(|at| (line, at))
    })?;

    let rest = &line[at + 1..];
    let mut segments = vec![surname];
    segments.extend(rest.first().cloned());
    if rest.len() > 1 {
        segments.push(rest[1..].join(" "));
    }
    debug!("global word guess {:?} from {:?}", segments, line);
    Some(segments)
}

/// Values written next to printed captions in plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelValues {
    pub last: Option<String>,
    pub first: Option<String>,
    pub middle: Option<String>,
}

impl LabelValues {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Last => self.last.as_deref(),
            Field::First => self.first.as_deref(),
            Field::Middle => self.middle.as_deref(),
        }
    }

    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Last => self.last = Some(value),
            Field::First => self.first = Some(value),
            Field::Middle => self.middle = Some(value),
        }
    }
}

/// Caption matchers tolerant of a truncated "nam" and of word order.
#[derive(Debug, Clone)]
pub struct LabelPatterns {
    last: Regex,
    first: Regex,
    middle: Regex,
}

impl LabelPatterns {
    pub fn new() -> Result<LabelPatterns, regex::Error> {
        Ok(LabelPatterns {
            last: Regex::new(r"(?i)\blast\s*nam|\bsurname\b|\blast\b.*\bname\b|\bname\b.*\blast\b")?,
            first: Regex::new(
                r"(?i)\bfirst\s*nam|\bgiven\s*nam|\bfirst\b.*\bname\b|\bname\b.*\bfirst\b",
            )?,
            middle: Regex::new(r"(?i)\bmid(?:dle)?\s*nam|\bmiddle\b.*\bname\b|\bname\b.*\bmiddle\b")?,
        })
    }

    fn pattern(&self, field: Field) -> &Regex {
        match field {
            Field::Last => &self.last,
            Field::First => &self.first,
            Field::Middle => &self.middle,
        }
    }

    /// A caption line gives the text after its `:` or `=`, or else the next
    /// non-empty line. Lines naming several captions are table headers and
    /// are skipped; values need three letters.
    pub fn label_values(&self, text: &str) -> LabelValues {
        let lines: Vec<&str> = text.lines().collect();
        let mut values = LabelValues::default();
        for (i, line) in lines.iter().enumerate() {
            let matched: Vec<Field> = Field::ALL
                .into_iter()
                .filter(|f| self.pattern(*f).is_match(line))
                .collect();
            let field = match matched.as_slice() {
                [field] => *field,
                [] => continue,
                _ => {
                    debug!("skipping caption row {:?}", line.trim());
                    continue;
                }
            };
            let value = value_after(&lines, i);
            if alpha_len(value) >= 3 {
                values.set(field, value.to_owned());
            }
        }
        values
    }
}

fn value_after<'a>(lines: &[&'a str], i: usize) -> &'a str {
    let line = lines.get(i).copied().unwrap_or("");
    if let Some(pos) = line.find(|c: char| c == ':' || c == '=') {
        let inline = line[pos + 1..].trim();
        if !inline.is_empty() {
            return inline;
        }
    }
    lines
        .iter()
        .skip(i + 1)
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Layout,
    RawText,
}

/// Whether a caption value from plain text should replace the layout value.
pub fn prefer_name(layout: &str, raw: &str) -> Choice {
    let raw_alpha = alpha_len(raw);
    let layout_alpha = alpha_len(layout);
    let raw_words = raw.split_whitespace().count();
    let layout_single = layout.split_whitespace().count() <= 1;

    if raw_alpha < 3 {
        Choice::Layout
    } else if raw_words >= 2 && layout_single {
        Choice::RawText
    } else if raw_alpha > layout_alpha {
        Choice::RawText
    } else if layout_single && layout.trim().len() >= 8 {
        // a long single run is usually words fused by OCR
        Choice::RawText
    } else {
        Choice::Layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_line_is_split_in_thirds() {
        let text = "Republic of the Philippines\nGONZALES Andres Bonifacio\nBrgy. San Roque\n";
        assert_eq!(
            line_segments(text),
            Some(["GONZALES".to_owned(), "Andres".to_owned(), "Bonifacio".to_owned()])
        );

        let six = "SANTOS DELA CRUZ Maria Clara Reyes";
        assert_eq!(
            line_segments(six),
            Some([
                "SANTOS DELA".to_owned(),
                "CRUZ Maria".to_owned(),
                "Clara Reyes".to_owned()
            ])
        );
    }

    #[test]
    fn thin_or_address_lines_are_not_split() {
        assert_eq!(line_segments("BARANGAY POBLACION LINGAYEN"), None);
        assert_eq!(line_segments("Last Name First Name"), None);
        assert_eq!(line_segments("Ana Lim"), None);
        assert_eq!(line_segments("Ana de la"), None);
        assert_eq!(line_segments(""), None);
    }

    #[test]
    fn global_line_needs_an_uppercase_word() {
        let text = "Date of Birth 01/02/1950\nReyes Maria\nGONZALES Andres Bonifacio Cruz\n";
        assert_eq!(
            global_line_names(text),
            Some(vec![
                "GONZALES".to_owned(),
                "Andres".to_owned(),
                "Bonifacio Cruz".to_owned()
            ])
        );
        assert_eq!(global_line_names("Reyes Maria Clara"), None);
        assert_eq!(global_line_names("SAN ROQUE Purok 3"), None);
        assert_eq!(global_line_names("MENDOZA"), Some(vec!["MENDOZA".to_owned()]));
    }

    #[test]
    fn global_word_guess_takes_the_best_uppercase_word() {
        assert_eq!(global_word_names("ana del ROMERO\n"), Some(vec!["ROMERO".to_owned()]));
        assert_eq!(
            global_word_names("Name: BAUTISTA Carlo Reyes Lim\nDate 2020\n"),
            Some(vec![
                "BAUTISTA".to_owned(),
                "Carlo".to_owned(),
                "Reyes Lim".to_owned()
            ])
        );
        assert_eq!(global_word_names("BARANGAY POBLACION LINGAYEN"), None);
        assert_eq!(global_word_names("SANTOS cruz"), None);
        assert_eq!(global_word_names("ana del romero"), None);
        assert_eq!(global_word_names(""), None);
    }

    #[test]
    fn caption_values_inline_and_on_the_next_line() {
        let patterns = LabelPatterns::new().unwrap();
        let text = "Last Name: DELA CRUZ\nFirst Name\n\nJuan Miguel\nMiddle nam = Ro\n";
        let values = patterns.label_values(text);
        assert_eq!(values.get(Field::Last), Some("DELA CRUZ"));
        assert_eq!(values.get(Field::First), Some("Juan Miguel"));
        assert_eq!(values.get(Field::Middle), None);
    }

    #[test]
    fn caption_header_rows_are_skipped() {
        let patterns = LabelPatterns::new().unwrap();
        let text = "Last Name First Name Middle Name\nSANTOS MARIA REYES\nSurname\nGARCIA\n";
        let values = patterns.label_values(text);
        assert_eq!(values.get(Field::Last), Some("GARCIA"));
        assert_eq!(values.get(Field::First), None);
    }

    #[test]
    fn raw_text_preference() {
        assert_eq!(prefer_name("DELACRUZ", "DC"), Choice::Layout);
        assert_eq!(prefer_name("DELACRUZ", "DELA CRUZ"), Choice::RawText);
        assert_eq!(prefer_name("Maria Clara", "Maria Clarita"), Choice::RawText);
        assert_eq!(prefer_name("Ana Luz", "Ana"), Choice::Layout);
        assert_eq!(prefer_name("XQZWRTPLK", "Jose"), Choice::RawText);
        assert_eq!(prefer_name("", "Jose"), Choice::RawText);
        assert_eq!(prefer_name("Jose", "Jose"), Choice::Layout);
    }
}
