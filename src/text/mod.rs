//! Letter-level helpers and the vocabularies that tell handwritten names
//! apart from printed labels and address text.

/// Printed words of the name captions.
pub const LABEL_WORDS: [&str; 6] = ["name", "first", "last", "middle", "surname", "given"];

/// Caption fragments found around the name block of the form.
pub const LABEL_HINTS: [&str; 10] = [
    "name",
    "first",
    "last",
    "middle",
    "surname",
    "given",
    "info",
    "information",
    "identifying",
    "extension",
];

/// Printed address captions that sit below the name block.
pub const ADDRESS_ANCHORS: [&str; 13] = [
    "region",
    "province",
    "city",
    "municipality",
    "barangay",
    "street",
    "house",
    "purok",
    "sitio",
    "village",
    "pob",
    "site",
    "str",
];

/// Administrative vocabulary that never belongs to a person's name.
pub const STOPWORDS: [&str; 20] = [
    "region",
    "province",
    "city",
    "municipality",
    "barangay",
    "brgy",
    "street",
    "purok",
    "sitio",
    "village",
    "house",
    "hno",
    "zone",
    "poblacion",
    "district",
    "address",
    "subdivision",
    "blk",
    "lot",
    "town",
];

/// Abbreviations and captions that mark a line of text as address data.
pub const ADDRESS_VOCABULARY: [&str; 30] = [
    "region",
    "reg",
    "province",
    "prov",
    "provice",
    "city",
    "cty",
    "municipality",
    "muni",
    "mun",
    "barangay",
    "brgy",
    "street",
    "st",
    "zone",
    "purok",
    "sitio",
    "village",
    "district",
    "town",
    "house",
    "hno",
    "address",
    "poblacion",
    "blk",
    "lot",
    "sub",
    "vlg",
    "ave",
    "blvd",
];

const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];

pub fn letters_lower(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn letters_upper(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn alpha_len(s: &str) -> usize {
    s.chars().filter(char::is_ascii_alphabetic).count()
}

pub fn vowel_count(s: &str) -> usize {
    s.chars()
        .filter(|c| VOWELS.contains(&c.to_ascii_lowercase()))
        .count()
}

/// Share of vowels among the letters of `s`, 0 when it has none.
pub fn vowel_ratio(s: &str) -> f32 {
    match alpha_len(s) {
        0 => 0.,
        n => vowel_count(s) as f32 / n as f32,
    }
}

/// True when `s` has letters and none of them is lowercase.
pub fn is_uppercase_word(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_alphabetic()) && !s.chars().any(|c| c.is_ascii_lowercase())
}

/// True when `s` has a run of at least `n` consecutive letters.
pub fn has_letter_run(s: &str, n: usize) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= n {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Replaces everything but letters, apostrophes, hyphens and dots by spaces
/// and collapses whitespace.
pub fn clean_name(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphabetic() || c == '\'' || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Letters-only version of `s`, words separated by single spaces.
pub fn clean_letters(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Edit distance of at most 2 for words of 4+ letters, 1 below.
pub fn within_edit_tolerance(a: &str, b: &str) -> bool {
    let longest = a.chars().count().max(b.chars().count());
    levenshtein(a, b) <= if longest >= 4 { 2 } else { 1 }
}

/// Loose word equality used to recognise printed captions through OCR noise.
pub fn approx_equals(a: &str, b: &str) -> bool {
    let a = letters_lower(a);
    let b = letters_lower(b);
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.len() >= 3 && long.contains(short.as_str()) {
        return true;
    }
    within_edit_tolerance(&a, &b)
}

/// Whether a single word belongs to `vocabulary`. Entries of five letters
/// or more also match inside longer words ("brgypoblacion").
pub fn matches_vocabulary(word: &str, vocabulary: &[&str]) -> bool {
    let word = letters_lower(word);
    if word.is_empty() {
        return false;
    }
    vocabulary
        .iter()
        .any(|v| word == *v || (v.len() >= 5 && word.contains(v)))
}

pub fn mentions_vocabulary(text: &str, vocabulary: &[&str]) -> bool {
    text.split_whitespace()
        .any(|w| matches_vocabulary(w, vocabulary))
}

pub fn mentions_stopword(text: &str) -> bool {
    mentions_vocabulary(text, &STOPWORDS)
}

/// Whether any word of `text` is, give or take OCR noise, a caption word.
pub fn mentions_label_word(text: &str) -> bool {
    text.split_whitespace().any(|w| {
        let w = letters_lower(w);
        !w.is_empty() && LABEL_WORDS.iter().any(|l| within_edit_tolerance(&w, l))
    })
}

/// Caption-like text: a word close to a caption hint, or one that embeds it
/// ("LastName").
pub fn looks_like_label(text: &str) -> bool {
    text.split_whitespace().any(|w| {
        let w = letters_lower(w);
        !w.is_empty()
            && LABEL_HINTS
                .iter()
                .any(|h| within_edit_tolerance(&w, h) || (h.len() >= 4 && w.contains(h)))
    })
}

pub fn looks_like_address(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text.contains(" - ")
        || text.split_whitespace().count() >= 6
        || mentions_vocabulary(text, &ADDRESS_VOCABULARY)
}

/// Too little material to be a name: fewer than 3 letters, a lone short
/// word, or mostly one- and two-letter fragments.
pub fn is_weak_name(text: &str) -> bool {
    let alpha = alpha_len(text);
    let words: Vec<&str> = text.split_whitespace().collect();
    if alpha < 3 || (words.len() <= 1 && alpha <= 3) {
        return true;
    }
    let short = words.iter().filter(|w| alpha_len(w) <= 2).count();
    short >= 2.max((words.len() + 1) / 2)
}
