//! Word boxes and the page-relative geometry built on top of them.

/// A recognised word and its bounding box, in source image pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub height: i32,
}

impl Token {
    pub fn new(text: impl Into<String>, left: i32, top: i32, width: i32, height: i32) -> Token {
        Token {
            text: text.into(),
            left,
            top,
            right: left + width,
            bottom: top + height,
            height,
        }
    }

    pub fn center_x(&self) -> i32 {
        (self.left + self.right) / 2
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageBounds {
    pub width: i32,
    pub height: i32,
}

impl PageBounds {
    /// Furthest right and bottom edges over `tokens`.
    pub fn of(tokens: &[Token]) -> PageBounds {
        tokens.iter().fold(PageBounds::default(), |acc, t| PageBounds {
            width: acc.width.max(t.right),
            height: acc.height.max(t.bottom),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Fraction of the page width, truncated to whole pixels.
    pub fn x(&self, fraction: f32) -> i32 {
        (self.width as f32 * fraction) as i32
    }

    pub fn y(&self, fraction: f32) -> i32 {
        (self.height as f32 * fraction) as i32
    }
}

/// Bounding box of a located caption, e.g. "Last" and "Name" combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub height: i32,
}

impl LabelRect {
    pub fn of(token: &Token) -> LabelRect {
        LabelRect {
            left: token.left,
            top: token.top,
            right: token.right,
            bottom: token.bottom,
            height: token.height,
        }
    }

    pub fn union(a: &Token, b: &Token) -> LabelRect {
        LabelRect {
            left: a.left.min(b.left),
            top: a.top.min(b.top),
            right: a.right.max(b.right),
            bottom: a.bottom.max(b.bottom),
            height: a.height.max(b.height),
        }
    }
}

/// Region of interest, always clamped to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32, bounds: &PageBounds) -> Roi {
        let left = left.clamp(0, bounds.width.max(0));
        let right = right.clamp(left, bounds.width.max(left));
        let top = top.clamp(0, bounds.height.max(0));
        let bottom = bottom.clamp(top, bounds.height.max(top));
        Roi {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Box around `tokens` grown by `pad` pixels on every side.
    pub fn around(tokens: &[&Token], pad: i32, bounds: &PageBounds) -> Option<Roi> {
        let left = tokens.iter().map(|t| t.left).min()?;
        let top = tokens.iter().map(|t| t.top).min()?;
        let right = tokens.iter().map(|t| t.right).max()?;
        let bottom = tokens.iter().map(|t| t.bottom).max()?;
        Some(Roi::from_edges(
            left - pad,
            top - pad,
            right + pad,
            bottom + pad,
            bounds,
        ))
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Whether `token` lies entirely inside the region.
    pub fn contains(&self, token: &Token) -> bool {
        token.left >= self.x
            && token.right <= self.right()
            && token.top >= self.y
            && token.bottom <= self.bottom()
    }
}

/// Pixel threshold that grows with the height of the word it is applied to.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    pub min_px: i32,
    pub height_factor: f32,
}

impl Tolerance {
    pub fn for_height(&self, height: i32) -> i32 {
        self.min_px.max((self.height_factor * height as f32) as i32)
    }
}

/// Vertical drift allowed between words of the same handwritten line.
pub const LINE_TOLERANCE: Tolerance = Tolerance {
    min_px: 12,
    height_factor: 0.9,
};

/// Horizontal gap that separates adjacent form boxes on one line.
pub const COLUMN_GAP: Tolerance = Tolerance {
    min_px: 28,
    height_factor: 1.8,
};

#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub tokens: Vec<&'a Token>,
    pub avg_top: i32,
}

impl<'a> Line<'a> {
    pub fn width(&self) -> i32 {
        let left = self.tokens.iter().map(|t| t.left).min().unwrap_or(0);
        let right = self.tokens.iter().map(|t| t.right).max().unwrap_or(0);
        right - left
    }
}

/// Groups tokens whose tops stay within `tolerance` of the running average
/// top of a line.
pub fn cluster_into_lines<'a>(tokens: &[&'a Token], tolerance: Tolerance) -> Vec<Line<'a>> {
    let mut sorted = tokens.to_vec();
    sorted.sort_by_key(|t| (t.top, t.left));

    let mut lines: Vec<Line<'a>> = vec![];
    for token in sorted {
        let slack = tolerance.for_height(token.height);
        match lines
            .iter()
            .position(|l| (token.top - l.avg_top).abs() <= slack)
        {
            Some(i) => {
                let line = &mut lines[i];
                line.tokens.push(token);
                line.avg_top =
                    line.tokens.iter().map(|t| t.top).sum::<i32>() / line.tokens.len() as i32;
            }
            None => lines.push(Line {
                tokens: vec![token],
                avg_top: token.top,
            }),
        }
    }
    lines
}

/// Splits a line into segments wherever the gap between neighbours exceeds
/// `gap` for the right-hand word's height.
pub fn partition_by_x_gap<'a>(line: &[&'a Token], gap: Tolerance) -> Vec<Vec<&'a Token>> {
    let mut sorted = line.to_vec();
    sorted.sort_by_key(|t| t.left);

    let mut segments: Vec<Vec<&'a Token>> = vec![];
    let mut last_right = None;
    for token in sorted {
        let joins = matches!(last_right, Some(right) if token.left - right <= gap.for_height(token.height));
        if joins {
            if let Some(segment) = segments.last_mut() {
                segment.push(token);
            }
        } else {
            segments.push(vec![token]);
        }
        last_right = Some(last_right.map_or(token.right, |r: i32| r.max(token.right)));
    }
    segments
}

/// Texts of `tokens` in reading order, space separated.
pub fn joined_text(tokens: &[&Token]) -> String {
    let mut sorted = tokens.to_vec();
    sorted.sort_by_key(|t| t.left);
    sorted
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_the_furthest_edges() {
        let tokens = vec![Token::new("A", 10, 5, 20, 10), Token::new("B", 100, 40, 50, 12)];
        assert_eq!(
            PageBounds::of(&tokens),
            PageBounds {
                width: 150,
                height: 52
            }
        );
        assert!(PageBounds::of(&[]).is_empty());
    }

    #[test]
    fn roi_is_clamped_to_page() {
        let bounds = PageBounds {
            width: 200,
            height: 100,
        };
        let roi = Roi::from_edges(-20, -5, 260, 80, &bounds);
        assert_eq!(
            roi,
            Roi {
                x: 0,
                y: 0,
                width: 200,
                height: 80
            }
        );
        assert!(Roi::from_edges(150, 10, 120, 20, &bounds).is_empty());
    }

    #[test]
    fn lines_follow_running_average() {
        let a = Token::new("SANTOS", 10, 10, 60, 30);
        let b = Token::new("MARIA", 100, 18, 50, 30);
        let c = Token::new("Address", 10, 90, 60, 14);
        let lines = cluster_into_lines(&[&c, &b, &a], LINE_TOLERANCE);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].tokens.len(), 2);
        assert_eq!(lines[0].avg_top, 14);
        assert_eq!(lines[1].tokens[0].text, "Address");
    }

    #[test]
    fn segments_split_on_wide_gaps() {
        let a = Token::new("DELA", 10, 10, 40, 20);
        let b = Token::new("CRUZ", 60, 10, 40, 20);
        let c = Token::new("JUAN", 200, 10, 40, 20);
        let segments = partition_by_x_gap(&[&c, &a, &b], COLUMN_GAP);
        assert_eq!(segments.len(), 2);
        assert_eq!(joined_text(&segments[0]), "DELA CRUZ");
        assert_eq!(joined_text(&segments[1]), "JUAN");
    }
}
