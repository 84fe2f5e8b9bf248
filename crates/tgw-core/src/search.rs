//! Tiered fuzzy matching for the global search overlay.
//!
//! Spans are char indices into the original text. Case folding maps every char to
//! exactly one char so spans line up with the original.

pub const MAX_RESULTS: usize = 50;

const EXACT_SCORE: f64 = 1000.0;
const PREFIX_SCORE: f64 = 800.0;
const SUBSTRING_SCORE: f64 = 500.0;
const WORD_PREFIX_SCORE: f64 = 400.0;
const FUZZY_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
}

impl MatchSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub score: f64,
    pub matches: Vec<MatchSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<T> {
    pub item: T,
    pub score: f64,
    pub matches: Vec<MatchSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
}

fn fold(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole.max(1) as f64
}

fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '.' | '/')
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Score `text` against `query`. `None` when either is empty or the query's chars
/// do not all appear in order.
pub fn fuzzy_match(text: &str, query: &str) -> Option<FuzzyMatch> {
    if text.is_empty() || query.is_empty() {
        return None;
    }
    let text = fold(text);
    let query = fold(query);
    let coverage = ratio(query.len(), text.len());

    if text == query {
        return Some(FuzzyMatch {
            score: EXACT_SCORE,
            matches: vec![MatchSpan {
                start: 0,
                end: text.len(),
            }],
        });
    }
    if text.starts_with(&query) {
        return Some(FuzzyMatch {
            score: PREFIX_SCORE + coverage * 100.0,
            matches: vec![MatchSpan {
                start: 0,
                end: query.len(),
            }],
        });
    }
    if let Some(start) = find(&text, &query) {
        return Some(FuzzyMatch {
            score: SUBSTRING_SCORE + coverage * 100.0,
            matches: vec![MatchSpan {
                start,
                end: start + query.len(),
            }],
        });
    }
    word_prefix_match(&text, &query).or_else(|| in_order_match(&text, &query))
}

/// A word that starts with the query. Any such word is also a substring hit, so
/// `fuzzy_match` resolves it in the substring tier first.
fn word_prefix_match(text: &[char], query: &[char]) -> Option<FuzzyMatch> {
    let mut start = 0;
    for word in text.split(|c| is_word_separator(*c)) {
        if !word.is_empty() && word.starts_with(query) {
            return Some(FuzzyMatch {
                score: WORD_PREFIX_SCORE + ratio(query.len(), word.len()) * 50.0,
                matches: vec![MatchSpan {
                    start,
                    end: start + query.len(),
                }],
            });
        }
        start += word.len() + 1;
    }
    None
}

/// Greedy left-to-right match; contiguous hits are merged into runs.
fn in_order_match(text: &[char], query: &[char]) -> Option<FuzzyMatch> {
    let mut matches = Vec::new();
    let mut q = 0;
    let mut run_start = None;
    let mut t = 0;
    while t < text.len() && q < query.len() {
        if text[t] == query[q] {
            run_start.get_or_insert(t);
            q += 1;
        } else if let Some(start) = run_start.take() {
            matches.push(MatchSpan { start, end: t });
        }
        t += 1;
    }
    if let Some(start) = run_start {
        matches.push(MatchSpan { start, end: t });
    }
    if q < query.len() {
        return None;
    }

    let matched: usize = matches.iter().map(MatchSpan::len).sum();
    let span = match (matches.first(), matches.last()) {
        (Some(first), Some(last)) => last.end - first.start,
        _ => 0,
    };
    let compactness = ratio(matched, span);
    let coverage = ratio(query.len(), text.len());
    Some(FuzzyMatch {
        score: FUZZY_SCORE + compactness * 100.0 + coverage * 50.0,
        matches,
    })
}

/// Matches ranked by score, ties in input order, at most `max_results`.
pub fn fuzzy_search<'a, T, F>(
    items: &'a [T],
    query: &str,
    text_of: F,
    max_results: usize,
) -> Vec<SearchResult<&'a T>>
where
    F: Fn(&T) -> &str,
{
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let mut results: Vec<_> = items
        .iter()
        .filter_map(|item| {
            fuzzy_match(text_of(item), query).map(|m| SearchResult {
                item,
                score: m.score,
                matches: m.matches,
            })
        })
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(max_results);
    results
}

/// Split `text` into plain and highlighted segments. Concatenating the segments
/// reproduces `text`.
pub fn highlight_matches(text: &str, matches: &[MatchSpan]) -> Vec<Segment> {
    if text.is_empty() || matches.is_empty() {
        return vec![Segment {
            text: text.to_string(),
            highlighted: false,
        }];
    }
    let chars: Vec<char> = text.chars().collect();
    let slice = |start: usize, end: usize| -> String { chars[start..end].iter().collect() };
    let mut segments = Vec::new();
    let mut last = 0;
    for span in matches {
        let start = span.start.clamp(last, chars.len());
        let end = span.end.clamp(start, chars.len());
        if start > last {
            segments.push(Segment {
                text: slice(last, start),
                highlighted: false,
            });
        }
        if end > start {
            segments.push(Segment {
                text: slice(start, end),
                highlighted: true,
            });
        }
        last = end;
    }
    if last < chars.len() {
        segments.push(Segment {
            text: slice(last, chars.len()),
            highlighted: false,
        });
    }
    segments
}
