//! Response cleaning: turn raw model text into the best JSON candidate.
//!
//! Generative models routinely wrap JSON in markdown fences despite being
//! told not to, chat a sentence before the payload, or run out of tokens
//! halfway through a string. [`clean`] undoes the first two and, when the
//! remainder does not parse, tries an ordered list of [`RepairStrategy`]
//! functions. The first repair whose output parses wins; if none does, the
//! unrepaired text is returned and the caller decides what to do with it.
//!
//! ## Steps
//!
//! 1. Trim, drop a leading BOM, strip an outer code fence (a missing closing
//!    fence is tolerated, since truncated replies lose it)
//! 2. If the text parses, stop
//! 3. Drop prose before the first `{` / `[` and after its last closer
//! 4. If it still does not parse, run the repair strategies in order
//!
//! Everything here is a pure `&str → String` function. Nothing panics,
//! whatever the input.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A named repair heuristic. Returns `None` when it does not apply.
#[derive(Clone, Copy)]
pub struct RepairStrategy {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<String>,
}

impl std::fmt::Debug for RepairStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RepairStrategy").field(&self.name).finish()
    }
}

/// The built-in repairs, most conservative first.
pub const DEFAULT_REPAIRS: &[RepairStrategy] = &[
    RepairStrategy {
        name: "close-string-and-object",
        apply: close_string_and_object,
    },
    RepairStrategy {
        name: "close-object",
        apply: close_object,
    },
    RepairStrategy {
        name: "balance-brackets",
        apply: balance_brackets,
    },
    RepairStrategy {
        name: "drop-partial-member",
        apply: drop_partial_member,
    },
];

/// Outcome of [`Cleaner::clean_with_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    /// Cleaned (and possibly repaired) text.
    pub text: String,
    /// An outer code fence was removed.
    pub unfenced: bool,
    /// The text looked truncated before any repair.
    pub truncated: bool,
    /// Name of the repair that made the text parse, if one was needed.
    pub repair: Option<&'static str>,
}

/// A cleaner with a configurable repair list.
#[derive(Debug, Clone)]
pub struct Cleaner {
    repairs: Vec<RepairStrategy>,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            repairs: DEFAULT_REPAIRS.to_vec(),
        }
    }
}

impl Cleaner {
    /// A cleaner with no repairs at all.
    pub fn without_repairs() -> Self {
        Self { repairs: vec![] }
    }

    /// Append a repair, tried after the existing ones.
    pub fn with_repair(mut self, repair: RepairStrategy) -> Self {
        self.repairs.push(repair);
        self
    }

    /// Names of the configured repairs, in order.
    pub fn repair_names(&self) -> Vec<&'static str> {
        self.repairs.iter().map(|r| r.name).collect()
    }

    pub fn clean(&self, raw: &str) -> String {
        self.clean_with_report(raw).text
    }

    pub fn clean_with_report(&self, raw: &str) -> Cleaned {
        let (unfenced_text, unfenced) = strip_fences(raw);
        let truncated = looks_truncated(unfenced_text);

        if parses(unfenced_text) {
            return Cleaned {
                text: unfenced_text.to_string(),
                unfenced,
                truncated,
                repair: None,
            };
        }

        let text = extract_json_span(unfenced_text);
        if parses(text) || !starts_structured(text) {
            return Cleaned {
                text: text.to_string(),
                unfenced,
                truncated,
                repair: None,
            };
        }

        for repair in &self.repairs {
            if let Some(candidate) = (repair.apply)(text) {
                if parses(&candidate) {
                    debug!("Repaired model output with '{}'", repair.name);
                    return Cleaned {
                        text: candidate,
                        unfenced,
                        truncated,
                        repair: Some(repair.name),
                    };
                }
            }
        }

        debug!("No repair made the model output parse");
        Cleaned {
            text: text.to_string(),
            unfenced,
            truncated,
            repair: None,
        }
    }
}

/// Clean `raw` with the default repair list.
pub fn clean(raw: &str) -> String {
    Cleaner::default().clean(raw)
}

/// Clean `raw` with the default repair list and report what was done.
pub fn clean_with_report(raw: &str) -> Cleaned {
    Cleaner::default().clean_with_report(raw)
}

/// `true` when non-empty text does not end with a closing `}` or `]`.
pub fn looks_truncated(text: &str) -> bool {
    let t = text.trim_end();
    !t.is_empty() && !t.ends_with('}') && !t.ends_with(']')
}

// ── Fences ──────────────────────────────────────────────────────────────────

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[\w+-]*[ \t]*\n?(.*?)\n?[ \t]*```$").unwrap());

static RE_OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[\w+-]*[ \t]*\n?").unwrap());

fn strip_fences(raw: &str) -> (&str, bool) {
    let s = raw.trim().trim_start_matches('\u{feff}').trim();
    if let Some(inner) = RE_FENCED.captures(s).and_then(|c| c.get(1)) {
        return (inner.as_str().trim(), true);
    }
    if let Some(open) = RE_OPEN_FENCE.find(s) {
        return (s[open.end()..].trim(), true);
    }
    (s, false)
}

// ── Span extraction ─────────────────────────────────────────────────────────

/// Pick the span most likely to be the payload.
///
/// Openers are tried in text order, so a bracket in leading prose
/// (`see [1]:`) does not hide the object after it. A span is taken when it
/// parses with nothing structured after it, or when it is still open at the
/// end of the text. Otherwise the first span that parsed wins, then the span
/// from the first opener.
fn extract_json_span(text: &str) -> &str {
    const MAX_OPENERS: usize = 32;
    let mut first_start = None;
    let mut first_parsed = None;

    for (start, _) in text.match_indices(['{', '[']).take(MAX_OPENERS) {
        first_start.get_or_insert(start);
        let span = &text[start..];
        let closer = if span.starts_with('{') { '}' } else { ']' };
        if let Some(end) = span.rfind(closer) {
            let candidate = &span[..=end];
            if parses(candidate) {
                if !span[end + 1..].contains(['{', '[']) {
                    return candidate;
                }
                first_parsed.get_or_insert(candidate);
                continue;
            }
        }
        if runs_to_end(span) {
            return span;
        }
    }

    match (first_parsed, first_start) {
        (Some(candidate), _) => candidate,
        (None, Some(start)) => &text[start..],
        (None, None) => text,
    }
}

/// `true` when the structure opened at the start of `span` is never closed,
/// or closes with only whitespace after it.
fn runs_to_end(span: &str) -> bool {
    match scan(span).map(|s| s.closed_at) {
        Some(None) => true,
        Some(Some(end)) => span[end + 1..].trim().is_empty(),
        None => false,
    }
}

fn parses(text: &str) -> bool {
    !text.is_empty() && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn starts_structured(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

// ── Repairs ─────────────────────────────────────────────────────────────────

/// `{"summary": "Good work` → `{"summary": "Good work"}`
fn close_string_and_object(text: &str) -> Option<String> {
    Some(format!("{text}\"}}"))
}

/// `{"score": 85` → `{"score": 85}`
fn close_object(text: &str) -> Option<String> {
    Some(format!("{text}}}"))
}

/// Close an open string, drop a dangling `,`, fill a dangling `:` with
/// `null`, then close every open bracket in reverse order.
fn balance_brackets(text: &str) -> Option<String> {
    let scan = scan(text)?;
    if scan.open.is_empty() && !scan.in_string {
        return None;
    }

    let mut out = text.to_string();
    if scan.in_string {
        if scan.escaped {
            out.pop();
        }
        out.push('"');
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str(" null");
    }
    out.extend(scan.open.iter().rev());
    Some(out)
}

/// Cut back to the last complete member or element, then balance.
///
/// `{"score": 7, "summary": "Go` → `{"score": 7}`
fn drop_partial_member(text: &str) -> Option<String> {
    const MAX_CUTS: usize = 32;
    let scan = scan(text)?;
    // A cut right after the outer opener would leave an empty container.
    scan.cut_points
        .iter()
        .rev()
        .filter(|&&cut| cut > 1)
        .take(MAX_CUTS)
        .filter_map(|&cut| balance_brackets(&text[..cut]))
        .find(|candidate| parses(candidate))
}

struct Scan {
    /// Closers still owed, innermost last.
    open: Vec<char>,
    in_string: bool,
    escaped: bool,
    /// Byte offsets where the text can be cut to end on a complete value:
    /// before each structural `,` and after each opener.
    cut_points: Vec<usize>,
    /// Byte offset of the closer that first empties the bracket stack.
    closed_at: Option<usize>,
}

/// Walk the text tracking string state and bracket depth.
///
/// Returns `None` for mismatched closers, which no amount of appending fixes.
fn scan(text: &str) -> Option<Scan> {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut cut_points = Vec::new();
    let mut closed_at = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                open.push('}');
                cut_points.push(i + 1);
            }
            '[' => {
                open.push(']');
                cut_points.push(i + 1);
            }
            '}' | ']' => {
                if open.pop() != Some(c) {
                    return None;
                }
                if open.is_empty() {
                    closed_at.get_or_insert(i);
                }
            }
            ',' => cut_points.push(i),
            _ => {}
        }
    }

    Some(Scan {
        open,
        in_string,
        escaped,
        cut_points,
        closed_at,
    })
}
