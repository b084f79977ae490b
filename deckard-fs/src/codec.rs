//! The on-disk card format: YAML front matter followed by a question and
//! an answer section.
//!
//! ```text
//! ---
//! tags: [go, test]
//! created: 2025-03-22
//! review_interval: 3
//! difficulty: 2.0
//! ---
//!
//! # Question
//!
//! What is X?
//!
//! ## Answer
//!
//! It is Y.
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use deckard_core::{title_from_path, Card, CoreError, EASE_DEFAULT, EASE_MAX, EASE_MIN, MAX_INTERVAL};
use log::{debug, warn};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

pub const DELIMITER: &str = "---";
pub const CARD_EXTENSION: &str = "md";
const FALLBACK_NAME: &str = "card";
const FORBIDDEN: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Default)]
struct FrontMatterIn {
    title: Option<String>,
    tags: Vec<String>,
    created: Option<String>,
    last_reviewed: Option<String>,
    review_interval: Option<u32>,
    difficulty: Option<f64>,
    extra: BTreeMap<String, serde_json::Value>,
}

impl FrontMatterIn {
    /// Reads the front matter as a plain YAML mapping so hand-edited
    /// values such as `tags: [rust, 2024]` or `title: 42` still load.
    fn from_yaml(path: &Path, yaml: &str) -> Result<Self, CoreError> {
        let mut map = match serde_yaml::from_str(yaml).map_err(|e| CoreError::parse(path, e.to_string()))? {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => return Err(CoreError::parse(path, "front matter is not a mapping")),
        };

        let mut fm = FrontMatterIn {
            title: map.remove("title").as_ref().and_then(scalar_text),
            tags: map.remove("tags").map(tag_list).unwrap_or_default(),
            created: map.remove("created").as_ref().and_then(scalar_text),
            last_reviewed: map.remove("last_reviewed").as_ref().and_then(scalar_text),
            ..Default::default()
        };
        if let Some(v) = map.remove("review_interval").filter(|v| !v.is_null()) {
            let n = number(&v).ok_or_else(|| CoreError::parse(path, "`review_interval` is not a number"))?;
            fm.review_interval = Some(n.clamp(0.0, MAX_INTERVAL as f64) as u32);
        }
        if let Some(v) = map.remove("difficulty").filter(|v| !v.is_null()) {
            let d = number(&v).ok_or_else(|| CoreError::parse(path, "`difficulty` is not a number"))?;
            fm.difficulty = Some(d);
        }

        for (k, v) in map {
            let key = scalar_text(&k).ok_or_else(|| CoreError::parse(path, "front matter keys must be scalars"))?;
            let value = serde_json::to_value(&v).map_err(|e| CoreError::parse(path, format!("`{key}`: {e}")))?;
            fm.extra.insert(key, value);
        }
        Ok(fm)
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags may be a YAML list or a comma-separated string.
fn tag_list(v: Value) -> Vec<String> {
    match v {
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => s.split(',').map(|t| t.to_string()).collect(),
        other => scalar_text(&other).into_iter().collect(),
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Serialize)]
struct FrontMatterOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_reviewed: Option<String>,
    review_interval: u32,
    difficulty: f64,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Question,
    Answer,
}

fn section_heading(line: &str) -> Option<Section> {
    match line.trim_end() {
        "# Question" | "## Question" => Some(Section::Question),
        "# Answer" | "## Answer" => Some(Section::Answer),
        _ => None,
    }
}

/// Whether `path` names a card file (`*.md`, any case).
pub fn is_card_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CARD_EXTENSION))
        .unwrap_or(false)
}

/// Reads and parses the card stored at `path`.
pub fn parse(path: &Path) -> Result<Card, CoreError> {
    let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| CoreError::parse(path, "file is not valid UTF-8"))?;
    let mut card = parse_str(path, &text)?;
    card.modified = modified_time(path);
    debug!("parsed card {}", path.display());
    Ok(card)
}

/// Parses card text as if it had been read from `path`.
pub fn parse_str(path: &Path, text: &str) -> Result<Card, CoreError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines();

    loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) if l.trim_end() == DELIMITER => break,
            _ => return Err(CoreError::parse(path, "front matter must open with ---")),
        }
    }

    let mut yaml = Vec::new();
    let mut closed = false;
    for l in lines.by_ref() {
        if l.trim_end() == DELIMITER {
            closed = true;
            break;
        }
        if section_heading(l).is_some() {
            return Err(CoreError::parse(path, "heading found before the closing ---"));
        }
        yaml.push(l);
    }
    if !closed {
        return Err(CoreError::parse(path, "front matter is not closed with ---"));
    }

    let fm: FrontMatterIn = if yaml.iter().all(|l| l.trim().is_empty()) {
        FrontMatterIn::default()
    } else {
        FrontMatterIn::from_yaml(path, &yaml.join("\n"))?
    };

    let mut question = Vec::new();
    let mut answer = Vec::new();
    let mut active = None;
    for l in lines {
        if let Some(s) = section_heading(l) {
            active = Some(s);
            continue;
        }
        match active {
            Some(Section::Question) => question.push(l),
            Some(Section::Answer) => answer.push(l),
            None => {}
        }
    }

    let mut card = Card::new(path, tidy(&question), tidy(&answer));
    if let Some(t) = fm.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        card.title = t.to_string();
    }
    card.merge_tags(fm.tags);
    card.created_at = parse_field(path, "created", fm.created)?;
    card.last_reviewed = parse_field(path, "last_reviewed", fm.last_reviewed)?;
    card.interval_days = fm.review_interval.unwrap_or(0).min(MAX_INTERVAL);
    card.ease = fm
        .difficulty
        .filter(|d| d.is_finite())
        .map(|d| d.clamp(EASE_MIN, EASE_MAX))
        .unwrap_or(EASE_DEFAULT);
    card.extra = fm.extra;
    Ok(card)
}

// Drops leading blank lines and trailing whitespace.
fn tidy(lines: &[&str]) -> String {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    lines[start..].join("\n").trim_end().to_string()
}

fn parse_field(path: &Path, key: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, CoreError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(|t| Some(t).filter(|t| t.timestamp() > ZERO_TIME_CUTOFF))
            .ok_or_else(|| CoreError::parse(path, format!("`{key}` is not an ISO-8601 date: {s}"))),
    }
}

// Anything up to 0001-01-02 is the "zero" time some tools write for "never".
const ZERO_TIME_CUTOFF: i64 = -62_135_510_400;

/// Accepts RFC 3339, a naive date-time (taken as UTC) or a plain date
/// (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&n));
        }
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    d.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n))
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Renders `card` in the on-disk format.
pub fn render(card: &Card) -> Result<String, CoreError> {
    let stem = title_from_path(&card.path);
    let title = Some(card.title.as_str()).filter(|t| !t.is_empty() && *t != stem);
    let fm = FrontMatterOut {
        title,
        tags: &card.tags,
        created: card.created_at.map(format_timestamp),
        last_reviewed: card.last_reviewed.map(format_timestamp),
        review_interval: card.interval_days,
        difficulty: tidy_ease(card.ease),
        extra: &card.extra,
    };
    let yaml = serde_yaml::to_string(&fm)
        .map_err(|e| CoreError::parse(&card.path, format!("cannot render front matter: {e}")))?;

    let mut out = String::with_capacity(yaml.len() + card.question.len() + card.answer.len() + 64);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n# Question\n\n");
    out.push_str(card.question.trim_end());
    out.push_str("\n\n## Answer\n\n");
    out.push_str(card.answer.trim_end());
    out.push('\n');
    Ok(out)
}

// Six decimals hide float noise such as 2.6500000000000004.
fn tidy_ease(ease: f64) -> f64 {
    (ease * 1e6).round() / 1e6
}

/// What to do with tags already stored in the file being overwritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagPolicy {
    KeepOnDisk,
    Replace,
}

/// Writes `card` to `path`, keeping the tags and creation time already on
/// disk. Returns the card exactly as written.
pub fn emit(card: &Card, path: &Path, now: DateTime<Utc>) -> Result<Card, CoreError> {
    emit_with(card, path, now, TagPolicy::KeepOnDisk)
}

pub fn emit_with(card: &Card, path: &Path, now: DateTime<Utc>, tags: TagPolicy) -> Result<Card, CoreError> {
    let mut out = card.clone();
    out.path = path.to_path_buf();

    if path.exists() {
        match parse(path) {
            Ok(existing) => {
                if existing.created_at.is_some() {
                    out.created_at = existing.created_at;
                }
                if tags == TagPolicy::KeepOnDisk {
                    out.tags = existing.tags;
                }
            }
            Err(e) => warn!("overwriting unreadable card {}: {e}", path.display()),
        }
    }
    out.created_at.get_or_insert(now);

    let text = render(&out)?;
    write_atomic(path, text.as_bytes())?;
    out.modified = modified_time(path);
    debug!("wrote card {}", path.display());
    Ok(out)
}

/// Writes through a temporary sibling and renames it over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| CoreError::io(parent, e))?;
    tmp.write_all(contents).map_err(|e| CoreError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| CoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| CoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| CoreError::io(path, e.error))?;
    Ok(())
}

pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

// Trim, whitespace runs to `_`, forbidden characters to `-`, no outer dots.
fn sanitize_component(raw: &str) -> String {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join("_");
    let replaced: String = joined
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '-' } else { c })
        .collect();
    replaced.trim_matches('.').to_string()
}

/// Turns a user-supplied title into a card filename.
pub fn sanitize_filename(title: &str) -> String {
    let mut name = sanitize_component(title);
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    if !is_card_file(Path::new(&name)) {
        name.push('.');
        name.push_str(CARD_EXTENSION);
    }
    name
}

/// Turns a user-supplied deck name into a directory name.
pub fn sanitize_dir_name(name: &str) -> Option<String> {
    Some(sanitize_component(name)).filter(|n| !n.is_empty())
}

/// `dir/file_name`, or the first free `stem_N.ext` with N from 2 upward.
pub fn unique_path(dir: &Path, file_name: &str, taken: impl Fn(&Path) -> bool) -> PathBuf {
    let candidate = dir.join(file_name);
    if !taken(&candidate) {
        return candidate;
    }
    let p = Path::new(file_name);
    let stem = p.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = p.extension().map(|s| s.to_string_lossy().into_owned());
    (2u32..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{stem}_{n}.{ext}")),
            None => dir.join(format!("{stem}_{n}")),
        })
        .find(|c| !taken(c))
        .unwrap_or(candidate)
}
