use crate::cli::opts::*;
use crate::config::ResolvedConfig;
use crate::tui::app::TuiApp;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use deckard_core::{filter_by_tag, Card, Deck, DueStatus, Rating, Repository, ReviewSession, SessionSummary, Stats};
use deckard_fs::codec::{format_timestamp, sanitize_dir_name};
use deckard_fs::FsStore;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io::{stdin, stdout, Write};
use std::path::{Path, PathBuf};

pub fn run_cli(args: Cli, cfg: &ResolvedConfig) -> Result<()> {
    let mut store = open_store(&cfg.root)?;
    match args.cmd {
        Command::Deck(cmd) => deck_cmd(&mut store, cmd),
        Command::Card(cmd) => card_cmd(&mut store, cmd),
        Command::Review(cmd) => review_cmd(&mut store, cmd, cfg.max_cards),
        Command::Search { query } => search_cmd(&store, &query),
        Command::Stats { deck, json } => stats_cmd(&store, deck.as_deref(), json),
        Command::Forecast { deck, days } => forecast_cmd(&store, deck.as_deref(), days),
        Command::Export(cmd) => export_cmd(&store, cmd),
        Command::Import(cmd) => import_cmd(&mut store, cmd),
        Command::Tui => TuiApp::new(store, cfg.max_cards).run(),
    }
}

/// Opens the deck root, creating it on first use. Unreadable card files
/// are reported and skipped.
pub fn open_store(root: &Path) -> Result<FsStore> {
    if !root.exists() {
        std::fs::create_dir_all(root).with_context(|| format!("creating deck root {}", root.display()))?;
        info!("created deck root {}", root.display());
    }
    let (store, problems) = FsStore::open(root)?;
    for p in &problems {
        eprintln!("warning: {p}");
    }
    Ok(store)
}

fn deck_cmd(store: &mut FsStore, cmd: DeckCmd) -> Result<()> {
    match cmd {
        DeckCmd::Add { name, parent } => {
            let parent = resolve_deck(store, parent.as_deref())?;
            let d = store.create_deck(&parent, &name)?;
            println!("{}", d.full_name);
        }
        DeckCmd::List => {
            for d in store.all_decks() {
                let total = store.all_cards(&d.path)?.len();
                let due = store.due_cards(&d.path)?.len();
                println!("{}{}\t{} card(s)\t{} due", "  ".repeat(d.depth()), d.name, total, due);
            }
        }
        DeckCmd::Rm { deck } => {
            let d = resolve_deck(store, Some(&deck))?;
            store.delete_deck(&d)?;
            println!("ok");
        }
        DeckCmd::Mv { deck, new_name } => {
            let d = resolve_deck(store, Some(&deck))?;
            let renamed = store.rename_deck(&d, &new_name)?;
            println!("{}", relative(store, &renamed));
        }
    }
    Ok(())
}

fn card_cmd(store: &mut FsStore, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add(a) => {
            let deck = resolve_deck(store, a.deck.as_deref())?;
            let c = store.create_card(&deck, &a.title, &a.question, &a.answer, &a.tags)?;
            println!("{}", relative(store, &c.path));
        }
        CardCmd::List { deck, due, tag } => {
            let deck = resolve_deck(store, deck.as_deref())?;
            let now = store.now();
            let mut cards = store.all_cards(&deck)?;
            if due {
                cards.retain(|c| c.is_due(now));
            }
            if let Some(t) = tag {
                cards = filter_by_tag(&cards, &t);
            }
            for c in cards {
                let tags = if c.tags.is_empty() { "-".to_string() } else { c.tags.join(";") };
                println!(
                    "{}\t{}\t{}\tnext={}\ttags={}",
                    relative(store, &c.path),
                    c.title,
                    status_label(c.due_status(now)),
                    c.next_review(now).format("%Y-%m-%d"),
                    tags
                );
            }
        }
        CardCmd::Show { card } => {
            let id = resolve_card(store, &card)?;
            let c = store.card(&id)?;
            print_card(store, c);
        }
        CardCmd::Rm { card } => {
            let id = resolve_card(store, &card)?;
            store.delete_card(&id)?;
            println!("ok");
        }
        CardCmd::Edit(e) => {
            let id = resolve_card(store, &e.card)?;
            let card = store.card(&id)?.clone();
            let question = e.question.unwrap_or(card.question);
            let answer = e.answer.unwrap_or(card.answer);
            let tags = edit_tags(&card.tags, &e.add_tags, &e.rm_tags);
            store.edit_card(&id, &question, &answer, &tags)?;
            println!("ok");
        }
        CardCmd::Mv { card, deck } => {
            let id = resolve_card(store, &card)?;
            let target = resolve_deck(store, Some(&deck))?;
            let moved = store.move_card(&id, &target)?;
            println!("{}", relative(store, &moved.path));
        }
    }
    Ok(())
}

fn review_cmd(store: &mut FsStore, cmd: ReviewCmd, default_max: Option<usize>) -> Result<()> {
    let deck = resolve_deck(store, cmd.deck.as_deref())?;
    let max = cmd.max.or(default_max).unwrap_or(usize::MAX);
    let mut session = ReviewSession::with_limit(&*store, &deck, max)?;
    if session.is_empty() {
        println!("no cards due");
        return Ok(());
    }

    while !session.is_finished() {
        let card = session.current_card(&*store)?.clone();
        println!("\n[{}/{}] {}", session.position(), session.len(), card.title);
        println!("Q: {}", card.question);
        match read_line("[enter=show, s=skip, q=quit] ")?.as_deref().map(str::trim) {
            None | Some("q") | Some("quit") => {
                session.abort();
                break;
            }
            Some("s") | Some("skip") => {
                session.skip()?;
                continue;
            }
            _ => session.reveal()?,
        }

        println!("A: {}", card.answer);
        println!("{}", rating_help());
        let Some(rating) = prompt_rating()? else {
            session.abort();
            break;
        };
        match session.rate(&mut *store, rating) {
            Ok(c) => println!("→ next review in {} day(s)", c.interval_days),
            Err(e) => {
                warn!("rating {} failed: {e}", card.path.display());
                eprintln!("could not save rating: {e}");
                session.abort();
            }
        }
    }

    print_summary(&session.summary());
    Ok(())
}

fn search_cmd(store: &FsStore, query: &str) -> Result<()> {
    let hits = store.search(query);
    if hits.is_empty() {
        println!("no matches");
    }
    for c in hits {
        println!("{}\t{}", relative(store, &c.path), c.title);
    }
    Ok(())
}

fn stats_cmd(store: &FsStore, deck: Option<&str>, json: bool) -> Result<()> {
    let deck = resolve_deck(store, deck)?;
    let stats = store.stats(&deck)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(store.tree().full_name(&deck).unwrap_or_default(), &stats);
    }
    Ok(())
}

fn forecast_cmd(store: &FsStore, deck: Option<&str>, days: u32) -> Result<()> {
    let deck = resolve_deck(store, deck)?;
    for (day, n) in store.forecast(&deck, days)? {
        println!("{}\t{:>4}\t{}", day, n, "#".repeat(n.min(60)));
    }
    Ok(())
}

fn export_cmd(store: &FsStore, cmd: ExportCmd) -> Result<()> {
    match cmd {
        ExportCmd::Json { path, deck } => {
            let deck = resolve_deck(store, deck.as_deref())?;
            let bundle = ExportBundle {
                version: EXPORT_VERSION,
                exported_at: store.now(),
                deck: store.tree().full_name(&deck).unwrap_or_default().to_string(),
                decks: store
                    .tree()
                    .all_decks(&deck)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| d.full_name.clone())
                    .collect(),
                cards: export_cards(store, &deck)?,
            };
            let s = serde_json::to_string_pretty(&bundle)?;
            std::fs::write(&path, s).with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        ExportCmd::Csv { path, deck } => {
            let deck = resolve_deck(store, deck.as_deref())?;
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "deck",
                "file",
                "title",
                "question",
                "answer",
                "tags",
                "created",
                "last_reviewed",
                "review_interval",
                "difficulty",
            ])?;
            for c in export_cards(store, &deck)? {
                wtr.write_record([
                    c.deck,
                    c.file,
                    c.title.to_string(),
                    c.question.to_string(),
                    c.answer.to_string(),
                    c.tags.join(";"),
                    c.created.map(format_timestamp).unwrap_or_default(),
                    c.last_reviewed.map(format_timestamp).unwrap_or_default(),
                    c.review_interval.to_string(),
                    format!("{:.2}", c.difficulty),
                ])?;
            }
            wtr.flush()?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn import_cmd(store: &mut FsStore, cmd: ImportCmd) -> Result<()> {
    let (path, deck, cards) = match cmd {
        ImportCmd::Json { path, deck } => {
            let data = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let bundle: ImportBundle = serde_json::from_str(&data)?;
            if bundle.version != EXPORT_VERSION {
                bail!("unsupported export version {}", bundle.version);
            }
            (path, deck, bundle.cards)
        }
        ImportCmd::Csv { path, deck } => {
            let mut rdr = csv::Reader::from_path(&path)?;
            let mut cards = Vec::new();
            for row in rdr.deserialize::<CsvCard>() {
                cards.push(ImportCard::from(row?));
            }
            (path, deck, cards)
        }
    };
    let target = resolve_deck(store, deck.as_deref())?;
    let n = import_cards(store, &target, cards)?;
    println!("imported {n} card(s) from {} into {}", path.display(), relative(store, &target));
    Ok(())
}

// ===== Helpers =====

/// Finds a deck by its path below the root (`rust/async`), an absolute
/// path, or a unique deck name. `None` selects the root.
pub fn resolve_deck(store: &FsStore, sel: Option<&str>) -> Result<PathBuf> {
    let root = store.root();
    let Some(sel) = sel.map(str::trim).filter(|s| !s.is_empty() && *s != "." && *s != "/") else {
        return Ok(root.to_path_buf());
    };

    let candidate = under_root(root, sel);
    if store.tree().contains_deck(&candidate) {
        return Ok(candidate);
    }
    if let Ok(abs) = std::fs::canonicalize(sel) {
        if store.tree().contains_deck(&abs) {
            return Ok(abs);
        }
    }

    let matches: Vec<&Deck> = store
        .all_decks()
        .into_iter()
        .filter(|d| d.name.eq_ignore_ascii_case(sel) || d.full_name.eq_ignore_ascii_case(sel))
        .collect();
    match matches.as_slice() {
        [d] => Ok(d.path.clone()),
        [] => bail!("deck not found: {sel}"),
        _ => bail!("deck name `{sel}` is ambiguous, give its path from the root"),
    }
}

/// Finds a card by its path below the root, with or without `.md`.
pub fn resolve_card(store: &FsStore, sel: &str) -> Result<PathBuf> {
    let sel = sel.trim();
    let mut candidates = vec![under_root(store.root(), sel)];
    if let Ok(abs) = std::fs::canonicalize(sel) {
        candidates.push(abs);
    }
    let with_ext: Vec<PathBuf> = candidates.iter().map(|p| p.with_extension("md")).collect();
    candidates.extend(with_ext);

    match candidates.into_iter().find(|p| store.tree().card(p).is_some()) {
        Some(p) => Ok(p),
        None => bail!("card not found: {sel}"),
    }
}

fn under_root(root: &Path, rel: &str) -> PathBuf {
    rel.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .fold(root.to_path_buf(), |p, c| p.join(c))
}

fn relative(store: &FsStore, path: &Path) -> String {
    path.strip_prefix(store.root()).unwrap_or(path).display().to_string()
}

fn status_label(s: DueStatus) -> &'static str {
    match s {
        DueStatus::New => "new",
        DueStatus::Due => "due",
        DueStatus::Future => "scheduled",
    }
}

/// Existing tags plus `add`, minus `rm`, compared case-insensitively.
fn edit_tags(existing: &[String], add: &[String], rm: &[String]) -> Vec<String> {
    let mut tags = existing.to_vec();
    for t in add {
        if !tags.iter().any(|x| x.eq_ignore_ascii_case(t.trim())) {
            tags.push(t.trim().to_string());
        }
    }
    tags.retain(|x| !rm.iter().any(|r| x.eq_ignore_ascii_case(r.trim())));
    tags
}

fn rating_help() -> String {
    Rating::ALL
        .iter()
        .map(|r| format!("{}={}", r.as_score(), r.label()))
        .collect::<Vec<_>>()
        .join(", ")
        + ", q=quit"
}

fn prompt_rating() -> Result<Option<Rating>> {
    loop {
        let Some(line) = read_line("rate> ")? else {
            return Ok(None);
        };
        match line.trim() {
            "q" | "quit" => return Ok(None),
            s => match s.parse::<u8>().ok().and_then(|n| Rating::from_score(n).ok()) {
                Some(r) => return Ok(Some(r)),
                None => println!("enter 0-5, or q"),
            },
        }
    }
}

// `None` at end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    let n = stdin().read_line(&mut s)?;
    Ok((n > 0).then_some(s))
}

fn print_card(store: &FsStore, c: &Card) {
    let now = store.now();
    let day = |t: Option<DateTime<Utc>>| t.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".into());
    println!("{}  ({})", c.title, relative(store, &c.path));
    if !c.tags.is_empty() {
        println!("tags: {}", c.tags.join(", "));
    }
    println!("\nQ: {}\n\nA: {}\n", c.question, c.answer);
    println!("status:        {}", status_label(c.due_status(now)));
    println!("interval:      {} day(s)", c.interval_days);
    println!("difficulty:    {:.2}", c.ease);
    println!("created:       {}", day(c.created_at));
    println!("last reviewed: {}", day(c.last_reviewed));
    println!("next review:   {}", day(Some(c.next_review(now))));
}

fn print_stats(name: &str, s: &Stats) {
    println!("{name}");
    println!("  cards:        {} ({} here, {} sub-deck(s))", s.total_cards, s.direct_cards, s.sub_decks);
    println!("  due:          {}", s.due_cards);
    println!("  new/young/mature: {}/{}/{}", s.new_cards, s.young_cards, s.mature_cards);
    println!("  avg interval: {:.1} day(s)", s.average_interval_days);
    println!("  last 30 days: {} review(s), {}% success, {}% retention", s.reviews_30d, s.success_rate_30d, s.retention_rate_30d);
    let dist: Vec<String> = s.rating_distribution_30d.iter().map(|(k, v)| format!("{k}:{v}")).collect();
    println!("  ratings:      {}", dist.join("  "));
    println!("  streak:       {} day(s)", s.streak_days);
    match s.last_studied_at {
        Some(t) => println!("  last studied: {}", t.format("%Y-%m-%d %H:%M")),
        None => println!("  last studied: never"),
    }
}

fn print_summary(s: &SessionSummary) {
    let verb = if s.aborted { "stopped" } else { "finished" };
    println!(
        "\n{verb}: {} rated, {} skipped, {} left, {} correct of {}",
        s.rated,
        s.skipped,
        s.remaining,
        s.correct(),
        s.total
    );
}

const EXPORT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ExportBundle<'a> {
    version: u32,
    exported_at: DateTime<Utc>,
    deck: String,
    decks: Vec<String>,
    cards: Vec<ExportCard<'a>>,
}

#[derive(Serialize)]
struct ExportCard<'a> {
    deck: String,
    file: String,
    title: &'a str,
    question: &'a str,
    answer: &'a str,
    tags: &'a [String],
    created: Option<DateTime<Utc>>,
    last_reviewed: Option<DateTime<Utc>>,
    review_interval: u32,
    difficulty: f64,
}

fn export_cards<'a>(store: &'a FsStore, deck: &Path) -> Result<Vec<ExportCard<'a>>> {
    Ok(store
        .all_cards(deck)?
        .into_iter()
        .map(|c| ExportCard {
            deck: store.tree().full_name(c.deck_path()).unwrap_or_default().to_string(),
            file: relative(store, &c.path),
            title: &c.title,
            question: &c.question,
            answer: &c.answer,
            tags: &c.tags,
            created: c.created_at,
            last_reviewed: c.last_reviewed,
            review_interval: c.interval_days,
            difficulty: c.ease,
        })
        .collect())
}

#[derive(Deserialize)]
struct ImportBundle {
    version: u32,
    #[serde(default)]
    cards: Vec<ImportCard>,
}

/// The parts of an exported card that make up a new one. Scheduling state
/// is not carried over, so imported cards start out new.
#[derive(Deserialize)]
struct ImportCard {
    #[serde(default)]
    file: String,
    #[serde(default)]
    title: String,
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct CsvCard {
    #[serde(default)]
    file: String,
    #[serde(default)]
    title: String,
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    tags: String,
}

impl From<CsvCard> for ImportCard {
    fn from(row: CsvCard) -> Self {
        let tags = row
            .tags
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        ImportCard {
            file: row.file,
            title: row.title,
            question: row.question,
            answer: row.answer,
            tags,
        }
    }
}

/// Creates every card below `target`, rebuilding the directories named in
/// its `file` path.
fn import_cards(store: &mut FsStore, target: &Path, cards: Vec<ImportCard>) -> Result<usize> {
    let mut n = 0;
    for c in cards {
        let deck = ensure_decks(store, target, &c.file)?;
        let title = match c.title.trim() {
            "" => Path::new(&c.file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            t => t.to_string(),
        };
        store
            .create_card(&deck, &title, &c.question, &c.answer, &c.tags)
            .with_context(|| format!("importing {}", c.file))?;
        n += 1;
    }
    info!("imported {n} card(s) into {}", target.display());
    Ok(n)
}

fn ensure_decks(store: &mut FsStore, target: &Path, file: &str) -> Result<PathBuf> {
    let mut dirs: Vec<&str> = file.split(['/', '\\']).collect();
    dirs.pop();
    let mut deck = target.to_path_buf();
    for raw in dirs {
        let Some(name) = sanitize_dir_name(raw) else {
            continue;
        };
        let next = deck.join(&name);
        deck = if store.tree().contains_deck(&next) {
            next
        } else {
            store.create_deck(&deck, &name)?.path.clone()
        };
    }
    Ok(deck)
}
