use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "deckard", version, about = "Spaced-repetition flashcards kept as markdown files")]
pub struct Cli {
    /// Deck root directory (overrides DECKARD_ROOT and the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Log level written to the log file (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Deck operations
    #[command(subcommand)]
    Deck(DeckCmd),
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// Line-based review session
    Review(ReviewCmd),
    /// Search every card by text or tag
    Search { query: String },
    /// Statistics for a deck and everything below it
    Stats {
        deck: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Cards becoming due on each of the next days
    Forecast {
        deck: Option<String>,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Export a deck subtree
    #[command(subcommand)]
    Export(ExportCmd),
    /// Import cards written by `export`, below a deck
    #[command(subcommand)]
    Import(ImportCmd),
    /// Launch the terminal UI
    Tui,
}

#[derive(Debug, Subcommand, Clone)]
pub enum DeckCmd {
    Add {
        name: String,
        /// Parent deck (defaults to the root)
        #[arg(long)]
        parent: Option<String>,
    },
    List,
    Rm { deck: String },
    Mv { deck: String, new_name: String },
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add(CardAdd),
    List {
        #[arg(long)]
        deck: Option<String>,
        /// Only cards due now
        #[arg(long)]
        due: bool,
        #[arg(long)]
        tag: Option<String>,
    },
    Show { card: String },
    Rm { card: String },
    Edit(CardEdit),
    Mv { card: String, deck: String },
}

#[derive(Debug, Args, Clone)]
pub struct CardAdd {
    #[arg(long)]
    pub deck: Option<String>,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub question: String,
    #[arg(long)]
    pub answer: String,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CardEdit {
    pub card: String,
    #[arg(long)]
    pub question: Option<String>,
    #[arg(long)]
    pub answer: Option<String>,
    #[arg(long = "add-tag")]
    pub add_tags: Vec<String>,
    #[arg(long = "rm-tag")]
    pub rm_tags: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long)]
    pub deck: Option<String>,
    /// Cap on cards in this session (overrides `[review] max_cards`)
    #[arg(long)]
    pub max: Option<usize>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json {
        path: PathBuf,
        #[arg(long)]
        deck: Option<String>,
    },
    Csv {
        path: PathBuf,
        #[arg(long)]
        deck: Option<String>,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ImportCmd {
    Json {
        path: PathBuf,
        #[arg(long)]
        deck: Option<String>,
    },
    /// Columns are matched by header: question, answer, title, tags (`;`-separated), file
    Csv {
        path: PathBuf,
        #[arg(long)]
        deck: Option<String>,
    },
}
