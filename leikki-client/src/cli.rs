use std::path::PathBuf;

use clap::{Parser, Subcommand};

const HELP_EPILOG: &str = r#"Config resolution order:
  1) --config/-c PATH
  2) $LEIKKI_CONFIG
  3) XDG default: ~/.config/leikkitsemppari/config.yaml

LEIKKI_SUPABASE_URL and LEIKKI_SUPABASE_ANON_KEY override the file.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "leikki",
    version,
    about = "Pair-play tracker for a group of children",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    SignIn {
        /// Email address. Falls back to prompt.
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account with email and password
    SignUp {
        /// Email address. Falls back to prompt.
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the stored session
    SignOut,
    /// Show who is signed in and what the backend holds
    Status,
    /// Print the play grid
    Grid,
    /// List games in the palette
    Games,
    /// List children and their axis
    Children,
    /// Print play history, newest first
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Put a game into the cell of two children
    Assign {
        /// Row child (id or name)
        row: String,
        /// Column child (id or name)
        col: String,
        /// Game (id or name)
        game: String,
    },
    /// Log a play session without changing the grid
    Log {
        /// First child (id or name)
        a: String,
        /// Second child (id or name)
        b: String,
        /// Game (id or name)
        game: String,
    },
    /// Admin-only actions, unlocked with the PIN
    Admin {
        /// PIN. Falls back to prompt.
        #[arg(long)]
        pin: Option<String>,
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Manage children
    #[command(subcommand)]
    Child(ChildCommand),
    /// Manage games
    #[command(subcommand)]
    Game(GameCommand),
    /// Clear play history and all assignments
    ResetGrid,
    /// Remove every child
    ResetChildren,
    /// Change the admin PIN
    SetPin {
        /// New 4-digit PIN
        new_pin: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChildCommand {
    /// Add a child; the axis is picked to keep rows and columns balanced
    Add { name: String },
    /// Rename a child
    Rename { child: String, name: String },
    /// Delete a child
    Delete { child: String },
}

#[derive(Debug, Subcommand)]
pub enum GameCommand {
    /// Add a game to the palette
    Add {
        name: String,
        /// Up to two characters shown in grid cells
        #[arg(long, default_value = "")]
        emoji: String,
        /// Hex color #RRGGBB
        #[arg(long, default_value = "")]
        color: String,
    },
    /// Change a game's name, glyph or color
    Edit {
        game: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a game
    Delete { game: String },
}
