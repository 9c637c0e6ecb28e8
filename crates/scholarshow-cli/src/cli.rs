use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scholarshow_core::ShareKind;

#[derive(Parser)]
#[command(name = "scholarshow")]
#[command(about = "Notes, study timer, canvas and calculator with cloud sharing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local snapshot database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for cloud configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Toolkit(ToolkitCommands),
    /// Evaluate calculator keys, e.g. `scholarshow calc "2+3*4="`
    Calc {
        /// Keys to press (digits, . C ± % + - * / =)
        keys: Vec<String>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Commands that work on the persisted toolkit state.
#[derive(Subcommand)]
pub enum ToolkitCommands {
    /// Show or edit notes
    Notes {
        #[command(subcommand)]
        command: Option<NotesCommands>,
    },
    /// Show or control the study timer
    Timer {
        #[command(subcommand)]
        command: Option<TimerCommands>,
    },
    /// Import, export or clear the canvas
    Canvas {
        #[command(subcommand)]
        command: CanvasCommands,
    },
    /// Share the note or canvas and print its link
    Share {
        #[arg(value_enum)]
        target: ShareTarget,
    },
    /// Stop sharing the note or canvas
    Unshare {
        #[arg(value_enum)]
        target: ShareTarget,
    },
    /// Open a share link
    Open {
        /// Full link or fragment (`#share/<id>`)
        link: String,
        /// Write a shared canvas to this PNG file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Sync with the cloud
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Sign in, sign out or show auth status
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum NotesCommands {
    /// Print notes and attachments
    Show,
    /// Replace the notes (from arguments, piped stdin, or $EDITOR)
    Set {
        content: Vec<String>,
    },
    /// Append a line to the notes
    Append {
        content: Vec<String>,
    },
    /// Edit the notes in $EDITOR
    Edit,
    /// Upload a file and attach it to the notes
    Attach {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Remove an attachment by its number in `notes show`
    Detach {
        number: usize,
    },
}

#[derive(Subcommand)]
pub enum TimerCommands {
    /// Print the remaining time
    Show,
    /// Set the duration
    Set {
        minutes: String,
        #[arg(default_value = "0")]
        seconds: String,
    },
    /// Count down in the foreground; Ctrl-C pauses
    Start,
    /// Keep the remaining time and stop
    Pause,
    /// Restore the configured duration
    Reset,
}

#[derive(Subcommand)]
pub enum CanvasCommands {
    /// Replace the canvas with a PNG file
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Write the canvas to a PNG file
    Export {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Clear the canvas
    Clear,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Load and apply the cloud state
    Pull,
    /// Upload the local state
    Push,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Base URL share links are built on
        #[arg(long, value_name = "URL")]
        share_base_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign in with an ID token from a federated provider
    LoginIdToken {
        /// Issuing provider, e.g. google
        #[arg(long, default_value = "google")]
        provider: String,
        #[arg(long, value_name = "TOKEN")]
        token: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show who is signed in
    Status,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ShareTarget {
    Note,
    Canvas,
}

impl From<ShareTarget> for ShareKind {
    fn from(target: ShareTarget) -> Self {
        match target {
            ShareTarget::Note => Self::Note,
            ShareTarget::Canvas => Self::Canvas,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
