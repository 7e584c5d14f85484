use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::capture::command::CommandSelection;
use crate::engine::EngineConfig;
use crate::event::Size;
use crate::visibility::VisibilityConfig;

#[derive(Parser)]
#[command(name = "selpopd", about = "Selection gesture popup daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch X11 input and drive the popup surface
    Run {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        reader: ReaderArgs,

        /// Key whose key-down captures the current selection: F1-F24, a
        /// letter or digit, Pause, Scroll_Lock, Print, Insert or Menu
        #[arg(long)]
        capture_key: Option<String>,

        /// Never capture while an application with this WM_CLASS has focus
        #[arg(long = "ignore-class")]
        ignore_classes: Vec<String>,
    },

    /// Record X11 input to a journal file until interrupted
    Record {
        /// Journal file to create
        #[arg(long)]
        out: PathBuf,
    },

    /// Feed a recorded journal through the engine
    Replay {
        /// Journal file to read
        journal: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        reader: ReaderArgs,

        /// Use this text instead of running the selection reader
        #[arg(long)]
        capture_text: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct EngineArgs {
    /// Drag steps needed before a release counts as drag-select
    #[arg(long, default_value_t = 3)]
    pub drag_threshold: usize,

    /// Delay between a recognized gesture and its action
    #[arg(long, default_value_t = 100)]
    pub settle_ms: u64,

    /// How long the pointer may stay outside the popup before it hides
    #[arg(long, default_value_t = 1000)]
    pub hide_idle_ms: u64,

    /// Fade-out duration for animated hides
    #[arg(long, default_value_t = 200)]
    pub fade_ms: u64,

    /// Upper bound on one selection capture
    #[arg(long, default_value_t = 1500)]
    pub capture_timeout_ms: u64,

    /// Popup width reported by the UI shell
    #[arg(long, default_value_t = 320.0)]
    pub surface_width: f64,

    /// Popup height reported by the UI shell
    #[arg(long, default_value_t = 120.0)]
    pub surface_height: f64,

    /// Gap between the pointer and the popup's bottom edge
    #[arg(long, default_value_t = 10.0)]
    pub offset: f64,
}

impl EngineArgs {
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            drag_threshold: self.drag_threshold,
            settle: Duration::from_millis(self.settle_ms),
            capture_timeout: Duration::from_millis(self.capture_timeout_ms),
            visibility: VisibilityConfig {
                hide_idle: Duration::from_millis(self.hide_idle_ms),
                fade: Duration::from_millis(self.fade_ms),
                offset: self.offset,
            },
            capture_key: None,
        }
    }

    pub fn surface_size(&self) -> Size {
        Size {
            width: self.surface_width,
            height: self.surface_height,
        }
    }
}

#[derive(Args, Clone)]
pub struct ReaderArgs {
    /// Program that prints the current selection [default: xclip -selection primary -o]
    #[arg(long)]
    pub reader: Option<String>,

    /// Argument for the reader program (repeatable)
    #[arg(long = "reader-arg", allow_hyphen_values = true, requires = "reader")]
    pub reader_args: Vec<String>,
}

impl ReaderArgs {
    pub fn selection(&self) -> CommandSelection {
        match &self.reader {
            Some(program) => CommandSelection::new(program.clone(), self.reader_args.clone()),
            None => CommandSelection::xclip_primary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_match_engine_defaults() {
        let cli = Cli::try_parse_from(["selpopd", "run"]).unwrap();
        let Command::Run { engine, reader, .. } = cli.command else {
            panic!("expected run");
        };
        let config = engine.config();
        let defaults = EngineConfig::default();
        assert_eq!(config.drag_threshold, defaults.drag_threshold);
        assert_eq!(config.settle, defaults.settle);
        assert_eq!(config.capture_timeout, defaults.capture_timeout);
        assert_eq!(config.visibility.hide_idle, defaults.visibility.hide_idle);
        assert_eq!(config.visibility.fade, defaults.visibility.fade);
        assert!(reader.reader.is_none());
        assert!(reader.reader_args.is_empty());
    }

    #[test]
    fn reader_args_keep_leading_dashes() {
        let cli = Cli::try_parse_from([
            "selpopd",
            "run",
            "--reader",
            "wl-paste",
            "--reader-arg",
            "--primary",
            "--reader-arg",
            "--no-newline",
        ])
        .unwrap();
        let Command::Run { reader, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(reader.reader.as_deref(), Some("wl-paste"));
        assert_eq!(reader.reader_args, ["--primary", "--no-newline"]);
    }

    #[test]
    fn reader_arg_without_reader_is_rejected() {
        assert!(Cli::try_parse_from(["selpopd", "run", "--reader-arg", "-o"]).is_err());
    }

    #[test]
    fn ignore_class_repeats() {
        let cli = Cli::try_parse_from([
            "selpopd",
            "run",
            "--ignore-class",
            "KeePassXC",
            "--ignore-class",
            "Alacritty",
        ])
        .unwrap();
        let Command::Run { ignore_classes, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(ignore_classes, ["KeePassXC", "Alacritty"]);
    }

    #[test]
    fn replay_takes_journal_and_text() {
        let cli = Cli::try_parse_from([
            "selpopd",
            "replay",
            "session.journal",
            "--capture-text",
            "hello",
            "--hide-idle-ms",
            "500",
        ])
        .unwrap();
        let Command::Replay {
            journal,
            engine,
            capture_text,
            ..
        } = cli.command
        else {
            panic!("expected replay");
        };
        assert_eq!(journal, PathBuf::from("session.journal"));
        assert_eq!(capture_text.as_deref(), Some("hello"));
        assert_eq!(engine.config().visibility.hide_idle, Duration::from_millis(500));
    }
}
