use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::TaskFilter;
use crate::sort::SortKey;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo",
    version,
    about = "Single-user task list: add, complete, star, remove and search tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "todorc", global = true)]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task to the end of the list.
    Add {
        /// Creation time (RFC 3339 or YYYY-MM-DD); defaults to now.
        #[arg(long = "at")]
        at: Option<String>,

        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Mark a task complete, or not complete if it already is.
    Done { id: String },
    /// Mark a task important, or not important if it already is.
    Star { id: String },
    /// Remove a task.
    Remove { id: String },
    /// Show one of the lists: all, important or completed.
    List {
        #[arg(
            default_value = "all",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskFilter>())
        )]
        list: TaskFilter,

        #[arg(
            long = "sort",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortKey>())
        )]
        sort: Option<SortKey>,
    },
    /// Show tasks whose name contains the query, ignoring case.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[arg(
            long = "sort",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortKey>())
        )]
        sort: Option<SortKey>,
    },
}

impl Command {
    /// What runs when no subcommand is given.
    pub fn default_list() -> Self {
        Command::List {
            list: TaskFilter::All,
            sort: None,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 || verbose == 0 {
        "warn"
    } else if verbose == 1 {
        "info"
    } else if verbose == 2 {
        "debug"
    } else {
        "trace"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Subcommands whose trailing words are free text (task names, queries).
const FREE_TEXT_COMMANDS: &[&str] = &["add", "search"];

/// Global flags that consume the following word as their value.
const VALUE_FLAGS: &[&str] = &["--rc", "--todorc", "--data"];

/// Pulls `rc.key=value` / `rc.key:value` words out of the argument list so
/// they can sit anywhere on the command line. Capture stops at `--` and once
/// a free-text subcommand has started, so task names are left alone.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let mut seen_command = false;
    let mut free_text = false;
    let mut flag_value_next = false;

    for arg in iter {
        let s = arg.to_string_lossy().into_owned();

        if free_text || flag_value_next {
            flag_value_next = false;
            cleaned.push(arg);
            continue;
        }
        if s == "--" {
            free_text = true;
            cleaned.push(arg);
            continue;
        }

        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                if k.trim().is_empty() {
                    return Err(anyhow!("empty key in override: {s}"));
                }
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        if !seen_command {
            if VALUE_FLAGS.contains(&s.as_str()) {
                flag_value_next = true;
            } else if !s.starts_with('-') {
                seen_command = true;
                free_text = FREE_TEXT_COMMANDS.contains(&s.as_str());
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};
    use crate::filter::TaskFilter;
    use crate::sort::SortKey;

    fn args(words: &[&str]) -> Vec<OsString> {
        words.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["todo", "rc.color=off", "list", "rc.default.sort:name"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["todo", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.default.sort".to_string(), "name".to_string()),
            ]
        );
    }

    #[test]
    fn task_names_that_look_like_overrides_are_kept() {
        let raw = args(&["todo", "rc.color=off", "add", "rc.local:", "fix", "boot"]);
        let pre = preprocess_args(&raw).expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["todo", "add", "rc.local:", "fix", "boot"]));
        assert_eq!(pre.rc_overrides, vec![("rc.color".to_string(), "off".to_string())]);

        let cli = GlobalCli::parse_from(pre.cleaned_args);
        match cli.command {
            Some(Command::Add { name, .. }) => assert_eq!(name.join(" "), "rc.local: fix boot"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn double_dash_and_flag_values_stop_capture() {
        let pre = preprocess_args(&args(&["todo", "--data", "rc.d:x", "list", "--", "rc.x=1"]))
            .expect("preprocess");
        assert_eq!(
            pre.cleaned_args,
            args(&["todo", "--data", "rc.d:x", "list", "--", "rc.x=1"])
        );
        assert!(pre.rc_overrides.is_empty());
    }

    #[test]
    fn parses_add_with_multiword_name() {
        let cli = GlobalCli::parse_from(args(&["todo", "add", "--at", "2024-01-01", "Buy", "milk"]));
        match cli.command {
            Some(Command::Add { at, name }) => {
                assert_eq!(at.as_deref(), Some("2024-01-01"));
                assert_eq!(name.join(" "), "Buy milk");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_list_with_sort() {
        let cli = GlobalCli::parse_from(args(&["todo", "-v", "list", "important", "--sort", "name"]));
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Some(Command::List { list, sort }) => {
                assert_eq!(list, TaskFilter::Important);
                assert_eq!(sort, Some(SortKey::Name));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_list() {
        assert!(GlobalCli::try_parse_from(args(&["todo", "list", "someday"])).is_err());
    }
}
