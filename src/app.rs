use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::bookmarks::{MemoryBookmarkStore, ROOT_ID};
use crate::codec;
use crate::config::{self, Config};
use crate::preferences::{MemoryPreferences, Preferences};
use crate::rewriter::{self, RequestDetails};
use crate::session::{Collaborators, Session};
use crate::tabs::{Container, StaticContainers, StaticTabs, Tab};

pub const USAGE: &str = "Container Bookmarks - open bookmarks inside browser containers.

Usage:
  container-bookmarks encode <url> <container>   Add a container marker to a URL
  container-bookmarks decode <url>               Print the container encoded in a URL
  container-bookmarks rewrite <url>              Print the redirect for a navigation
  container-bookmarks infer <scenario.json>      Assign containers to a bookmark burst

  --version, -V        Show version and exit
  --help,    -h        Show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Encode { url: String, container: String },
    Decode { url: String },
    Rewrite { url: String },
    Infer { scenario: PathBuf },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();
        match args.as_slice() {
            ["encode", url, container] => Ok(Command::Encode {
                url: url.to_string(),
                container: container.to_string(),
            }),
            ["decode", url] => Ok(Command::Decode {
                url: url.to_string(),
            }),
            ["rewrite", url] => Ok(Command::Rewrite {
                url: url.to_string(),
            }),
            ["infer", scenario] => Ok(Command::Infer {
                scenario: PathBuf::from(scenario),
            }),
            [] => bail!("missing command\n\n{USAGE}"),
            [other, ..] => bail!("unknown or incomplete command {other:?}\n\n{USAGE}"),
        }
    }
}

/// Bookmarks, highlighted tabs and containers captured from a browser, used
/// to replay a "Bookmark Tabs" burst offline.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub bookmarks: Vec<ScenarioBookmark>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioBookmark {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

fn read_scenario(path: &Path) -> Result<Scenario> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario at {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse scenario at {}", path.display()))
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid URL {raw:?}"))
}

pub fn run(args: Vec<String>) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let command = Command::parse(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cfg, command, &mut out)
}

pub fn execute(cfg: &Config, command: Command, out: &mut impl Write) -> Result<()> {
    let redirect_key = cfg.preferences.redirect_key.as_str();
    match command {
        Command::Encode { url, container } => {
            parse_url(&url)?;
            let id = codec::container_id(&container);
            writeln!(out, "{}", codec::with_container(&url, &id, redirect_key))?;
        }
        Command::Decode { url } => {
            writeln!(out, "{}", codec::decode(&url, redirect_key))?;
        }
        Command::Rewrite { url } => {
            parse_url(&url)?;
            let response =
                rewriter::on_before_request(&RequestDetails::main_frame(url), redirect_key);
            writeln!(out, "{}", serde_json::to_string(&response)?)?;
        }
        Command::Infer { scenario } => {
            let scenario = read_scenario(&scenario)?;
            let updates = replay(cfg, scenario)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&updates)?)?;
        }
    }
    Ok(())
}

// Replays flush explicitly; the timer only has to outlast bookmark creation.
const REPLAY_DEBOUNCE: Duration = Duration::from_secs(3600);

fn replay(cfg: &Config, scenario: Scenario) -> Result<Vec<crate::inference::PlannedUpdate>> {
    let store = Arc::new(MemoryBookmarkStore::new());
    let session = Session::new(
        Collaborators {
            preferences: Arc::new(MemoryPreferences::new(Preferences {
                show_popup: false,
                ..cfg.preferences.clone()
            })),
            bookmarks: store.clone(),
            tabs: Arc::new(StaticTabs(scenario.tabs)),
            containers: Arc::new(StaticContainers(scenario.containers)),
        },
        REPLAY_DEBOUNCE,
    );

    for bookmark in scenario.bookmarks {
        parse_url(&bookmark.url)?;
        let node = store
            .create_bookmark(ROOT_ID, &bookmark.title, &bookmark.url)
            .context("create scenario bookmark")?;
        session.on_bookmark_created(&node.id, node.clone());
    }
    Ok(session.flush())
}
