use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use osf_explorer::error::{OsfError, Result};
use osf_explorer::{Config, ExplorerHandle, NodeRecord, ROOT_ID};
use tracing_subscriber::{EnvFilter, fmt};

pub fn usage_and_exit(usage: &str) -> ! {
    eprintln!("{usage}");
    process::exit(1);
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("osf_explorer=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

pub struct ArgParser {
    args: Vec<String>,
    usage: &'static str,
}

impl ArgParser {
    pub fn new(usage: &'static str) -> Self {
        let args: Vec<String> = env::args().skip(1).collect();

        if args.iter().any(|a| a == "--help" || a == "-h") {
            println!("{usage}");
            process::exit(0);
        }

        Self { args, usage }
    }

    pub fn take_value(&mut self, names: &[&str]) -> Option<String> {
        let mut i = 0;
        while i < self.args.len() {
            if names.contains(&self.args[i].as_str()) {
                let value = self.args.get(i + 1).cloned();
                if value.is_none() {
                    usage_and_exit(self.usage);
                }
                self.args.drain(i..=i + 1);
                return value;
            }
            i += 1;
        }
        None
    }

    pub fn remaining(self) -> Vec<String> {
        self.args
    }
}

/// Settings shared by every demo.
pub struct Options {
    pub config: Config,
    #[allow(dead_code)]
    pub positionals: Vec<String>,
}

/// Read `--config FILE`, `--token-file FILE` and `--proxy URL` on top of the
/// `OSF_*` environment variables.
pub fn parse_options(usage: &'static str, positionals: usize) -> Options {
    let mut parser = ArgParser::new(usage);
    let mut config = match parser.take_value(&["--config", "-c"]) {
        Some(path) => Config::load(&path).unwrap_or_else(|e| {
            eprintln!("Failed to read {path}: {e}");
            process::exit(1);
        }),
        None => Config::from_env(),
    };
    if let Some(path) = parser.take_value(&["--token-file"]) {
        config = config.with_token_file(path);
    }
    if config.token_file.is_none() {
        config = config.with_token_file("osf_token.json");
    }
    if let Some(proxy) = parser.take_value(&["--proxy"]) {
        config = config.with_proxy(proxy);
    }

    let positionals = {
        let rest = parser.remaining();
        if rest.len() != positionals {
            usage_and_exit(usage);
        }
        rest
    };
    Options {
        config,
        positionals,
    }
}

/// Restore the stored session or walk the user through a browser login.
#[allow(dead_code)]
pub async fn open_session(options: &Options) -> Result<ExplorerHandle> {
    let explorer = ExplorerHandle::connect(options.config.clone())?;
    if let Some(user) = explorer.restore_session().await? {
        println!("Logged in as: {}", user.full_name);
        return Ok(explorer);
    }

    options.config.validate_oauth()?;
    let url = explorer.begin_login().await?;
    println!("Open this URL in a browser and log in:");
    println!("  {url}");
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let mut redirect = String::new();
    io::stdin().lock().read_line(&mut redirect)?;
    let user = explorer.complete_login(redirect.trim()).await?;
    println!("Logged in as: {}", user.full_name);
    Ok(explorer)
}

/// Resolve `Project/provider/folder/file` by expanding one level at a time.
#[allow(dead_code)]
pub async fn resolve_path(explorer: &ExplorerHandle, path: &str) -> Result<NodeRecord> {
    let mut current = explorer
        .node(ROOT_ID)
        .await?
        .ok_or_else(|| OsfError::NodeNotFound(ROOT_ID.to_string()))?;

    for part in path.split('/').filter(|p| !p.is_empty()) {
        let children = explorer.expand(&current.id).await?;
        current = children
            .into_iter()
            .find(|c| c.name == part)
            .ok_or_else(|| OsfError::NodeNotFound(format!("{part} in {path}")))?;
    }
    Ok(current)
}
