use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "blogsync", about = "Command-line client for the blog API")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the blog API
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in and remember the session
    Login { username: String, password: String },
    /// Create an account, then sign in
    Register {
        username: String,
        email: String,
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Delete the signed-in account and sign out
    DeleteAccount {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Show the signed-in user
    Whoami,
    /// List posts, newest first
    Posts {
        #[arg(long)]
        cat: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Posts written by the signed-in user under any of their usernames
    Mine {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Search posts as if typed into the search box
    Search {
        query: String,
        #[arg(long)]
        cat: Option<String>,
    },
    /// Show one post with its comments
    Show { post_id: String },
    /// Publish a post
    Write {
        title: String,
        desc: String,
        #[arg(long = "cat")]
        categories: Vec<String>,
        /// Image to upload and attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Delete one of your posts
    Delete { post_id: String },
    /// Like or unlike a post
    Like { post_id: String },
    /// List categories
    Categories {
        /// Only the N busiest categories
        #[arg(long)]
        top: Option<usize>,
    },
    /// Create a category
    AddCategory { name: String },
    /// Comment on a post
    Comment { post_id: String, text: String },
    /// Delete a comment
    Uncomment { comment_id: String },
    /// Update profile fields
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        profile_pic: Option<String>,
    },
    /// Upload a file and print its URL
    Upload { path: PathBuf },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub listing: ListingConfig,
    pub search: SearchConfig,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub record_file: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ListingConfig {
    pub page_size: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_file: "blog_user.json".to_string(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: crate::listing::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: crate::search::DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref api_url) = cli.api_url {
            config.api.base_url = api_url.clone();
        }

        url::Url::parse(&config.api.base_url)
            .with_context(|| format!("invalid API base URL {:?}", config.api.base_url))?;
        if config.listing.page_size == 0 {
            anyhow::bail!("listing.page_size must be at least 1");
        }
        if config.session.record_file.trim().is_empty() {
            anyhow::bail!("session.record_file must not be empty");
        }

        config.data_dir = data_dir;
        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".blogsync")
        })
    }

    pub fn record_path(&self) -> PathBuf {
        self.data_dir.join(&self.session.record_file)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.api.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }
}
