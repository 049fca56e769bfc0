use serde::Deserialize;
use std::{
    net::SocketAddr,
    ops::Deref,
    path::{Path, PathBuf},
};
use url::Url;

#[derive(Deserialize, Debug)]
pub struct DbConfig {
    pub sqlite_file: SqlitePath,
}

#[derive(Deserialize, Debug)]
pub struct NetConfig {
    pub proto_host: Url,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    pub bind: SocketAddr,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    /// Listing page size.
    pub items_per_page: usize,
    /// Glob of the Tera templates.
    pub templates: String,
    /// Slug of the page served at the base path. Defaults to the first
    /// top-level page.
    pub root_slug: Option<String>,
    pub allow_comments: bool,
    pub disqus_shortname: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            items_per_page: 10,
            templates: "templates/**/*.html".to_string(),
            root_slug: None,
            allow_comments: true,
            disqus_shortname: None,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub db: DbConfig,
    pub net: NetConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

fn default_base_path() -> String {
    "/".to_string()
}

/// Location of the SQLite database. The file itself is created on first
/// start, but the directory holding it must already exist.
#[derive(Deserialize, Debug, Clone)]
#[serde(try_from = "String")]
pub struct SqlitePath(PathBuf);

impl TryFrom<String> for SqlitePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let path = PathBuf::from(&value);
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("{:?} does not name a database file", value))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = dir
            .canonicalize()
            .map_err(|err| format!("database directory of {:?}: {}", value, err))?;

        Ok(SqlitePath(dir.join(file_name)))
    }
}

impl Deref for SqlitePath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_path()
    }
}
