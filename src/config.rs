//! Loads the blog's configuration from a `bbblog.yaml` project file. The
//! directory holding the project file is the blog root: articles, the index
//! page and the feed are all located relative to it.
//!
//! ```yaml
//! site_url: https://blog.example.org/
//! title: My blog
//! subtitle: Notes and such
//! author:
//!   name: Baptiste
//! max_entries: 20
//! formatter: [npx, prettier, --parser, html]
//! ```

use crate::util::open;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "bbblog.yaml";

#[derive(Deserialize)]
struct MaxEntries(usize);
impl Default for MaxEntries {
    fn default() -> Self {
        MaxEntries(20)
    }
}

fn default_title() -> String {
    String::from("Blog")
}

fn default_feed_file() -> String {
    String::from("feed.atom")
}

fn default_index_file() -> String {
    String::from("index.html")
}

fn default_articles_directory() -> String {
    String::from("articles")
}

#[derive(Deserialize)]
struct Project {
    site_url: Url,

    #[serde(default = "default_title")]
    title: String,

    #[serde(default)]
    subtitle: Option<String>,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default = "default_feed_file")]
    feed_file: String,

    #[serde(default = "default_index_file")]
    index_file: String,

    #[serde(default = "default_articles_directory")]
    articles_directory: String,

    #[serde(default)]
    max_entries: MaxEntries,

    #[serde(default)]
    formatter: Vec<String>,

    #[serde(default)]
    templates: Templates,
}

#[derive(Deserialize, Default)]
struct Templates {
    #[serde(default)]
    card: Option<PathBuf>,

    #[serde(default)]
    article: Option<PathBuf>,
}

/// The author credited in the feed.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// The resolved configuration. All paths are joined onto the blog root.
#[derive(Clone, Debug)]
pub struct Config {
    pub root_directory: PathBuf,
    pub articles_directory: PathBuf,
    pub index_file: PathBuf,
    pub feed_file: PathBuf,
    pub feed_file_name: String,
    pub site_url: Url,
    pub feed_url: Url,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<Author>,
    pub max_entries: usize,
    pub formatter: Vec<String>,
    pub card_template: Option<PathBuf>,
    pub article_template: Option<PathBuf>,
}

impl Config {
    /// Loads the project file at `project_file` if given, otherwise searches
    /// for one from the current directory upwards.
    pub fn load(project_file: Option<&Path>) -> Result<Config> {
        match project_file {
            Some(path) => Config::from_project_file(path),
            None => Config::from_directory(&std::env::current_dir()?),
        }
    }

    /// Looks for [`PROJECT_FILE`] in `dir` and each of its parents.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads the configuration from the project file at `path`.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let path = path
            .canonicalize()
            .with_context(|| format!("Resolving `{}`", path.display()))?;
        let root = match path.parent() {
            None => {
                return Err(anyhow!(
                    "Can't get parent directory for provided project file path '{:?}'",
                    path
                ))
            }
            Some(root) => root.to_owned(),
        };
        Config::from_project(project, root)
    }

    fn from_project(project: Project, root: PathBuf) -> Result<Config> {
        let mut site_url = project.site_url;
        if !site_url.path().ends_with('/') {
            let path = format!("{}/", site_url.path());
            site_url.set_path(&path);
        }
        Ok(Config {
            articles_directory: root.join(&project.articles_directory),
            index_file: root.join(&project.index_file),
            feed_file: root.join(&project.feed_file),
            feed_url: site_url.join(&project.feed_file)?,
            feed_file_name: project.feed_file,
            site_url,
            title: project.title,
            subtitle: project.subtitle,
            author: project.author,
            max_entries: project.max_entries.0,
            formatter: project.formatter,
            card_template: project.templates.card.map(|p| root.join(p)),
            article_template: project.templates.article.map(|p| root.join(p)),
            root_directory: root,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site_url: https://blog.example.org/sub\n",
        )?;

        let config = Config::from_project_file(&dir.path().join(PROJECT_FILE))?;
        let root = dir.path().canonicalize()?;
        assert_eq!(root, config.root_directory);
        assert_eq!(root.join("articles"), config.articles_directory);
        assert_eq!(root.join("index.html"), config.index_file);
        assert_eq!(root.join("feed.atom"), config.feed_file);
        assert_eq!("https://blog.example.org/sub/", config.site_url.as_str());
        assert_eq!("https://blog.example.org/sub/feed.atom", config.feed_url.as_str());
        assert_eq!("Blog", config.title);
        assert_eq!(20, config.max_entries);
        assert!(config.formatter.is_empty());
        assert_eq!(None, config.author);
        Ok(())
    }

    #[test]
    fn test_full_project() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            concat!(
                "site_url: https://blog.example.org/\n",
                "title: Notes\n",
                "subtitle: Things I wrote down\n",
                "author:\n",
                "  name: Baptiste\n",
                "  email: b@example.org\n",
                "feed_file: rss.xml\n",
                "max_entries: 5\n",
                "formatter: [npx, prettier, --parser, html]\n",
                "templates:\n",
                "  card: theme/card.html\n",
            ),
        )?;

        let config = Config::from_project_file(&dir.path().join(PROJECT_FILE))?;
        let root = dir.path().canonicalize()?;
        assert_eq!("Notes", config.title);
        assert_eq!(Some("Things I wrote down".to_owned()), config.subtitle);
        assert_eq!(
            Some(Author {
                name: "Baptiste".to_owned(),
                email: Some("b@example.org".to_owned()),
            }),
            config.author
        );
        assert_eq!("https://blog.example.org/rss.xml", config.feed_url.as_str());
        assert_eq!(5, config.max_entries);
        assert_eq!(vec!["npx", "prettier", "--parser", "html"], config.formatter);
        assert_eq!(Some(root.join("theme/card.html")), config.card_template);
        assert_eq!(None, config.article_template);
        Ok(())
    }

    #[test]
    fn test_from_directory_searches_parents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site_url: https://blog.example.org/\n",
        )?;
        let nested = dir.path().join("articles").join("2024");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        assert_eq!(dir.path().canonicalize()?, config.root_directory);
        Ok(())
    }

    #[test]
    fn test_missing_site_url() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "title: Notes\n")?;
        assert!(Config::from_project_file(&dir.path().join(PROJECT_FILE)).is_err());
        Ok(())
    }
}
