//! Exports the [`Blog`] type, which stitches together the high-level steps of
//! each command: reading articles ([`crate::article`]), rendering new markup
//! ([`crate::render`]), rewriting pages in place ([`crate::rewrite`] with the
//! mutations in [`crate::edit`]) and generating the Atom feed
//! ([`crate::feed`]).

use crate::article::{self, Article};
use crate::config::Config;
use crate::edit;
use crate::feed::{self, build_feed, write_feed, FeedConfig};
use crate::format::Formatter;
use crate::header::random_variant;
use crate::render::{self, Renderer, Stub, ARTICLE_TEMPLATE, CARD_TEMPLATE};
use crate::rewrite::{self, rewrite_file};
use crate::util;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Builds the [`Renderer`] for `config`: the built-in templates, unless the
/// configuration points at replacements.
pub fn load_renderer(config: &Config) -> anyhow::Result<Renderer> {
    let load = |path: &Option<PathBuf>, builtin: &str| -> anyhow::Result<String> {
        match path {
            Some(path) => util::read_to_string(path, "template"),
            None => Ok(builtin.to_owned()),
        }
    };
    Ok(Renderer::new(
        load(&config.card_template, CARD_TEMPLATE)?,
        load(&config.article_template, ARTICLE_TEMPLATE)?,
    )?)
}

/// Parses a date given on the command line (`YYYY-MM-DD`).
pub fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    article::parse_date(s).map_err(|err| Error::DateParse(s.to_owned(), err))
}

/// The context every command runs in. It's built once per invocation.
pub struct Blog {
    config: Config,
    renderer: Renderer,
    formatter: Formatter,
}

impl Blog {
    pub fn new(config: Config, renderer: Renderer, formatter: Formatter) -> Blog {
        Blog {
            config,
            renderer,
            formatter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Renders the index card for the article at `path`.
    pub fn mkindex(&self, path: &Path) -> Result<String> {
        let article = Article::from_path(&fs::canonicalize(path)?)?;
        let url = article.absolute_url(&self.config.root_directory)?;
        Ok(self.renderer.card(&article, &url)?)
    }

    /// Renders the index card for the article at `path` and inserts it at the
    /// top of the index page's article list. Returns the index page's path.
    pub fn insert_card(&self, path: &Path) -> Result<PathBuf> {
        let card = self.mkindex(path)?;
        let index = &self.config.index_file;
        rewrite_file(index, &self.formatter, |document| {
            Ok(edit::insert_card(document, &card)?)
        })?;
        info!(index = %index.display(), "inserted card");
        Ok(index.clone())
    }

    /// Creates an empty article titled `title`, dated `today`, at
    /// `articles/<year>/<date>-<slug>.html`. An existing file is never
    /// overwritten.
    pub fn mkarticle<R: Rng + ?Sized>(
        &self,
        title: &str,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<PathBuf> {
        let path = self.article_path(today, &slug::slugify(title));
        if path.exists() {
            return Err(Error::FileConflict(path));
        }

        let page = self.renderer.article_stub(&Stub {
            title,
            pubdate: today,
            header_class: random_variant(rng),
            site_title: &self.config.title,
            feed_file: &self.config.feed_file_name,
        })?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::FileConflict(path))
            }
            Err(e) => return Err(Error::Io(e)),
        };
        file.write_all(page.as_bytes())?;
        info!(path = %path.display(), "created article");
        Ok(path)
    }

    /// Moves the article at `path` to `new_date`: its date markers are
    /// rewritten, the file is renamed (and moved to the new year's directory
    /// if needed), and its card on the index page is pointed at the new
    /// location. Returns the article's new path.
    pub fn changedate(&self, path: &Path, new_date: NaiveDate) -> Result<PathBuf> {
        let path = fs::canonicalize(path)?;
        let article = Article::from_path(&path)?;
        let old_date = article.pubdate;

        let new_path = self.article_path(new_date, &slug_of(&path)?);
        if new_path != path && new_path.exists() {
            return Err(Error::FileConflict(new_path));
        }

        let rewritten = rewrite_file(&path, &self.formatter, |document| {
            Ok(edit::rewrite_dates(document, old_date, new_date)?)
        })?;
        info!(path = %path.display(), rewritten, "rewrote dates");

        if new_path != path {
            if let Some(dir) = new_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::rename(&path, &new_path)?;
            info!(from = %path.display(), to = %new_path.display(), "moved article");
        }

        let index = &self.config.index_file;
        if index.exists() {
            let root = &self.config.root_directory;
            let old_url = article.absolute_url(root)?;
            let moved = Article {
                path: new_path.clone(),
                ..article
            };
            let new_url = moved.absolute_url(root)?;
            let relinked = rewrite_file(index, &self.formatter, |document| {
                Ok(edit::relink_card(
                    document, &old_url, &new_url, old_date, new_date,
                )?)
            })?;
            if relinked == 0 {
                warn!(url = %old_url, "no card on the index page links to the article");
            }
        }
        Ok(new_path)
    }

    /// Gives each page in `paths` a header style drawn independently from
    /// [`crate::header::VARIANTS`]. Returns the style each page got.
    pub fn randomize_header<R: Rng + ?Sized>(
        &self,
        paths: &[PathBuf],
        rng: &mut R,
    ) -> Result<Vec<(PathBuf, &'static str)>> {
        let mut assigned = Vec::with_capacity(paths.len());
        for path in paths {
            let variant = random_variant(rng);
            rewrite_file(path, &self.formatter, |document| {
                Ok(edit::set_header_class(document, variant)?)
            })?;
            assigned.push((path.clone(), variant));
        }
        Ok(assigned)
    }

    /// Regenerates the feed from the `max_entries` most recent articles (the
    /// configured number if `None`). Returns the feed's path.
    pub fn mkrss(&self, max_entries: Option<usize>) -> Result<PathBuf> {
        let config = &self.config;
        let feed = build_feed(
            FeedConfig {
                title: config.title.clone(),
                subtitle: config.subtitle.clone(),
                id: config.site_url.to_string(),
                author: config.author.clone(),
                home_page: config.site_url.clone(),
                feed_url: config.feed_url.clone(),
            },
            &config.root_directory,
            &config.articles_directory,
            max_entries.unwrap_or(config.max_entries),
        )?;

        let mut xml = Vec::new();
        write_feed(&feed, &mut xml)?;
        rewrite::persist(&config.feed_file, &xml)?;
        info!(path = %config.feed_file.display(), entries = feed.entries.len(), "wrote feed");
        Ok(config.feed_file.clone())
    }

    fn article_path(&self, date: NaiveDate, slug: &str) -> PathBuf {
        self.config
            .articles_directory
            .join(date.year().to_string())
            .join(format!("{}-{}.html", date.format(article::DATE_FORMAT), slug))
    }
}

// Returns the slug part of an article file name: the file stem without its
// leading ISO date.
fn slug_of(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| Error::InvalidFileName(path.to_owned()))?;
    let is_dated = stem.len() > 11
        && stem.is_char_boundary(10)
        && stem.as_bytes()[10] == b'-'
        && article::parse_date(&stem[..10]).is_ok();
    Ok(match is_dated {
        true => stem[11..].to_owned(),
        false => stem.to_owned(),
    })
}

/// The result of a command.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the blog commands.
#[derive(Debug)]
pub enum Error {
    /// Returned when an article can't be read.
    Article(article::Error),

    /// Returned when a template fails.
    Render(render::Error),

    /// Returned when rewriting a page fails.
    Rewrite(rewrite::Error),

    /// Returned when building or writing the feed fails.
    Feed(feed::Error),

    /// Returned when a file the command would create already exists.
    FileConflict(PathBuf),

    /// Returned when an article's file name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// Returned when a date argument isn't an ISO-8601 date.
    DateParse(String, chrono::ParseError),

    /// Returned for other I/O errors.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Article(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Rewrite(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::FileConflict(path) => write!(f, "`{}` already exists", path.display()),
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
            Error::DateParse(s, err) => write!(f, "invalid date `{}`: {}", s, err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Article(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Rewrite(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::FileConflict(_) => None,
            Error::InvalidFileName(_) => None,
            Error::DateParse(_, err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<article::Error> for Error {
    fn from(err: article::Error) -> Error {
        Error::Article(err)
    }
}

impl From<render::Error> for Error {
    fn from(err: render::Error) -> Error {
        Error::Render(err)
    }
}

impl From<rewrite::Error> for Error {
    fn from(err: rewrite::Error) -> Error {
        Error::Rewrite(err)
    }
}

impl From<feed::Error> for Error {
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
