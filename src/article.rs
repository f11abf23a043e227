//! Defines the [`Article`] type and the logic for reading article metadata out
//! of a published HTML file. An article page must contain:
//!
//! 1. A single `h1` inside `main > article` (the title)
//! 2. A single `time` element inside an element with the `metadata-pubdate`
//!    class, carrying the date in its `datetime` attribute
//!
//! For example:
//!
//! ```html
//! <main>
//!   <article>
//!     <h1>Hello, world!</h1>
//!     <p class="metadata-pubdate">
//!       <small>Published on <time datetime="2024-03-01">March 1th</time></small>
//!     </p>
//!     ...
//!   </article>
//! </main>
//! ```

use crate::html;
use crate::query::{self, find_one};
use chrono::{NaiveDate, ParseError as DateParseError};
use kuchikiki::NodeRef;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Selects the article element of an article page.
pub const ARTICLE_SELECTOR: &str = "main > article";

/// Selects the title heading of an article page.
pub const TITLE_SELECTOR: &str = "main > article > h1";

/// Selects the publish-date marker of an article page.
pub const PUBDATE_SELECTOR: &str = "main > article .metadata-pubdate time";

/// The format of the machine-readable `datetime` attribute.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Renders `date` the way it's displayed on the blog, e.g. `March 1th`. The
/// suffix is always `th`.
pub fn display_date(date: NaiveDate) -> String {
    format!("{}th", date.format("%B %-d"))
}

/// Parses a machine-readable date such as `2024-03-01`.
pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
}

/// One blog post, as read from its HTML file. The file is the source of
/// truth; an [`Article`] only lives for the duration of a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Article {
    /// The text of the article's heading, trimmed.
    pub title: String,

    /// The human-readable publish date, exactly as it appears on the page.
    pub pubdate_display: String,

    /// The publish date parsed from the `datetime` attribute.
    pub pubdate: NaiveDate,

    /// The article's file.
    pub path: PathBuf,

    /// The article's body markup. Only populated by [`Article::load_content`].
    pub content: Option<String>,
}

impl Article {
    /// Reads and parses the article at `path`. Any error is annotated with
    /// the path.
    pub fn from_path(path: &Path) -> Result<Article> {
        let parse = || -> Result<Article> {
            let text = html::read(path)?;
            Article::from_str(path, &text)
        };
        parse().map_err(|e| Error::Annotated(path.to_owned(), Box::new(e)))
    }

    /// Extracts an article's metadata from its markup. `path` is only
    /// recorded, not read.
    pub fn from_str(path: &Path, text: &str) -> Result<Article> {
        let document = html::parse_document(&path.display().to_string(), text);
        Article::from_document(path, &document)
    }

    fn from_document(path: &Path, document: &NodeRef) -> Result<Article> {
        let title = find_one(document, TITLE_SELECTOR)?;
        let time = find_one(document, PUBDATE_SELECTOR)?;
        let datetime = time
            .attributes
            .borrow()
            .get("datetime")
            .map(str::to_owned)
            .ok_or(Error::MissingDatetime)?;

        Ok(Article {
            title: title.text_contents().trim().to_owned(),
            pubdate_display: time.text_contents(),
            pubdate: parse_date(datetime.trim())?,
            path: path.to_owned(),
            content: None,
        })
    }

    /// Returns the article's URL path relative to the blog root, rooted at
    /// `/` (e.g. `/articles/2024/2024-03-01-hello.html`).
    pub fn absolute_url(&self, blog_root: &Path) -> Result<String> {
        let relative = self
            .path
            .strip_prefix(blog_root)
            .map_err(|_| Error::OutsideBlogRoot(self.path.clone()))?;
        let mut url = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    url.push('/');
                    url.push_str(&part.to_string_lossy());
                }
                _ => return Err(Error::OutsideBlogRoot(self.path.clone())),
            }
        }
        Ok(url)
    }

    /// Reads the article's body markup (the contents of `main > article`,
    /// formatting preserved) into [`Article::content`] and returns it.
    pub fn load_content(&mut self) -> Result<&str> {
        let path = self.path.clone();
        let load = || -> Result<String> {
            let text = html::read(&path)?;
            let document = html::parse_document(&path.display().to_string(), &text);
            let article = find_one(&document, ARTICLE_SELECTOR)?;
            Ok(html::inner_html(article.as_node())?)
        };
        let content = load().map_err(|e| Error::Annotated(path.clone(), Box::new(e)))?;
        self.content = Some(content);
        Ok(self.content.as_deref().unwrap_or_default())
    }
}

/// The result of reading an [`Article`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading an [`Article`] from its file.
#[derive(Debug)]
pub enum Error {
    /// Returned when the file can't be read.
    Io(std::io::Error),

    /// Returned when the file isn't decodable markup.
    Parse(std::string::FromUtf8Error),

    /// Returned when the page doesn't have the expected structure (no title,
    /// several publish dates, etc).
    Malformed(query::Error),

    /// Returned when the publish-date marker has no `datetime` attribute.
    MissingDatetime,

    /// Returned when the `datetime` attribute isn't an ISO-8601 date.
    DateParse(DateParseError),

    /// Returned when an article's path isn't under the blog root.
    OutsideBlogRoot(PathBuf),

    /// An error with the path of the article it concerns.
    Annotated(PathBuf, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Parse(err) => write!(f, "parsing markup: {}", err),
            Error::Malformed(err) => write!(f, "malformed article: {}", err),
            Error::MissingDatetime => {
                write!(f, "malformed article: publish date has no `datetime` attribute")
            }
            Error::DateParse(err) => write!(f, "invalid publish date: {}", err),
            Error::OutsideBlogRoot(path) => {
                write!(f, "`{}` is not inside the blog root", path.display())
            }
            Error::Annotated(path, err) => write!(f, "{}: {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Malformed(err) => Some(err),
            Error::MissingDatetime => None,
            Error::DateParse(err) => Some(err),
            Error::OutsideBlogRoot(_) => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<html::Error> for Error {
    fn from(err: html::Error) -> Error {
        match err {
            html::Error::Io(e) => Error::Io(e),
            html::Error::Undecodable(e) => Error::Parse(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<query::Error> for Error {
    fn from(err: query::Error) -> Error {
        Error::Malformed(err)
    }
}

impl From<DateParseError> for Error {
    fn from(err: DateParseError) -> Error {
        Error::DateParse(err)
    }
}
