//! Support for creating an Atom feed from the articles on disk.

use crate::article::{self, Article};
use crate::config::Author;
use atom_syndication::{
    Content, Entry, Error as AtomError, Feed, FixedDateTime, Link, Person, WriteConfig,
};
use chrono::{NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

/// Bundled channel-level configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub subtitle: Option<String>,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,
    pub feed_url: Url,
}

/// Recursively finds every `.html` file under `dir` and reads it as an
/// article. The result is sorted by publish date, most recent first; articles
/// with the same date keep their discovery (file name) order.
pub fn collect_articles(dir: &Path) -> Result<Vec<Article>> {
    let mut articles = Vec::new();
    for result in WalkDir::new(dir).sort_by_file_name() {
        let entry = result?;
        let is_html = entry.path().extension().map_or(false, |ext| ext == "html");
        if entry.file_type().is_file() && is_html {
            debug!(path = %entry.path().display(), "reading article");
            articles.push(Article::from_path(entry.path())?);
        }
    }
    articles.sort_by(|a, b| b.pubdate.cmp(&a.pubdate));
    Ok(articles)
}

/// Builds the feed for the `max_entries` most recent articles under
/// `articles_directory`. Entry URLs are the articles' paths relative to
/// `blog_root`, joined onto the home page URL. This function takes ownership
/// of the provided [`FeedConfig`].
pub fn build_feed(
    config: FeedConfig,
    blog_root: &Path,
    articles_directory: &Path,
    max_entries: usize,
) -> Result<Feed> {
    let mut articles = collect_articles(articles_directory)?;
    articles.truncate(max_entries);

    let entries = feed_entries(&config, blog_root, &mut articles)?;
    let updated = match articles.first() {
        Some(article) => midnight_utc(article.pubdate),
        None => Utc.fix().from_utc_datetime(&Utc::now().naive_utc()),
    };

    Ok(Feed {
        title: config.title.into(),
        subtitle: config.subtitle.map(Into::into),
        id: config.id,
        updated,
        authors: author_to_people(config.author),
        links: vec![
            Link {
                href: config.home_page.to_string(),
                rel: "alternate".to_owned(),
                title: None,
                hreflang: None,
                mime_type: Some("text/html".to_owned()),
                length: None,
            },
            Link {
                href: config.feed_url.to_string(),
                rel: "self".to_owned(),
                title: None,
                hreflang: None,
                mime_type: Some("application/atom+xml".to_owned()),
                length: None,
            },
        ],
        entries,
        ..Feed::default()
    })
}

fn feed_entries(
    config: &FeedConfig,
    blog_root: &Path,
    articles: &mut [Article],
) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(articles.len());

    for article in articles {
        let url = config
            .home_page
            .join(article.absolute_url(blog_root)?.trim_start_matches('/'))?;
        let date = midnight_utc(article.pubdate);
        let content = article.load_content()?.to_owned();

        entries.push(Entry {
            id: url.to_string(),
            title: article.title.clone().into(),
            updated: date,
            published: Some(date),
            authors: author_to_people(config.author.clone()),
            links: vec![Link {
                href: url.to_string(),
                rel: "alternate".to_owned(),
                title: None,
                mime_type: None,
                hreflang: None,
                length: None,
            }],
            content: Some(Content {
                value: Some(content),
                content_type: Some("html".to_owned()),
                ..Content::default()
            }),
            ..Entry::default()
        })
    }
    Ok(entries)
}

// The feed has no time information, so every date is taken as midnight UTC.
fn midnight_utc(date: NaiveDate) -> FixedDateTime {
    Utc.fix().from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn author_to_people(author: Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name,
            email: author.email,
            uri: None,
        }],
        None => Vec::new(),
    }
}

/// Serializes `feed` (indented by two spaces) and writes the result to a
/// [`std::io::Write`]. A feed without entries has nothing to date, so its
/// `updated` element is left out.
pub fn write_feed<W: Write>(feed: &Feed, mut w: W) -> Result<()> {
    let xml = feed.write_with_config(
        Vec::new(),
        WriteConfig {
            write_document_declaration: true,
            indent_size: Some(2),
        },
    )?;
    let mut xml = String::from_utf8_lossy(&xml).into_owned();
    if feed.entries.is_empty() {
        xml = strip_element(&xml, "updated");
    }
    w.write_all(xml.as_bytes())?;
    w.flush()?;
    Ok(())
}

// Removes the first `<name>...</name>` element from `xml`, along with the
// indentation and line break around it.
fn strip_element(xml: &str, name: &str) -> String {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = match xml.find(&open) {
        Some(start) => start,
        None => return xml.to_owned(),
    };
    let end = match xml[start..].find(&close) {
        Some(offset) => start + offset + close.len(),
        None => return xml.to_owned(),
    };
    let start = xml[..start].trim_end_matches(' ').len();
    let start = match xml[..start].ends_with('\n') {
        true => start - 1,
        false => start,
    };
    format!("{}{}", &xml[..start], &xml[end..])
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants include I/O, Atom, article
/// parsing and URL issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when an article can't be read.
    Article(article::Error),

    /// Returned when the articles directory can't be walked.
    WalkDir(walkdir::Error),

    /// Returned when an entry URL can't be built.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
            Error::Article(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
            Error::Article(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<article::Error> for Error {
    fn from(err: article::Error) -> Error {
        Error::Article(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn page(title: &str, date: &str) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n<html>\n  <body>\n    <header></header>\n",
                "    <main>\n      <article>\n        <h1>{0}</h1>\n",
                "        <p class=\"metadata-pubdate\"><time datetime=\"{1}\">{1}</time></p>\n",
                "        <p>Body of {0}.</p>\n",
                "      </article>\n    </main>\n  </body>\n</html>\n",
            ),
            title, date
        )
    }

    fn write_article(root: &Path, date: &str, slug: &str) -> std::io::Result<PathBuf> {
        let dir = root.join("articles").join(&date[..4]);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}-{}.html", date, slug));
        fs::write(&path, page(slug, date))?;
        Ok(path)
    }

    fn config() -> FeedConfig {
        FeedConfig {
            title: "Blog".to_owned(),
            subtitle: Some("Notes".to_owned()),
            id: "https://blog.example.org/".to_owned(),
            author: Some(Author {
                name: "Baptiste".to_owned(),
                email: None,
            }),
            home_page: Url::parse("https://blog.example.org/").unwrap(),
            feed_url: Url::parse("https://blog.example.org/feed.atom").unwrap(),
        }
    }

    fn blog() -> std::io::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        write_article(dir.path(), "2023-01-01", "first")?;
        write_article(dir.path(), "2024-03-01", "third")?;
        write_article(dir.path(), "2023-06-15", "second")?;
        Ok(dir)
    }

    fn titles(feed: &Feed) -> Vec<String> {
        feed.entries.iter().map(|e| e.title.value.clone()).collect()
    }

    #[test]
    fn test_feed_is_sorted_most_recent_first() -> Result<()> {
        let dir = blog()?;
        let feed = build_feed(config(), dir.path(), &dir.path().join("articles"), 10)?;
        assert_eq!(vec!["third", "second", "first"], titles(&feed));
        assert_eq!(midnight_utc(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), feed.updated);
        Ok(())
    }

    #[test]
    fn test_feed_keeps_max_entries_most_recent() -> Result<()> {
        let dir = blog()?;
        let feed = build_feed(config(), dir.path(), &dir.path().join("articles"), 2)?;
        assert_eq!(vec!["third", "second"], titles(&feed));
        Ok(())
    }

    #[test]
    fn test_feed_entry() -> Result<()> {
        let dir = blog()?;
        let feed = build_feed(config(), dir.path(), &dir.path().join("articles"), 1)?;
        let entry = &feed.entries[0];
        let url = "https://blog.example.org/articles/2024/2024-03-01-third.html";
        assert_eq!(url, entry.id);
        assert_eq!(url, entry.links[0].href);
        let date = midnight_utc(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(date, entry.updated);
        assert_eq!(Some(date), entry.published);
        let content = entry.content.as_ref().and_then(|c| c.value.clone()).unwrap();
        assert!(content.contains("<p>Body of third.</p>"));
        assert_eq!("Baptiste", entry.authors[0].name);
        Ok(())
    }

    #[test]
    fn test_write_feed_round_trips() -> Result<()> {
        let dir = blog()?;
        let feed = build_feed(config(), dir.path(), &dir.path().join("articles"), 10)?;
        let mut out = Vec::new();
        write_feed(&feed, &mut out)?;

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains(r#"rel="self""#));
        let read: Feed = text.parse()?;
        assert_eq!(vec!["third", "second", "first"], titles(&read));
        assert_eq!(Some("Notes".to_owned()), read.subtitle.map(|s| s.value));
        Ok(())
    }

    #[test]
    fn test_empty_feed_has_no_updated() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("articles"))?;
        let feed = build_feed(config(), dir.path(), &dir.path().join("articles"), 10)?;
        assert!(feed.entries.is_empty());

        let mut out = Vec::new();
        write_feed(&feed, &mut out)?;
        let text = String::from_utf8_lossy(&out);
        assert!(!text.contains("<updated>"));
        assert!(text.contains("<title>Blog</title>"));
        assert!(text.contains("https://blog.example.org/feed.atom"));
        let _: Feed = text.parse()?;
        Ok(())
    }

    #[test]
    fn test_strip_element() {
        assert_eq!(
            "<feed>\n  <id>x</id>\n</feed>",
            strip_element("<feed>\n  <id>x</id>\n  <updated>now</updated>\n</feed>", "updated")
        );
        assert_eq!("<feed/>", strip_element("<feed/>", "updated"));
    }

    #[test]
    fn test_ties_keep_discovery_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_article(dir.path(), "2023-01-01", "b")?;
        write_article(dir.path(), "2023-01-01", "a")?;
        let articles = collect_articles(&dir.path().join("articles"))?;
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(vec!["a", "b"], titles);
        Ok(())
    }

    #[test]
    fn test_malformed_article_fails() -> Result<()> {
        let dir = blog()?;
        fs::write(dir.path().join("articles").join("2023").join("broken.html"), "<p>no</p>")?;
        match build_feed(config(), dir.path(), &dir.path().join("articles"), 10) {
            Err(Error::Article(_)) => Ok(()),
            other => panic!("wanted an Article error, got {:?}", other.map(|_| ())),
        }
    }
}
