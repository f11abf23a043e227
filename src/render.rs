//! Rendering of new markup from templates: index cards for existing articles
//! and stub pages for new ones. Templates use the Go template syntax of
//! [`gtmpl`]; values are HTML-escaped before they reach the template.

use crate::article::{display_date, Article, DATE_FORMAT};
use chrono::NaiveDate;
use gtmpl::{Template, Value};
use std::collections::HashMap;
use std::fmt;

/// The built-in index card template.
pub const CARD_TEMPLATE: &str = include_str!("../templates/card.html");

/// The built-in article stub template.
pub const ARTICLE_TEMPLATE: &str = include_str!("../templates/article.html");

/// Holds the templates for the duration of a command. Templates are checked
/// when the renderer is built, so a broken template fails before any file is
/// touched.
pub struct Renderer {
    card: String,
    article: String,
}

impl Renderer {
    /// Builds a renderer from card and article template sources.
    pub fn new(card: String, article: String) -> Result<Renderer> {
        check("card", &card)?;
        check("article", &article)?;
        Ok(Renderer { card, article })
    }

    /// Builds a renderer from the built-in templates.
    pub fn builtin() -> Result<Renderer> {
        Renderer::new(CARD_TEMPLATE.to_owned(), ARTICLE_TEMPLATE.to_owned())
    }

    /// Renders the index card for `article`, linking to `url`.
    pub fn card(&self, article: &Article, url: &str) -> Result<String> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("url".to_owned(), escaped(url));
        m.insert("title".to_owned(), escaped(&article.title));
        m.insert(
            "pubdate".to_owned(),
            Value::String(article.pubdate.format(DATE_FORMAT).to_string()),
        );
        m.insert("pubdate_display".to_owned(), escaped(&article.pubdate_display));
        render("card", &self.card, Value::Object(m))
    }

    /// Renders a new, empty article page.
    pub fn article_stub(&self, stub: &Stub) -> Result<String> {
        render("article", &self.article, stub.into())
    }
}

/// The values a new article page is rendered from.
pub struct Stub<'a> {
    pub title: &'a str,
    pub pubdate: NaiveDate,
    pub header_class: &'a str,
    pub site_title: &'a str,
    pub feed_file: &'a str,
}

impl From<&Stub<'_>> for Value {
    /// Converts a [`Stub`] into a [`Value`] for templating.
    fn from(stub: &Stub) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), escaped(stub.title));
        m.insert(
            "pubdate".to_owned(),
            Value::String(stub.pubdate.format(DATE_FORMAT).to_string()),
        );
        m.insert(
            "pubdate_display".to_owned(),
            Value::String(display_date(stub.pubdate)),
        );
        m.insert("header_class".to_owned(), escaped(stub.header_class));
        m.insert("site_title".to_owned(), escaped(stub.site_title));
        m.insert("feed_file".to_owned(), escaped(stub.feed_file));
        Value::Object(m)
    }
}

fn check(name: &'static str, source: &str) -> Result<()> {
    let mut template = Template::default();
    template.parse(source).map_err(|e| Error::Template {
        name,
        message: e.to_string(),
    })
}

fn render(name: &'static str, source: &str, value: Value) -> Result<String> {
    gtmpl::template(source, value).map_err(|e| Error::Template {
        name,
        message: e.to_string(),
    })
}

fn escaped(s: &str) -> Value {
    Value::String(escape_html(s))
}

/// Escapes the characters that are significant in HTML text and attribute
/// values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// The result of rendering a template.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing or executing a template.
#[derive(Debug)]
pub enum Error {
    /// Returned when the named template is invalid or fails to execute.
    Template { name: &'static str, message: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template { name, message } => {
                write!(f, "{} template: {}", name, message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn article() -> Article {
        Article {
            title: "Fish & <chips>".to_owned(),
            pubdate_display: "March 1th".to_owned(),
            pubdate: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            path: PathBuf::from("/blog/articles/2024/2024-03-01-fish.html"),
            content: None,
        }
    }

    #[test]
    fn test_card() -> Result<()> {
        let card = Renderer::builtin()?.card(&article(), "/articles/2024/2024-03-01-fish.html")?;
        assert_eq!(
            concat!(
                "<article>\n",
                "  <h2><a href=\"/articles/2024/2024-03-01-fish.html\">Fish &amp; &lt;chips&gt;</a></h2>\n",
                "  <p>\n",
                "    <small>Published on <time datetime=\"2024-03-01\">March 1th</time></small>\n",
                "  </p>\n",
                "</article>\n",
            ),
            card
        );
        Ok(())
    }

    #[test]
    fn test_article_stub() -> Result<()> {
        let page = Renderer::builtin()?.article_stub(&Stub {
            title: "Hello, world!",
            pubdate: NaiveDate::from_ymd_opt(2023, 6, 22).unwrap(),
            header_class: "header-dots",
            site_title: "Blog",
            feed_file: "feed.atom",
        })?;
        assert!(page.contains("<h1>Hello, world!</h1>"));
        assert!(page.contains(r#"<header class="header-dots">"#));
        assert!(page.contains(r#"<time datetime="2023-06-22">June 22th</time>"#));
        Ok(())
    }

    #[test]
    fn test_broken_template_fails_early() {
        match Renderer::new("{{ .title ".to_owned(), ARTICLE_TEMPLATE.to_owned()) {
            Err(Error::Template { name, .. }) => assert_eq!("card", name),
            Ok(_) => panic!("wanted a template error"),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!("&lt;a href=&quot;x&quot;&gt;&#x27;&amp;", escape_html("<a href=\"x\">'&"));
    }
}
