//! Helpers for moving between HTML text and [`kuchikiki`] trees: reading and
//! parsing documents, serializing them back to a canonical text form, and
//! handling the small fragments (index cards) that get spliced into pages.

use kuchikiki::traits::*;
use kuchikiki::{NodeRef, ParseOpts};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::string::FromUtf8Error;
use tracing::debug;

/// The doctype every serialized document starts with.
pub const DOCTYPE: &str = "<!DOCTYPE html>";

/// Reads the file at `path` as UTF-8 text.
pub fn read(path: &Path) -> Result<String> {
    Ok(String::from_utf8(fs::read(path)?)?)
}

/// Parses `text` into a mutable document tree. HTML parsing never fails
/// outright; the parser's complaints are logged against `source` (usually the
/// file path) at debug level.
pub fn parse_document(source: &str, text: &str) -> NodeRef {
    let source = source.to_owned();
    let opts = ParseOpts {
        on_parse_error: Some(Box::new(move |message| {
            debug!(source = %source, "html parse error: {}", message)
        })),
        ..ParseOpts::default()
    };
    kuchikiki::parse_html_with_options(opts).one(text)
}

/// Serializes a document to its canonical text form: a single
/// `<!DOCTYPE html>` line, the rest of the document as parsed, and exactly one
/// trailing newline. Whitespace inside the document is kept as-is, so a page's
/// hand-written indentation survives a rewrite.
///
/// The parser moves any whitespace after `</body>` into the body, so the
/// body's trailing whitespace is cut back to its first line. Without this,
/// every rewrite would grow the page by a blank line.
pub fn serialize_document(document: &NodeRef) -> io::Result<String> {
    trim_body_tail(document);

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(DOCTYPE.as_bytes());
    out.push(b'\n');
    for child in document.children() {
        if child.as_doctype().is_some() {
            continue;
        }
        child.serialize(&mut out)?;
    }
    let mut text =
        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = text.trim_end().len();
    text.truncate(len);
    text.push('\n');
    Ok(text)
}

fn trim_body_tail(document: &NodeRef) {
    let body = match document.select_first("body") {
        Ok(body) => body,
        Err(()) => return,
    };
    let tail = match body.as_node().last_child() {
        Some(tail) => tail,
        None => return,
    };
    if let Some(text) = tail.as_text() {
        let mut text = text.borrow_mut();
        if !text.trim().is_empty() {
            return;
        }
        if let Some(first) = text.find('\n') {
            if let Some(second) = text[first + 1..].find('\n') {
                text.truncate(first + 1 + second);
            }
        }
    }
}

/// Serializes the children of `node`, i.e. its markup without its own tags.
pub fn inner_html(node: &NodeRef) -> io::Result<String> {
    let mut out: Vec<u8> = Vec::new();
    for child in node.children() {
        child.serialize(&mut out)?;
    }
    String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Parses an HTML fragment and returns its top-level nodes, detached and
/// ready to be inserted elsewhere. Leading and trailing whitespace of the
/// fragment is dropped.
pub fn parse_fragment(fragment: &str) -> Vec<NodeRef> {
    let document = kuchikiki::parse_html().one(fragment.trim());
    let body = match document.select_first("body") {
        Ok(body) => body,
        Err(()) => return Vec::new(),
    };
    let nodes: Vec<NodeRef> = body.as_node().children().collect();
    for node in &nodes {
        node.detach();
    }
    nodes
}

/// Prefixes every non-blank line of `text` with `prefix`.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| match line.trim().is_empty() {
            true => line.to_owned(),
            false => format!("{}{}", prefix, line),
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Returns the indentation `node` sits at, taken from the whitespace text
/// between it and the preceding line break. Nodes that don't start their own
/// line have no indentation.
pub fn indentation_of(node: &NodeRef) -> String {
    let previous = match node.previous_sibling() {
        Some(previous) => previous,
        None => return String::new(),
    };
    let text = match previous.as_text() {
        Some(text) => text.borrow().clone(),
        None => return String::new(),
    };
    match text.rfind('\n') {
        Some(i) if text[i + 1..].trim().is_empty() => text[i + 1..].to_owned(),
        _ => String::new(),
    }
}

/// The result of reading a document.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem reading a document from disk.
#[derive(Debug)]
pub enum Error {
    /// Returned when the file can't be read.
    Io(io::Error),

    /// Returned when the file isn't valid UTF-8.
    Undecodable(FromUtf8Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Undecodable(err) => write!(f, "not valid UTF-8 markup: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Undecodable(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::Undecodable(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PAGE: &str = "<!doctype html>\n<html>\n  <head><title>t</title></head>\n  <body>\n    <p>Fish &amp; chips</p>\n  </body>\n</html>\n";

    #[test]
    fn test_serialize_document_is_stable() -> io::Result<()> {
        let first = serialize_document(&parse_document("page", PAGE))?;
        let second = serialize_document(&parse_document("page", &first))?;
        assert!(first.starts_with("<!DOCTYPE html>\n<html>"));
        assert!(first.ends_with("</html>\n"));
        assert!(first.contains("<p>Fish &amp; chips</p>"));
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_serialize_document_adds_missing_doctype() -> io::Result<()> {
        let text = serialize_document(&parse_document("page", "<p>hi</p>"))?;
        assert!(text.starts_with("<!DOCTYPE html>\n<html>"));
        Ok(())
    }

    #[test]
    fn test_parse_fragment() -> io::Result<()> {
        let nodes = parse_fragment("\n  <article><h2>A</h2></article>\n");
        assert_eq!(1, nodes.len());
        assert!(nodes[0].parent().is_none());
        assert_eq!("<article><h2>A</h2></article>", nodes[0].to_string());
        Ok(())
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!("  a\n\n    b", indent("a\n\n  b", "  "));
    }

    #[test]
    fn test_indentation_of() -> std::result::Result<(), ()> {
        let doc = parse_document("page", "<main>\n      <h2>Articles</h2></main>");
        let heading = doc.select_first("h2")?;
        assert_eq!("      ", indentation_of(heading.as_node()));
        Ok(())
    }

    #[test]
    fn test_read_rejects_invalid_utf8() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.html");
        fs::write(&path, [0x3c, 0xff, 0xfe, 0x3e])?;
        match read(&path) {
            Err(Error::Undecodable(_)) => Ok(()),
            other => panic!("wanted Undecodable, got {:?}", other),
        }
    }
}
