//! The rewrite engine. A rewrite is a transaction over one HTML document:
//!
//! 1. read the file and parse it into a mutable tree,
//! 2. hand the tree to a mutation callback, which edits it in place,
//! 3. serialize the tree ([`crate::html::serialize_document`]) and run the
//!    result through the configured [`Formatter`],
//! 4. atomically replace the file with the result.
//!
//! The file is only touched in the last step, so an error anywhere before it
//! (a missing node, a failing formatter) leaves the original file as it was.
//! Mutation callbacks must not do I/O of their own; see [`crate::edit`] for
//! the ones the tool uses.

use crate::format::{self, Formatter};
use crate::html;
use crate::query;
use kuchikiki::NodeRef;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Parses `text`, applies `mutate` to the tree, and returns the serialized,
/// formatted result together with the mutation's return value. `source`
/// names the document in log messages. Nothing is persisted.
pub fn rewrite_str<T, F>(
    source: &str,
    text: &str,
    formatter: &Formatter,
    mutate: F,
) -> Result<(String, T)>
where
    F: FnOnce(&NodeRef) -> Result<T>,
{
    let document = html::parse_document(source, text);
    let value = mutate(&document)?;
    let serialized = html::serialize_document(&document)?;
    Ok((formatter.format(serialized)?, value))
}

/// Rewrites the file at `path` in place: see the module documentation for
/// the steps. Returns the mutation's return value. If the rewritten text is
/// identical to the original, the file isn't written at all.
pub fn rewrite_file<T, F>(path: &Path, formatter: &Formatter, mutate: F) -> Result<T>
where
    F: FnOnce(&NodeRef) -> Result<T>,
{
    let run = || -> Result<T> {
        let text = html::read(path)?;
        let (output, value) =
            rewrite_str(&path.display().to_string(), &text, formatter, mutate)?;
        if output == text {
            debug!(path = %path.display(), "unchanged, not writing");
        } else {
            persist(path, output.as_bytes())?;
            info!(path = %path.display(), "rewrote");
        }
        Ok(value)
    };
    run().map_err(|e| Error::Annotated(path.to_owned(), Box::new(e)))
}

/// Writes `contents` next to `path` and renames it over `path`. An existing
/// file keeps its permissions; a new one is created world-readable (0644 on
/// unix) rather than with the temporary file's owner-only mode.
pub fn persist(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => new_file_permissions(),
        Err(e) => return Err(e),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        fs::set_permissions(file.path(), permissions)?;
    }
    file.persist(path)?;
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// The result of a rewrite.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed rewrite. None of these leave a partially written file
/// behind.
#[derive(Debug)]
pub enum Error {
    /// Returned when the file can't be read or written.
    Io(io::Error),

    /// Returned when the file isn't decodable markup.
    Parse(std::string::FromUtf8Error),

    /// Returned when a mutation's structural query fails.
    Query(query::Error),

    /// Returned when the external formatter fails or isn't available.
    ExternalTool(format::Error),

    /// Returned when a mutation can't be applied for another reason.
    Mutation(String),

    /// An error with the path of the file being rewritten.
    Annotated(PathBuf, Box<Error>),
}

impl Error {
    /// Returns the underlying error, without path annotations.
    pub fn root(&self) -> &Error {
        match self {
            Error::Annotated(_, err) => err.root(),
            err => err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Parse(err) => write!(f, "parsing markup: {}", err),
            Error::Query(err) => err.fmt(f),
            Error::ExternalTool(err) => err.fmt(f),
            Error::Mutation(message) => message.fmt(f),
            Error::Annotated(path, err) => write!(f, "rewriting {}: {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Query(err) => Some(err),
            Error::ExternalTool(err) => Some(err),
            Error::Mutation(_) => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
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

impl From<query::Error> for Error {
    fn from(err: query::Error) -> Error {
        Error::Query(err)
    }
}

impl From<format::Error> for Error {
    fn from(err: format::Error) -> Error {
        Error::ExternalTool(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::find_one;

    const PAGE: &str = "<!DOCTYPE html>\n<html>\n  <body>\n    <header class=\"a\">Blog</header>\n  </body>\n</html>\n";

    fn set_class(document: &NodeRef) -> Result<()> {
        let header = find_one(document, "header")?;
        header
            .attributes
            .borrow_mut()
            .insert("class", "b".to_owned());
        Ok(())
    }

    #[test]
    fn test_rewrite_str_returns_mutation_value() -> Result<()> {
        let (text, value) = rewrite_str("page", PAGE, &Formatter::none(), |document| {
            set_class(document)?;
            Ok(42)
        })?;
        assert_eq!(42, value);
        assert!(text.contains(r#"<header class="b">Blog</header>"#));
        Ok(())
    }

    #[test]
    fn test_rewrite_file_writes_result() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.html");
        fs::write(&path, PAGE)?;

        rewrite_file(&path, &Formatter::none(), set_class)?;

        let text = fs::read_to_string(&path)?;
        assert!(text.starts_with("<!DOCTYPE html>\n"));
        assert!(text.contains(r#"<header class="b">Blog</header>"#));
        Ok(())
    }

    #[test]
    fn test_failed_mutation_leaves_file_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.html");
        fs::write(&path, PAGE)?;

        let result = rewrite_file(&path, &Formatter::none(), |document| {
            set_class(document)?;
            Err::<(), Error>(Error::Mutation("boom".to_owned()))
        });

        match result {
            Err(Error::Annotated(p, err)) => {
                assert_eq!(path, p);
                assert!(matches!(*err, Error::Mutation(_)));
            }
            other => panic!("wanted an annotated Mutation error, got {:?}", other),
        }
        assert_eq!(PAGE, fs::read_to_string(&path)?);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_formatter_leaves_file_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.html");
        fs::write(&path, PAGE)?;

        let formatter = Formatter::new(vec!["false".to_owned()]);
        match rewrite_file(&path, &formatter, set_class) {
            Err(err) => assert!(matches!(err.root(), Error::ExternalTool(_))),
            Ok(()) => panic!("wanted an ExternalTool error"),
        }
        assert_eq!(PAGE, fs::read_to_string(&path)?);
        Ok(())
    }

    #[test]
    fn test_undecodable_file_is_a_parse_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.html");
        fs::write(&path, [0xff, 0xfe])?;

        match rewrite_file(&path, &Formatter::none(), |_| Ok(())) {
            Err(err) => {
                assert!(matches!(err.root(), Error::Parse(_)));
                assert!(err.to_string().contains("page.html"));
            }
            Ok(()) => panic!("wanted a Parse error"),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.html");
        fs::write(&path, PAGE)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        rewrite_file(&path, &Formatter::none(), set_class)?;

        assert_eq!(0o644, fs::metadata(&path)?.permissions().mode() & 0o777);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_new_file_is_world_readable() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("feed.atom");

        persist(&path, b"<feed/>")?;

        assert_eq!("<feed/>", fs::read_to_string(&path)?);
        assert_eq!(0o644, fs::metadata(&path)?.permissions().mode() & 0o777);
        Ok(())
    }
}
