//! Structural queries against a parsed document. Most of the tool relies on a
//! structural guarantee (an article has one title, a page has one header), so
//! [`find_one`] refuses to guess: zero or several matches is an error rather
//! than a silent pick.

use kuchikiki::{ElementData, NodeDataRef, NodeRef};
use std::fmt;

/// An element node matched by a query.
pub type Element = NodeDataRef<ElementData>;

/// Returns every element under `node` matching the CSS `selector`, in
/// document order.
pub fn find_all(node: &NodeRef, selector: &str) -> Result<Vec<Element>> {
    node.select(selector)
        .map(|matches| matches.collect())
        .map_err(|()| Error::InvalidSelector(selector.to_owned()))
}

/// Returns the single element under `node` matching `selector`.
pub fn find_one(node: &NodeRef, selector: &str) -> Result<Element> {
    find_one_where(node, selector, |_| true)
}

/// Like [`find_one`], but only matches for which `predicate` holds are
/// counted. Used where the selector alone can't single out the node, e.g. a
/// heading identified by its text.
pub fn find_one_where<P>(node: &NodeRef, selector: &str, mut predicate: P) -> Result<Element>
where
    P: FnMut(&Element) -> bool,
{
    let mut found: Vec<Element> = find_all(node, selector)?
        .into_iter()
        .filter(|element| predicate(element))
        .collect();
    match found.len() {
        1 => Ok(found.remove(0)),
        n => Err(Error::AmbiguousOrMissingNode {
            selector: selector.to_owned(),
            found: n,
        }),
    }
}

/// The result of a fallible query.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed structural query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Returned when a query that must match exactly one node matched `found`
    /// nodes instead.
    AmbiguousOrMissingNode { selector: String, found: usize },

    /// Returned when the selector itself can't be parsed.
    InvalidSelector(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::AmbiguousOrMissingNode { selector, found: 0 } => {
                write!(f, "no node matches `{}`", selector)
            }
            Error::AmbiguousOrMissingNode { selector, found } => write!(
                f,
                "expected exactly one node matching `{}`, found {}",
                selector, found
            ),
            Error::InvalidSelector(selector) => {
                write!(f, "invalid selector `{}`", selector)
            }
        }
    }
}

impl std::error::Error for Error {}
