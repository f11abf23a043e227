//! The library code for the `bbblog` blog manager. A blog is a directory of
//! hand-written HTML files; there is no source format and no build step, so
//! every command works directly on the published HTML:
//!
//! 1. Reading article metadata out of HTML files ([`crate::article`])
//! 2. Rewriting HTML files in place ([`crate::rewrite`] and [`crate::edit`])
//! 3. Rendering new markup from templates ([`crate::render`]) and the Atom
//!    feed ([`crate::feed`])
//!
//! The rewrite path is the interesting one. A rewrite is a transaction: the
//! file is parsed into a mutable tree, a mutation callback edits the tree, and
//! the tree is serialized, optionally formatted by an external program, and
//! only then written back. Anything that fails before the write leaves the file
//! exactly as it was.
//!
//! [`crate::blog`] stitches these pieces together into the commands exposed by
//! the `bbblog` binary.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod blog;
pub mod config;
pub mod edit;
pub mod feed;
pub mod format;
pub mod header;
pub mod html;
pub mod query;
pub mod render;
pub mod rewrite;
mod util;
