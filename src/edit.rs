//! The mutations applied by the rewrite engine ([`crate::rewrite`]). Each one
//! finds nodes with [`crate::query`] and edits their attributes, text or
//! children in place. None of them do any I/O.

use crate::article::{display_date, DATE_FORMAT};
use crate::html;
use crate::query::{find_all, find_one, find_one_where, Result};
use chrono::NaiveDate;
use kuchikiki::NodeRef;

/// Selects the page header whose class picks the header style.
pub const HEADER_SELECTOR: &str = "header";

/// Selects every date marker on a page.
pub const DATE_MARKER_SELECTOR: &str = "time[datetime]";

/// Selects candidates for the index page's insertion anchor.
pub const ANCHOR_SELECTOR: &str = "h2";

/// The text of the heading new cards are inserted after.
pub const ANCHOR_TEXT: &str = "Articles";

/// Moves every date marker under `node` whose `datetime` is `old` to `new`:
/// the attribute gets the new ISO date and the text the display form (see
/// [`display_date`]). When `old == new` the markers are left alone, so
/// hand-written text like "March 1st" survives. Returns the number of markers
/// matched; zero is not an error.
pub fn rewrite_dates(node: &NodeRef, old: NaiveDate, new: NaiveDate) -> Result<usize> {
    let moved = old != new;
    let old = old.format(DATE_FORMAT).to_string();
    let mut rewritten = 0;
    for time in find_all(node, DATE_MARKER_SELECTOR)? {
        if time.attributes.borrow().get("datetime").map(str::trim) != Some(old.as_str()) {
            continue;
        }
        rewritten += 1;
        if !moved {
            continue;
        }
        time.attributes
            .borrow_mut()
            .insert("datetime", new.format(DATE_FORMAT).to_string());
        replace_text(time.as_node(), display_date(new));
    }
    Ok(rewritten)
}

/// Replaces the `class` attribute of the page's single `header` element with
/// `class`.
pub fn set_header_class(document: &NodeRef, class: &str) -> Result<()> {
    let header = find_one(document, HEADER_SELECTOR)?;
    header
        .attributes
        .borrow_mut()
        .insert("class", class.to_owned());
    Ok(())
}

/// Inserts the `card` fragment right after the index page's "Articles"
/// heading, so the newest card always comes first. The card is indented to
/// the heading's level and followed by a line break, which leaves a blank line
/// between it and the next card.
pub fn insert_card(document: &NodeRef, card: &str) -> Result<()> {
    let heading = find_one_where(document, ANCHOR_SELECTOR, |heading| {
        heading.text_contents().trim() == ANCHOR_TEXT
    })?;
    let heading = heading.as_node();
    let indent = html::indentation_of(heading);

    let mut nodes = vec![NodeRef::new_text(format!("\n{}", indent))];
    nodes.extend(html::parse_fragment(&html::indent(card.trim(), &indent)));
    nodes.push(NodeRef::new_text("\n"));

    for node in nodes.into_iter().rev() {
        heading.insert_after(node);
    }
    Ok(())
}

/// Points every index card linking to `old_url` at `new_url` and moves the
/// card's date markers from `old` to `new`. A card is the `article` element
/// around the link. Returns the number of cards updated; an article that was
/// never indexed simply has none.
pub fn relink_card(
    document: &NodeRef,
    old_url: &str,
    new_url: &str,
    old: NaiveDate,
    new: NaiveDate,
) -> Result<usize> {
    let mut relinked = 0;
    for link in find_all(document, "article a[href]")? {
        if link.attributes.borrow().get("href") != Some(old_url) {
            continue;
        }
        link.attributes
            .borrow_mut()
            .insert("href", new_url.to_owned());
        let card = link.as_node().ancestors().find(|node| {
            node.as_element()
                .map(|element| &*element.name.local == "article")
                .unwrap_or(false)
        });
        if let Some(card) = card {
            rewrite_dates(&card, old, new)?;
        }
        relinked += 1;
    }
    Ok(relinked)
}

fn replace_text(node: &NodeRef, text: String) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        child.detach();
    }
    node.append(NodeRef::new_text(text));
}
