//! `Link` response header parsing
//!
//! Paginated endpoints answer with
//! `Link: <https://host/api/v1/favourites?max_id=9>; rel="next", <...>; rel="prev"`.
//! Only the query parameters of each link are kept; they become the cursor
//! merged into the following request.

use reqwest::Url;
use timeline_sync::{Cursor, CursorLinks};

pub fn parse_link_header(header: &str) -> CursorLinks {
    let mut links = CursorLinks::default();

    for part in header.split(',') {
        let mut segments = part.split(';');
        let target = match segments.next().map(str::trim) {
            Some(t) if t.starts_with('<') && t.ends_with('>') => &t[1..t.len() - 1],
            _ => continue,
        };

        let rel = segments.find_map(|s| {
            let (name, value) = s.trim().split_once('=')?;
            (name.trim() == "rel").then(|| value.trim().trim_matches('"').to_string())
        });

        let cursor = match query_cursor(target) {
            Some(cursor) => cursor,
            None => continue,
        };
        match rel.as_deref() {
            Some("next") => links.next = Some(cursor),
            Some("prev") => links.prev = Some(cursor),
            _ => {}
        }
    }

    links
}

fn query_cursor(target: &str) -> Option<Cursor> {
    let url = Url::parse(target).ok()?;
    let cursor = Cursor::new(
        url.query_pairs()
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.into_owned(), value.into_owned())),
    );
    (!cursor.is_empty()).then_some(cursor)
}
