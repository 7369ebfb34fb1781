//! Pagination wire model.
//!
//! The REST API paginates lists in one of two ways:
//!
//! - **Offset**: the request carries `page` and `per_page`; the response
//!   names the next page in `X-Next-Page` (empty or missing on the last page).
//! - **Keyset**: the request carries `pagination=keyset`, `per_page`,
//!   `order_by` and `sort`; the response carries a `Link` header whose
//!   `rel="next"` URL holds an opaque `cursor` (missing on the last page).
//!
//! [`PaginationMode`] classifies a first response, then computes the next
//! [`PageCursor`] from each following response.

use serde::Serialize;
use url::Url;

use crate::Result;

/// Header carrying the total number of items.
pub const TOTAL_HEADER: &str = "x-total";
/// Header carrying the total number of pages.
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";
/// Header carrying the page size.
pub const PER_PAGE_HEADER: &str = "x-per-page";
/// Header carrying the current page number.
pub const PAGE_HEADER: &str = "x-page";
/// Header carrying the next page number.
pub const NEXT_PAGE_HEADER: &str = "x-next-page";
/// Header carrying the previous page number.
pub const PREV_PAGE_HEADER: &str = "x-prev-page";
/// RFC 8288 `Link` header.
pub const LINK_HEADER: &str = "link";

/// Relations found in a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    /// `rel="next"` target.
    pub next: Option<String>,
    /// `rel="prev"` target.
    pub prev: Option<String>,
    /// `rel="first"` target.
    pub first: Option<String>,
    /// `rel="last"` target.
    pub last: Option<String>,
}

impl Links {
    /// Parse a `Link` header value such as
    /// `<https://host/api/v4/projects?cursor=abc>; rel="next", <...>; rel="first"`.
    ///
    /// Entries without a `<target>` or a known `rel` are ignored.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut links = Self::default();

        for entry in header.split(',') {
            let mut params = entry.split(';');
            let Some(target) = params
                .next()
                .map(str::trim)
                .and_then(|t| t.strip_prefix('<'))
                .and_then(|t| t.strip_suffix('>'))
            else {
                continue;
            };

            for param in params {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                for rel in value.trim().trim_matches('"').split_whitespace() {
                    let slot = match rel {
                        "next" => &mut links.next,
                        "prev" => &mut links.prev,
                        "first" => &mut links.first,
                        "last" => &mut links.last,
                        _ => continue,
                    };
                    *slot = Some(target.to_string());
                }
            }
        }

        links
    }
}

/// Pagination metadata read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// `X-Total`.
    pub total_items: Option<u64>,
    /// `X-Total-Pages`.
    pub total_pages: Option<u64>,
    /// `X-Per-Page`.
    pub per_page: Option<u64>,
    /// `X-Page`.
    pub current_page: Option<u64>,
    /// `X-Next-Page`.
    pub next_page: Option<u64>,
    /// `X-Prev-Page`.
    pub prev_page: Option<u64>,
    /// `Link` relations.
    pub links: Links,
}

impl PageInfo {
    /// Read pagination headers through a (case-insensitive) header lookup.
    ///
    /// Empty or non-numeric values count as absent.
    #[must_use]
    pub fn from_headers<'a>(header: impl Fn(&str) -> Option<&'a str>) -> Self {
        let number = |name: &str| {
            header(name)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .and_then(|value| value.parse::<u64>().ok())
        };

        Self {
            total_items: number(TOTAL_HEADER),
            total_pages: number(TOTAL_PAGES_HEADER),
            per_page: number(PER_PAGE_HEADER),
            current_page: number(PAGE_HEADER),
            next_page: number(NEXT_PAGE_HEADER),
            prev_page: number(PREV_PAGE_HEADER),
            links: header(LINK_HEADER).map(Links::parse).unwrap_or_default(),
        }
    }
}

/// The pagination protocol an endpoint answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationMode {
    /// Page-number pagination driven by `X-Next-Page`.
    Offset,
    /// Cursor pagination driven by the `Link` `rel="next"` URL.
    Keyset,
}

impl PaginationMode {
    /// Classify a first page.
    ///
    /// A next-page number means offset pagination; otherwise a `rel="next"`
    /// link means keyset pagination. Offset answers may carry `Link` headers
    /// as well, so the page number is checked first. `None` means the first
    /// page is also the last one.
    #[must_use]
    pub fn detect(info: &PageInfo) -> Option<Self> {
        if info.next_page.is_some() {
            Some(Self::Offset)
        } else if info.links.next.is_some() {
            Some(Self::Keyset)
        } else {
            None
        }
    }

    /// Compute where the next page starts, reading only this mode's signal.
    ///
    /// Returns `Ok(None)` once the exhaustion signal is reached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if a keyset
    /// `rel="next"` target is not a valid URL.
    pub fn advance(self, info: &PageInfo) -> Result<Option<PageCursor>> {
        match self {
            Self::Offset => Ok(info.next_page.map(|page| PageCursor::Offset {
                page,
                per_page: info.per_page,
                total: info.total_items,
            })),
            Self::Keyset => info
                .links
                .next
                .as_deref()
                .map(PageCursor::from_next_link)
                .transpose(),
        }
    }
}

/// Where the next page request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Offset pagination state.
    Offset {
        /// Next page number.
        page: u64,
        /// Page size, if the server reported it.
        per_page: Option<u64>,
        /// Total item count, if the server reported it.
        total: Option<u64>,
    },
    /// Keyset pagination state.
    Keyset {
        /// Every query parameter of the `rel="next"` URL, verbatim.
        params: Vec<(String, String)>,
    },
}

impl PageCursor {
    /// Build a keyset cursor from a `rel="next"` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the link is
    /// not an absolute URL.
    pub fn from_next_link(link: &str) -> Result<Self> {
        let url = Url::parse(link)?;
        Ok(Self::Keyset {
            params: url.query_pairs().into_owned().collect(),
        })
    }

    /// The opaque keyset cursor, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        match self {
            Self::Keyset { params } => params
                .iter()
                .find(|(name, _)| name == "cursor")
                .map(|(_, value)| value.as_str()),
            Self::Offset { .. } => None,
        }
    }

    /// The pagination mode this cursor belongs to.
    #[must_use]
    pub const fn mode(&self) -> PaginationMode {
        match self {
            Self::Offset { .. } => PaginationMode::Offset,
            Self::Keyset { .. } => PaginationMode::Keyset,
        }
    }
}

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Common list options, meant to be `#[serde(flatten)]`-ed into endpoint options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOptions {
    /// Page number (offset pagination).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    /// `keyset` to request keyset pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    /// Ordering field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Ordering direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl ListOptions {
    /// Offset pagination with a page size.
    #[must_use]
    pub fn per_page(per_page: u64) -> Self {
        Self {
            per_page: Some(per_page),
            ..Self::default()
        }
    }

    /// Keyset pagination ordered by `order_by`.
    #[must_use]
    pub fn keyset(order_by: impl Into<String>, sort: Sort, per_page: u64) -> Self {
        Self {
            per_page: Some(per_page),
            pagination: Some("keyset".to_string()),
            order_by: Some(order_by.into()),
            sort: Some(sort),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::{check, let_assert};

    use super::*;

    fn info(headers: &[(&str, &str)]) -> PageInfo {
        let headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PageInfo::from_headers(|name| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    #[test]
    fn parses_link_header_relations() {
        let links = Links::parse(
            r#"<https://gitlab.example.com/api/v4/projects?cursor=abc&per_page=2>; rel="next", <https://gitlab.example.com/api/v4/projects?per_page=2>; rel="first""#,
        );

        check!(links.next.as_deref() == Some("https://gitlab.example.com/api/v4/projects?cursor=abc&per_page=2"));
        check!(links.first.as_deref() == Some("https://gitlab.example.com/api/v4/projects?per_page=2"));
        check!(links.prev.is_none());
        check!(links.last.is_none());
    }

    #[test]
    fn ignores_malformed_link_entries() {
        let links = Links::parse(r#"garbage, <https://x/y>; title="no rel", <https://x/z>; rel=last"#);
        check!(links.next.is_none());
        check!(links.last.as_deref() == Some("https://x/z"));
    }

    #[test]
    fn reads_offset_headers() {
        let info = info(&[
            ("X-Total", "30"),
            ("X-Total-Pages", "3"),
            ("X-Per-Page", "10"),
            ("X-Page", "1"),
            ("X-Next-Page", "2"),
            ("X-Prev-Page", ""),
        ]);

        check!(info.total_items == Some(30));
        check!(info.total_pages == Some(3));
        check!(info.per_page == Some(10));
        check!(info.current_page == Some(1));
        check!(info.next_page == Some(2));
        check!(info.prev_page.is_none());
    }

    #[test]
    fn detects_mode_from_first_page() {
        check!(PaginationMode::detect(&info(&[("X-Next-Page", "2")])) == Some(PaginationMode::Offset));
        check!(
            PaginationMode::detect(&info(&[("Link", r#"<https://x/y?cursor=c>; rel="next""#)]))
                == Some(PaginationMode::Keyset)
        );
        check!(PaginationMode::detect(&info(&[("X-Next-Page", "")])).is_none());
        check!(PaginationMode::detect(&PageInfo::default()).is_none());
    }

    #[test]
    fn offset_wins_when_both_signals_are_present() {
        let info = info(&[
            ("X-Next-Page", "2"),
            ("Link", r#"<https://x/y?page=2>; rel="next""#),
        ]);
        check!(PaginationMode::detect(&info) == Some(PaginationMode::Offset));
    }

    #[test]
    fn offset_advance_reads_only_next_page() {
        let next = PaginationMode::Offset
            .advance(&info(&[("X-Next-Page", "3"), ("X-Per-Page", "20"), ("X-Total", "41")]))
            .expect("advance");
        check!(next == Some(PageCursor::Offset { page: 3, per_page: Some(20), total: Some(41) }));

        // A keyset link does not keep an offset stream going
        let next = PaginationMode::Offset
            .advance(&info(&[("Link", r#"<https://x/y?cursor=c>; rel="next""#)]))
            .expect("advance");
        check!(next.is_none());
    }

    #[test]
    fn keyset_advance_keeps_cursor_verbatim() {
        let next = PaginationMode::Keyset
            .advance(&info(&[(
                "Link",
                r#"<https://gitlab.example.com/api/v4/projects?cursor=eyJpZCI6IjQyIn0%3D&order_by=id&pagination=keyset&per_page=2&sort=asc>; rel="next""#,
            )]))
            .expect("advance");

        let_assert!(Some(cursor) = next);
        check!(cursor.mode() == PaginationMode::Keyset);
        check!(cursor.cursor() == Some("eyJpZCI6IjQyIn0="));
        let_assert!(PageCursor::Keyset { params } = cursor);
        check!(params.len() == 5);

        let next = PaginationMode::Keyset.advance(&info(&[("X-Next-Page", "2")])).expect("advance");
        check!(next.is_none());
    }

    #[test]
    fn keyset_advance_rejects_relative_link() {
        let result = PaginationMode::Keyset.advance(&info(&[("Link", r#"</projects?cursor=c>; rel="next""#)]));
        check!(result.is_err());
    }

    #[test]
    fn list_options_serialize_for_keyset() {
        let query = crate::to_query_string(&ListOptions::keyset("id", Sort::Asc, 50)).expect("serialize");
        check!(query == "per_page=50&pagination=keyset&order_by=id&sort=asc");
    }
}
