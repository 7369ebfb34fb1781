//! Lazy pagination over offset and keyset list endpoints.
//!
//! A [`Pager`] drives a single-shot list operation: a function that, given
//! the decorator for the page to fetch (`None` for the first page), performs
//! one fetch and returns the items plus the response. The pagination mode is
//! detected once from the first response and never changes afterwards.
//!
//! Pages are fetched on demand: the next page is requested only once every
//! item of the current one was handed out, so dropping the pager early stops
//! all further fetching.
//!
//! A server that hands back a page number that does not move forward, or a
//! keyset cursor already followed, fails the sequence instead of fetching the
//! same page again.
//!
//! # Example
//!
//! ```no_run
//! use serde::Deserialize;
//! use tanuki::{Client, ListOptions, RequestPlan};
//!
//! #[derive(Deserialize)]
//! struct Project {
//!     id: u64,
//! }
//!
//! # async fn example() -> tanuki::Result<()> {
//! let client = Client::builder("https://gitlab.example.com").build()?;
//! let plan = RequestPlan::get("groups/{}/projects")
//!     .arg("platform")?
//!     .params(&ListOptions::per_page(100))?;
//!
//! let mut pager = client.paginate::<Project>(plan);
//! while let Some(project) = pager.next().await? {
//!     println!("{}", project.id);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use tracing::debug;

use crate::pagination::{PageCursor, PageInfo, PaginationMode};
use crate::{Error, RequestOption, Response, Result};

/// Boxed future of one page fetch.
pub type PageFuture<T> = Pin<Box<dyn Future<Output = Result<(Vec<T>, Response<Bytes>)>> + Send>>;

/// Where a [`Pager`] stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerState {
    /// No page fetched yet.
    NotStarted,
    /// More pages to fetch, starting at the cursor.
    Pending(PageCursor),
    /// The last page was fetched. Terminal.
    Exhausted,
    /// A fetch failed. Terminal.
    Failed,
}

impl PagerState {
    /// `Exhausted` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed)
    }
}

/// A lazy, forward-only sequence of items across pages.
pub struct Pager<T, F> {
    fetch: F,
    buffer: VecDeque<T>,
    state: PagerState,
    mode: Option<PaginationMode>,
    pages_fetched: u32,
    deferred: Option<Error>,
    followed: Vec<Vec<(String, String)>>,
}

impl<T, F> fmt::Debug for Pager<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("pages_fetched", &self.pages_fetched)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl<T, F, Fut> Pager<T, F>
where
    F: FnMut(Option<RequestOption>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Response<Bytes>)>>,
{
    /// Wrap a single-shot list operation.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            buffer: VecDeque::new(),
            state: PagerState::NotStarted,
            mode: None,
            pages_fetched: 0,
            deferred: None,
            followed: Vec::new(),
        }
    }

    /// The next item, fetching the next page when the current one is used up.
    ///
    /// Returns `Ok(None)` once the sequence is over, including after an error
    /// was returned.
    ///
    /// # Errors
    ///
    /// Returns the page fetch error, [`Error::InvalidUrl`] if a keyset
    /// `rel="next"` link cannot be followed, or [`Error::InvalidRequest`] if
    /// the server points back at a page already fetched. Items of the pages
    /// already fetched are handed out before the last two.
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if let Some(err) = self.deferred.take() {
                return Err(err);
            }

            let requested = match &self.state {
                PagerState::NotStarted => None,
                PagerState::Pending(cursor) => Some(cursor.clone()),
                PagerState::Exhausted | PagerState::Failed => return Ok(None),
            };
            let decorator = requested.as_ref().map(RequestOption::from_cursor);

            let (items, response) = match (self.fetch)(decorator).await {
                Ok(page) => page,
                Err(err) => {
                    self.state = PagerState::Failed;
                    return Err(err);
                }
            };
            self.pages_fetched += 1;
            debug!(page = self.pages_fetched, items = items.len(), "fetched page");
            self.buffer.extend(items);

            let info = response.page_info();
            let mode = match self.mode {
                Some(mode) => Some(mode),
                None => {
                    let detected = PaginationMode::detect(&info);
                    debug!(mode = ?detected, "detected pagination mode");
                    self.mode = detected;
                    detected
                }
            };

            self.state = match mode.map(|mode| mode.advance(&info)).transpose() {
                Ok(Some(Some(cursor))) => match self.check_progress(requested.as_ref(), &info, &cursor) {
                    Ok(()) => PagerState::Pending(cursor),
                    Err(err) => {
                        self.deferred = Some(err);
                        PagerState::Failed
                    }
                },
                Ok(_) => PagerState::Exhausted,
                Err(err) => {
                    self.deferred = Some(err);
                    PagerState::Failed
                }
            };
        }
    }

    /// Reject a next cursor that would fetch a page again.
    ///
    /// Offset pages must strictly increase; a keyset cursor is followed at
    /// most once.
    fn check_progress(
        &mut self,
        requested: Option<&PageCursor>,
        info: &PageInfo,
        next: &PageCursor,
    ) -> Result<()> {
        match next {
            PageCursor::Offset { page, .. } => {
                let current = match requested {
                    Some(PageCursor::Offset { page, .. }) => *page,
                    _ => info.current_page.unwrap_or(1),
                };
                if *page <= current {
                    return Err(Error::invalid_request(format!(
                        "pagination did not advance: next page {page} after page {current}"
                    )));
                }
            }
            PageCursor::Keyset { params } => {
                if self.followed.contains(params) {
                    return Err(Error::invalid_request(
                        "pagination did not advance: keyset cursor repeated",
                    ));
                }
                self.followed.push(params.clone());
            }
        }
        Ok(())
    }

    /// Drain the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns the first error; the items gathered so far are dropped.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Turn the pager into a [`Stream`]. An error is the stream's last item.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures_util::stream::unfold(self, |mut pager| async move {
            match pager.next().await {
                Ok(Some(item)) => Some((Ok(item), pager)),
                Ok(None) => None,
                Err(err) => Some((Err(err), pager)),
            }
        })
    }
}

impl<T, F> Pager<T, F> {
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PagerState {
        &self.state
    }

    /// Pagination mode, once the first page told.
    #[must_use]
    pub const fn mode(&self) -> Option<PaginationMode> {
        self.mode
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Where the next page starts, if there is one.
    #[must_use]
    pub const fn cursor(&self) -> Option<&PageCursor> {
        match &self.state {
            PagerState::Pending(cursor) => Some(cursor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use assert2::{check, let_assert};
    use futures_util::StreamExt;

    use super::*;

    /// Serves canned pages and records the decorator of each fetch.
    #[derive(Clone, Default)]
    struct FakeList {
        pages: Arc<Vec<Result<(Vec<u32>, Vec<(&'static str, String)>)>>>,
        calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl FakeList {
        fn new(pages: Vec<Result<(Vec<u32>, Vec<(&'static str, String)>)>>) -> Self {
            Self {
                pages: Arc::new(pages),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().expect("lock").clone()
        }

        fn pager(&self) -> Pager<u32, impl FnMut(Option<RequestOption>) -> PageFuture<u32>> {
            let fake = self.clone();
            Pager::new(move |decorator: Option<RequestOption>| {
                let fake = fake.clone();
                Box::pin(async move {
                    let index = {
                        let mut calls = fake.calls.lock().expect("lock");
                        calls.push(decorator.map(|option| format!("{option:?}")));
                        calls.len() - 1
                    };
                    match fake.pages.get(index) {
                        Some(Ok((items, headers))) => {
                            let headers: HashMap<_, _> = headers
                                .iter()
                                .map(|(name, value)| ((*name).to_string(), value.clone()))
                                .collect();
                            Ok((items.clone(), Response::new(200, headers, Bytes::new())))
                        }
                        Some(Err(_)) => Err(Error::connection("connection reset")),
                        None => panic!("unexpected fetch #{index}"),
                    }
                }) as PageFuture<u32>
            })
        }
    }

    fn next_page(page: u64) -> (&'static str, String) {
        ("x-next-page", page.to_string())
    }

    fn next_link(cursor: &str) -> (&'static str, String) {
        (
            "link",
            format!("<https://gitlab.example.com/api/v4/projects?cursor={cursor}&pagination=keyset&per_page=1>; rel=\"next\""),
        )
    }

    #[tokio::test]
    async fn offset_pages_in_order() {
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_page(2), ("x-total", "3".into())])),
            Ok((vec![2], vec![next_page(3), ("x-total", "3".into())])),
            Ok((vec![3], vec![("x-next-page", String::new()), ("x-total", "3".into())])),
        ]);

        let mut pager = fake.pager();
        let mut items = Vec::new();
        while let Some(item) = pager.next().await.expect("item") {
            items.push(item);
        }

        check!(items == vec![1, 2, 3]);
        check!(pager.mode() == Some(PaginationMode::Offset));
        check!(pager.state() == &PagerState::Exhausted);
        check!(pager.pages_fetched() == 3);
        check!(fake.calls() == vec![None, Some("Page(2)".to_string()), Some("Page(3)".to_string())]);

        // Terminal: no more fetches
        check!(pager.next().await.expect("done").is_none());
        check!(fake.calls().len() == 3);
    }

    #[tokio::test]
    async fn keyset_follows_next_link() {
        let fake = FakeList::new(vec![
            Ok((vec![1, 2], vec![next_link("abc")])),
            Ok((vec![3], vec![])),
        ]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        check!(pager.mode() == Some(PaginationMode::Keyset));
        check!(pager.cursor().and_then(PageCursor::cursor) == Some("abc"));

        let rest = pager.collect_all().await.expect("rest");
        check!(rest == vec![2, 3]);

        let calls = fake.calls();
        check!(calls.len() == 2);
        let_assert!(Some(Some(second)) = calls.get(1));
        check!(second.contains("\"cursor\", \"abc\""));
    }

    #[tokio::test]
    async fn mode_is_not_switched_mid_stream() {
        // Offset detected first; a later Link header alone does not continue the sequence
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_page(2)])),
            Ok((vec![2], vec![next_link("zzz")])),
        ]);

        let items = fake.pager().collect_all().await.expect("items");
        check!(items == vec![1, 2]);
        check!(fake.calls().len() == 2);
    }

    #[tokio::test]
    async fn single_page_without_signal() {
        let fake = FakeList::new(vec![Ok((vec![7, 8], vec![]))]);
        let mut pager = fake.pager();

        check!(pager.next().await.expect("item") == Some(7));
        check!(pager.next().await.expect("item") == Some(8));
        check!(pager.next().await.expect("end").is_none());
        check!(pager.mode().is_none());
        check!(fake.calls().len() == 1);
    }

    #[tokio::test]
    async fn stopping_early_fetches_nothing_more() {
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_page(2)])),
            Ok((vec![2], vec![next_page(3)])),
            Ok((vec![3], vec![])),
        ]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        drop(pager);

        check!(fake.calls().len() == 1);
    }

    #[tokio::test]
    async fn fetch_error_is_terminal() {
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_page(2)])),
            Err(Error::Timeout),
        ]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        let_assert!(Err(Error::Connection(_)) = pager.next().await);
        check!(pager.state() == &PagerState::Failed);
        check!(pager.next().await.expect("terminal").is_none());
        check!(fake.calls().len() == 2);
    }

    #[tokio::test]
    async fn bad_next_link_is_reported_after_buffered_items() {
        let fake = FakeList::new(vec![Ok((vec![1, 2], vec![("link", "<not a url>; rel=\"next\"".to_string())]))]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        check!(pager.next().await.expect("item") == Some(2));
        let_assert!(Err(Error::InvalidUrl(_)) = pager.next().await);
        check!(pager.next().await.expect("terminal").is_none());
    }

    #[tokio::test]
    async fn stream_ends_after_error() {
        let fake = FakeList::new(vec![
            Ok((vec![1, 2], vec![next_page(2)])),
            Err(Error::Timeout),
        ]);

        let results: Vec<_> = fake.pager().into_stream().collect().await;
        check!(results.len() == 3);
        let_assert!(Some(Err(Error::Connection(_))) = results.last());
    }

    #[tokio::test]
    async fn repeated_page_number_fails_instead_of_looping() {
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_page(2)])),
            Ok((vec![2], vec![next_page(2)])),
        ]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        check!(pager.next().await.expect("item") == Some(2));
        let_assert!(Err(Error::InvalidRequest(message)) = pager.next().await);
        check!(message.contains("did not advance"));
        check!(pager.state() == &PagerState::Failed);
        check!(pager.next().await.expect("terminal").is_none());
        check!(fake.calls().len() == 2);
    }

    #[tokio::test]
    async fn first_page_pointing_at_itself_fails() {
        let fake = FakeList::new(vec![Ok((vec![1], vec![next_page(1)]))]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(1));
        let_assert!(Err(Error::InvalidRequest(_)) = pager.next().await);
        check!(fake.calls().len() == 1);
    }

    #[tokio::test]
    async fn keyset_cursor_is_followed_once() {
        let fake = FakeList::new(vec![
            Ok((vec![1], vec![next_link("abc")])),
            Ok((vec![2], vec![next_link("def")])),
            Ok((vec![3], vec![next_link("abc")])),
        ]);

        let mut pager = fake.pager();
        let mut items = Vec::new();
        let err = loop {
            match pager.next().await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => panic!("sequence ended without an error"),
                Err(err) => break err,
            }
        };

        check!(items == vec![1, 2, 3]);
        let_assert!(Error::InvalidRequest(_) = err);
        check!(pager.state() == &PagerState::Failed);
        check!(fake.calls().len() == 3);
    }

    #[tokio::test]
    async fn empty_pages_are_skipped() {
        let fake = FakeList::new(vec![
            Ok((vec![], vec![next_page(2)])),
            Ok((vec![5], vec![])),
        ]);

        let mut pager = fake.pager();
        check!(pager.next().await.expect("item") == Some(5));
        check!(fake.calls().len() == 2);
    }
}
