//! Cursor-pagination driver for Helix endpoints.

use futures::stream::{self, Stream};
use std::future::Future;
use std::time::Duration;

/// Delay inserted between successive page fetches.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// One page of a cursor-paginated response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Drives `fetch` through a cursor-paginated endpoint, yielding pages lazily.
///
/// The sequence is finite and non-restartable: it ends when the upstream
/// reports no further cursor, or repeats the previous cursor (loop-breaker
/// against buggy upstreams). A failed fetch (`None`) ends the stream
/// silently; the fetch closure is expected to have signaled the error
/// before any page is emitted.
pub fn paged<T, F, Fut>(fetch: F) -> impl Stream<Item = Page<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Option<Page<T>>>,
{
    stream::unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let prev = match cursor {
            Cursor::Start => None,
            Cursor::Next(c) => {
                tokio::time::sleep(PAGE_DELAY).await;
                Some(c)
            }
            Cursor::Done => return None,
        };

        let page = fetch(prev.clone()).await?;

        let next = match &page.cursor {
            Some(c) if Some(c.as_str()) != prev.as_deref() => Cursor::Next(c.clone()),
            _ => Cursor::Done,
        };

        Some((page, (next, fetch)))
    })
}
