//! Lazy traversal of marker-paginated provider listings.

use crate::EngineError;
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// One page of a listing. A `None` marker means there are no further pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Streams every item of a paginated listing, fetching pages only as they are consumed.
///
/// `fetch` receives `None` for the first page and the previous page's marker afterwards.
pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = Result<T, EngineError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, EngineError>>,
{
    stream::try_unfold(Cursor::Start, move |cursor| {
        let request = match cursor {
            Cursor::Start => Some(fetch(None)),
            Cursor::Next(marker) => Some(fetch(Some(marker))),
            Cursor::Done => None,
        };
        async move {
            let Some(request) = request else {
                return Ok::<_, EngineError>(None);
            };
            let page = request.await?;
            let next = match page.marker {
                Some(marker) if !marker.is_empty() => Cursor::Next(marker),
                _ => Cursor::Done,
            };
            Ok(Some((page.items, next)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, EngineError>)))
    .try_flatten()
}

/// Drains a listing into memory.
pub async fn collect_all<T, S>(items: S) -> Result<Vec<T>, EngineError>
where
    S: Stream<Item = Result<T, EngineError>>,
{
    items.try_collect().await
}
