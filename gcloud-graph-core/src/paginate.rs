//! Walks continuation tokens of a page-level API call and yields each record once.

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use crate::contract::Page;
use crate::error::ApiError;

enum Cursor {
    First,
    Next(String),
    Done,
}

/// Turns `fetch(page_token)` into a stream of records in page order.
///
/// The first call receives `None`. The stream ends after the first page whose
/// `next_page_token` is absent or empty. The first error ends the stream.
pub fn paginate<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, ApiError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    stream::try_unfold((fetch, Cursor::First), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::First => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(token).await?;
        let next = match page.next_page_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };

        let records = stream::iter(page.items.into_iter().map(Ok::<T, ApiError>));
        Ok(Some((records, (fetch, next))))
    })
    .try_flatten()
}
