use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Run `f` over every item with at most `limit` futures outstanding.
///
/// A slot is refilled as soon as any in-flight future finishes. Results are
/// returned in completion order. Everything runs on the calling task.
pub async fn map_bounded<I, F, Fut>(items: I, limit: usize, f: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
