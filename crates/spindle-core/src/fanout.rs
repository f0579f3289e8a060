//! Order-preserving concurrent map.

use std::future::Future;

use crate::error::FanoutError;

/// Run `f` on every item concurrently; results come back in input order.
///
/// Each item gets its own task, and the result is written into the slot of
/// its own index, so no two tasks share an output location.
pub async fn parallel_map<I, T, R, F, Fut>(items: I, f: F) -> Result<Vec<R>, FanoutError>
where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(f(item)))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter().enumerate();
    while let Some((index, handle)) = pending.next() {
        match handle.await {
            Ok(value) => results.push(value),
            Err(e) => {
                tracing::error!(index, error = %e, "parallel_map task failed");
                // nobody will collect the rest
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(FanoutError::TaskPanicked { index });
            }
        }
    }
    Ok(results)
}
