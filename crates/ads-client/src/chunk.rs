//! Batch splitting for bulk write endpoints.

/// Largest batch the Advertising API accepts on bulk create/update calls.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Split `items` into consecutive batches of at most `max_size`.
///
/// Order is preserved and only the last batch may be short. A `max_size` of
/// zero is treated as one.
pub fn chunk<T>(items: impl IntoIterator<Item = T>, max_size: usize) -> Vec<Vec<T>> {
    let max_size = max_size.max(1);
    let mut batches = Vec::new();
    let mut current = Vec::with_capacity(max_size);

    for item in items {
        current.push(item);
        if current.len() == max_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(max_size)));
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
