/// Splits `items` into `parts` contiguous slices whose lengths differ by at
/// most one. The first `len % parts` slices carry the extra element. Slices
/// are empty when `parts > len`.
pub fn split<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if parts == 0 {
        return Vec::new();
    }

    let base = items.len() / parts;
    let remainder = items.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for index in 0..parts {
        let size = base + usize::from(index < remainder);
        let end = start + size;
        chunks.push(items[start..end].to_vec());
        start = end;
    }
    chunks
}
