/// Keeps the first occurrence of every distinct value, in the order seen.
///
/// Only `PartialEq` is required so that `f64` pairs can be deduplicated on
/// exact value equality. The scan is quadratic, which is fine for the few
/// hundred addresses a sign-up sheet holds.
pub fn dedup<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::new();
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}
