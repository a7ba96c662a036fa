pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}

/// Map each name to its position. Later duplicates overwrite earlier ones.
pub fn position_map<S: AsRef<str>>(names: &[S]) -> FastHashMap<Box<str>, usize> {
    let mut map = fast_hash_map_with_capacity(names.len());
    for (pos, name) in names.iter().enumerate() {
        map.insert(Box::from(name.as_ref()), pos);
    }
    map
}
