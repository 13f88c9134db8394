use std::collections::HashMap;
use std::hash::Hash;

/// One cached query. Data from a previous fetch is kept while a refetch is in
/// flight so views can keep rendering it as placeholder data.
#[derive(Debug, Clone)]
pub struct QueryEntry<V> {
    data: Option<V>,
    error: Option<String>,
    fetching: bool,
    stale: bool,
}

impl<V> Default for QueryEntry<V> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            fetching: false,
            stale: true,
        }
    }
}

impl<V> QueryEntry<V> {
    pub fn data(&self) -> Option<&V> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.fetching && self.data.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }
}

#[derive(Debug, Clone)]
pub struct QueryCache<K, V> {
    entries: HashMap<K, QueryEntry<V>>,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &K) -> Option<&QueryEntry<V>> {
        self.entries.get(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(|entry| entry.data.as_ref())
    }

    pub fn is_loading(&self, key: &K) -> bool {
        self.entries.get(key).is_some_and(QueryEntry::is_loading)
    }

    pub fn error(&self, key: &K) -> Option<&str> {
        self.entries.get(key).and_then(|entry| entry.error.as_deref())
    }

    pub fn needs_fetch(&self, key: &K) -> bool {
        match self.entries.get(key) {
            Some(entry) => entry.stale && !entry.fetching,
            None => true,
        }
    }

    pub fn begin(&mut self, key: K) -> bool {
        let entry = self.entries.entry(key).or_default();
        if entry.fetching {
            return false;
        }
        entry.fetching = true;
        true
    }

    pub fn resolve(&mut self, key: K, result: Result<V, String>) {
        let entry = self.entries.entry(key).or_default();
        entry.fetching = false;
        entry.stale = false;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
            }
            Err(error) => entry.error = Some(error),
        }
    }

    pub fn insert(&mut self, key: K, data: V) {
        self.resolve(key, Ok(data));
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).and_then(|entry| entry.data.as_mut())
    }

    pub fn invalidate(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    pub fn invalidate_all(&mut self) -> usize {
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
        self.entries.len()
    }

    pub fn invalidate_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries.iter_mut() {
            if predicate(key) {
                entry.stale = true;
                count += 1;
            }
        }
        count
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::QueryCache;

    #[test]
    fn unknown_key_needs_fetch() {
        let cache = QueryCache::<String, u32>::new();
        assert!(cache.needs_fetch(&"a".to_string()));
        assert!(!cache.is_loading(&"a".to_string()));
    }

    #[test]
    fn begin_blocks_duplicate_fetches() {
        let mut cache = QueryCache::<&str, u32>::new();
        assert!(cache.begin("a"));
        assert!(!cache.begin("a"));
        assert!(cache.is_loading(&"a"));
        assert!(!cache.needs_fetch(&"a"));

        cache.resolve("a", Ok(7));
        assert_eq!(cache.get(&"a"), Some(&7));
        assert!(!cache.is_loading(&"a"));
        assert!(!cache.needs_fetch(&"a"));
    }

    #[test]
    fn failed_fetch_keeps_previous_data() {
        let mut cache = QueryCache::<&str, u32>::new();
        cache.insert("a", 1);
        cache.invalidate(&"a");
        assert!(cache.begin("a"));
        assert!(!cache.is_loading(&"a"));
        assert_eq!(cache.get(&"a"), Some(&1));

        cache.resolve("a", Err("boom".to_string()));
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.error(&"a"), Some("boom"));
    }

    #[test]
    fn invalidate_all_marks_every_entry_stale() {
        let mut cache = QueryCache::<&str, u32>::new();
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(!cache.needs_fetch(&"a"));

        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.needs_fetch(&"a"));
        assert!(cache.needs_fetch(&"b"));
        assert_eq!(cache.get(&"b"), Some(&2));
    }

    #[test]
    fn invalidate_where_only_touches_matching_keys() {
        let mut cache = QueryCache::<(&str, u8), u32>::new();
        cache.insert(("runs", 1), 1);
        cache.insert(("tasks", 1), 2);
        assert_eq!(cache.invalidate_where(|(kind, _)| *kind == "runs"), 1);
        assert!(cache.needs_fetch(&("runs", 1)));
        assert!(!cache.needs_fetch(&("tasks", 1)));
    }
}
