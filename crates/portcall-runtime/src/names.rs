//! Broadcast port names.
//!
//! Each call-site (task debug name) gets its own counter, so names read
//! like `watch_prices#0`, `watch_prices#1`, ... and stay unique for the
//! lifetime of the registry.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::sync::lock;

#[derive(Default)]
pub struct PortNameRegistry {
    counters: Mutex<HashMap<String, u64>>,
}

impl PortNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique name for `debug_name`.
    pub fn next(&self, debug_name: &str) -> String {
        let mut counters = lock(&self.counters);
        let n = counters.entry(debug_name.to_string()).or_insert(0);
        let name = format!("{}#{}", debug_name, n);
        *n += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_names_scoped_per_call_site() {
        let names = PortNameRegistry::new();
        assert_eq!(names.next("ticks"), "ticks#0");
        assert_eq!(names.next("ticks"), "ticks#1");
        assert_eq!(names.next("logs"), "logs#0");
        assert_eq!(names.next("ticks"), "ticks#2");
    }

    #[test]
    fn test_names_unique_across_threads() {
        let names = Arc::new(PortNameRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let names = Arc::clone(&names);
                thread::spawn(move || (0..50).map(|_| names.next("s")).collect::<Vec<_>>())
            })
            .collect();
        let all: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 200);
    }
}
