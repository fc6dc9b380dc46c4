use std::sync::Mutex;

/// Host router.
pub trait Navigator: Send + Sync {
    /// Path of the view the user is currently on.
    fn current_path(&self) -> String;

    /// Go to `path`. With `replace` the current history entry is overwritten.
    fn navigate(&self, path: &str, replace: bool);
}

/// History stack kept in memory, like a browser's session history.
#[derive(Debug)]
pub struct HistoryNavigator {
    entries: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(vec![initial_path.into()]),
        }
    }

    /// All history entries, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.last().cloned())
            .unwrap_or_default()
    }

    fn navigate(&self, path: &str, replace: bool) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if replace {
            entries.pop();
        }
        entries.push(path.to_string());
    }
}
