//! # Property Source
//!
//! A named key/value store backed by a `.properties` file and reloaded lazily
//! when the file changes on disk.
//!
//! ## Staleness
//!
//! Every accessor first asks [`PropertySource::is_stale`]. The check is rate
//! limited by the source's interval: inside the interval no filesystem call is
//! made at all. Past it, the file's modification time is compared with the one
//! recorded for the current snapshot. An interval of zero stats on every access.
//!
//! ## Concurrency
//!
//! Readers load the current snapshot through an [`ArcSwap`] and never block on a
//! reload. Reloads are serialized by a mutex and install a complete new snapshot
//! atomically, which also discards the list/set memo of the old one.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use serde_json::Value;

/// One immutable load of a property file.
#[derive(Debug)]
pub struct PropertySnapshot {
    values: HashMap<String, String>,
    modified: Option<SystemTime>,
    lists: Mutex<HashMap<String, Arc<Vec<String>>>>,
    sets: Mutex<HashMap<String, Arc<BTreeSet<String>>>>,
    json: OnceLock<Value>,
}

impl PropertySnapshot {
    fn new(values: HashMap<String, String>, modified: Option<SystemTime>) -> Self {
        Self {
            values,
            modified,
            lists: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            json: OnceLock::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Modification time of the file this snapshot was read from.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Values bound to `key.0`, `key.1`, ... up to the first missing index.
    pub fn list(&self, key: &str) -> Arc<Vec<String>> {
        let mut lists = lock(&self.lists);
        if let Some(list) = lists.get(key) {
            return Arc::clone(list);
        }
        let list = Arc::new(self.numbered_values(key).collect::<Vec<_>>());
        lists.insert(key.to_string(), Arc::clone(&list));
        list
    }

    /// Distinct values under the same numbered-key convention as [`Self::list`].
    pub fn set(&self, key: &str) -> Arc<BTreeSet<String>> {
        let mut sets = lock(&self.sets);
        if let Some(set) = sets.get(key) {
            return Arc::clone(set);
        }
        let set = Arc::new(self.numbered_values(key).collect::<BTreeSet<_>>());
        sets.insert(key.to_string(), Arc::clone(&set));
        set
    }

    /// The snapshot as a flat JSON object, built at most once.
    pub fn as_value(&self) -> &Value {
        self.json.get_or_init(|| {
            Value::Object(
                self.values
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )
        })
    }

    fn numbered_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = String> + 'a {
        (0usize..)
            .map_while(move |i| self.values.get(&format!("{key}.{i}")))
            .cloned()
    }
}

/// A hot-reloadable property file exposed to templates as a namespace.
#[derive(Debug)]
pub struct PropertySource {
    name: String,
    path: PathBuf,
    check_interval: Duration,
    snapshot: ArcSwap<PropertySnapshot>,
    last_check: Mutex<Instant>,
    reload_lock: Mutex<()>,
}

impl PropertySource {
    /// Open a property source. The initial load must succeed.
    pub fn open(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        check_interval: Duration,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let path = path.into();
        let snapshot = read_snapshot(&path)?;

        tracing::debug!(
            source = %name,
            ?path,
            keys = snapshot.len(),
            interval_ms = check_interval.as_millis() as u64,
            "Property source loaded"
        );

        Ok(Self {
            name,
            path,
            check_interval,
            snapshot: ArcSwap::from_pointee(snapshot),
            last_check: Mutex::new(Instant::now()),
            reload_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.snapshot().get(key).map(str::to_string)
    }

    pub fn get_list(&self, key: &str) -> Arc<Vec<String>> {
        self.snapshot().list(key)
    }

    pub fn get_set(&self, key: &str) -> Arc<BTreeSet<String>> {
        self.snapshot().set(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshot().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Current snapshot, reloading first if the file is stale.
    pub fn snapshot(&self) -> Arc<PropertySnapshot> {
        if self.is_stale() {
            self.reload();
        }
        self.snapshot.load_full()
    }

    /// Whether the backing file is newer than the current snapshot.
    ///
    /// Returns `false` without touching the filesystem while the check interval
    /// has not elapsed since the previous check.
    pub fn is_stale(&self) -> bool {
        {
            let mut last_check = lock(&self.last_check);
            let now = Instant::now();
            if now.duration_since(*last_check) < self.check_interval {
                return false;
            }
            *last_check = now;
        }

        match file_modified(&self.path) {
            Ok(on_disk) => self
                .snapshot
                .load()
                .modified
                .map_or(true, |loaded| on_disk > loaded),
            Err(e) => {
                tracing::debug!(
                    source = %self.name,
                    path = ?self.path,
                    error = %e,
                    "Property file not accessible, keeping last snapshot"
                );
                false
            }
        }
    }

    /// Re-read the backing file and install it as the current snapshot.
    ///
    /// Fails soft: when the file cannot be read the previous snapshot stays in
    /// place and a warning is logged.
    pub fn reload(&self) {
        let _guard = lock(&self.reload_lock);

        match read_snapshot(&self.path) {
            Ok(snapshot) => {
                tracing::debug!(
                    source = %self.name,
                    path = ?self.path,
                    keys = snapshot.len(),
                    "Property source reloaded"
                );
                self.snapshot.store(Arc::new(snapshot));
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.name,
                    path = ?self.path,
                    error = %e,
                    "Failed to reload property file, serving previous snapshot"
                );
            }
        }
    }
}

fn read_snapshot(path: &Path) -> std::io::Result<PropertySnapshot> {
    let modified = file_modified(path).ok();
    let contents = std::fs::read_to_string(path)?;
    Ok(PropertySnapshot::new(parse_properties(&contents), modified))
}

fn file_modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Parse Java-style properties text.
///
/// Follows `java.util.Properties` rules: `#` and `!` comment lines, a key ending
/// at the first unescaped `=`, `:` or whitespace, line continuation on an odd
/// number of trailing backslashes, and `\t`, `\n`, `\r`, `\f`, `\uXXXX`
/// escapes. Any other escaped character stands for itself. Later keys override
/// earlier ones.
pub fn parse_properties(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut lines = contents.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim_start_matches(is_blank);
        if line.is_empty() || line.starts_with(['#', '!']) {
            continue;
        }

        let mut logical = line.to_string();
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        values.insert(unescape(key), unescape(value));
    }

    values
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// An odd run of trailing backslashes escapes the line break.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                let value = line[idx + 1..].trim_start_matches(is_blank);
                return (&line[..idx], value);
            }
            c if is_blank(c) => {
                let rest = line[idx..].trim_start_matches(is_blank);
                let value = rest
                    .strip_prefix(['=', ':'])
                    .map_or(rest, |v| v.trim_start_matches(is_blank));
                return (&line[..idx], value);
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }

    // UTF-16 units so `\uXXXX` surrogate pairs combine.
    let mut units: Vec<u16> = Vec::with_capacity(text.len());
    let mut buf = [0u16; 2];
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next() {
                Some('t') => '\t',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('f') => '\x0c',
                Some('u') => {
                    let hex: String = chars.clone().take(4).collect();
                    let well_formed = hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit());
                    match u16::from_str_radix(&hex, 16) {
                        Ok(unit) if well_formed => {
                            chars.nth(3);
                            units.push(unit);
                            continue;
                        }
                        _ => 'u',
                    }
                }
                Some(other) => other,
                None => break,
            }
        } else {
            c
        };
        units.extend_from_slice(decoded.encode_utf16(&mut buf));
    }
    String::from_utf16_lossy(&units)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
