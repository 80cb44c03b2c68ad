// StrainLog - Event Storage
//
// Narrow persistence contract used by the event pipeline, a filesystem store
// rooted at the SD card mount point and an in-memory store for tests.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    Overwrite,
}

pub trait EventStore {
    fn write(&mut self, path: &str, content: &str, mode: WriteMode) -> anyhow::Result<()>;

    fn read(&mut self, path: &str) -> anyhow::Result<String>;

    fn exists(&mut self, path: &str) -> bool;

    /// Plain file names (no directories) directly inside `dir`, sorted.
    fn list(&mut self, dir: &str) -> anyhow::Result<Vec<String>>;

    fn remove(&mut self, path: &str) -> anyhow::Result<()>;

    /// One past the highest `<prefix><n>.<ext>` in `dir`, or 1 when there is
    /// none or the directory cannot be listed.
    fn next_sequence_number(&mut self, dir: &str, prefix: &str) -> u32 {
        match self.list(dir) {
            Ok(names) => {
                names
                    .iter()
                    .filter_map(|name| parse_sequence(name, prefix))
                    .max()
                    .unwrap_or(0)
                    + 1
            }
            Err(e) => {
                log::debug!("Cannot list {dir}: {e:#}");
                1
            }
        }
    }
}

/// Sequence number in a name like `event 12.txt`.
pub fn parse_sequence(name: &str, prefix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let (number, _ext) = rest.split_once('.')?;
    number.trim().parse().ok()
}

pub fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

pub fn event_path(dir: &str, prefix: &str, sequence: u32) -> String {
    join(dir, &format!("{prefix}{sequence}.txt"))
}

/// Event files in `dir`, ordered by sequence number.
pub fn event_files<S: EventStore + ?Sized>(
    store: &mut S,
    dir: &str,
    prefix: &str,
) -> anyhow::Result<Vec<String>> {
    let mut names: Vec<(u32, String)> = store
        .list(dir)?
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| (parse_sequence(&name, prefix).unwrap_or(0), name))
        .collect();
    names.sort();
    Ok(names.into_iter().map(|(_, name)| name).collect())
}

/// Print every stored event to `out`. Returns how many were shown.
pub fn playback_events<S, W>(
    store: &mut S,
    dir: &str,
    prefix: &str,
    out: &mut W,
) -> anyhow::Result<usize>
where
    S: EventStore + ?Sized,
    W: Write,
{
    writeln!(out, "\n======================================")?;
    writeln!(out, "      PREVIOUS EVENTS PLAYBACK")?;
    writeln!(out, "======================================\n")?;

    if !store.exists(dir) {
        writeln!(out, "No events directory found. No previous events.\n")?;
        return Ok(0);
    }

    let names = event_files(store, dir, prefix)?;
    for name in &names {
        writeln!(out, "--------------------------------------")?;
        writeln!(out, "Reading: {name}")?;
        writeln!(out, "--------------------------------------")?;
        match store.read(&join(dir, name)) {
            Ok(content) => writeln!(out, "{content}")?,
            Err(e) => {
                log::warn!("Failed to read {name}: {e:#}");
                writeln!(out, "(unreadable)")?;
            }
        }
    }

    if names.is_empty() {
        writeln!(out, "No previous events found.\n")?;
    }
    writeln!(out, "======================================")?;
    writeln!(out, "      END OF PLAYBACK")?;
    writeln!(out, "======================================")?;
    Ok(names.len())
}

/// Delete every file in `dir`. Returns how many were removed.
pub fn clear_events<S: EventStore + ?Sized>(store: &mut S, dir: &str) -> anyhow::Result<usize> {
    if !store.exists(dir) {
        log::info!("No events directory found");
        return Ok(0);
    }
    let mut removed = 0;
    for name in store.list(dir)? {
        let path = join(dir, &name);
        match store.remove(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to delete {path}: {e:#}"),
        }
    }
    log::info!("Deleted {removed} event file(s)");
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Filesystem store (FAT on the SD card, or any directory on the host)
// ---------------------------------------------------------------------------

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl EventStore for FsStore {
    fn write(&mut self, path: &str, content: &str, mode: WriteMode) -> anyhow::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut file = match mode {
            WriteMode::Append => OpenOptions::new().create(true).append(true).open(&full),
            WriteMode::Overwrite => OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&full),
        }
        .with_context(|| format!("opening {}", full.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("writing {}", full.display()))?;
        file.flush()?;
        Ok(())
    }

    fn read(&mut self, path: &str) -> anyhow::Result<String> {
        let full = self.resolve(path);
        fs::read_to_string(&full).with_context(|| format!("reading {}", full.display()))
    }

    fn exists(&mut self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn list(&mut self, dir: &str) -> anyhow::Result<Vec<String>> {
        let full = self.resolve(dir);
        let mut names = Vec::new();
        for entry in fs::read_dir(&full).with_context(|| format!("listing {}", full.display()))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove(&mut self, path: &str) -> anyhow::Result<()> {
        let full = self.resolve(path);
        fs::remove_file(&full).with_context(|| format!("deleting {}", full.display()))
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a full or missing card would.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    fn dir_prefix(dir: &str) -> String {
        format!("{}/", dir.trim_end_matches('/'))
    }
}

impl EventStore for MemoryStore {
    fn write(&mut self, path: &str, content: &str, mode: WriteMode) -> anyhow::Result<()> {
        if self.fail_writes {
            bail!("write to {path} failed");
        }
        let entry = self.files.entry(path.to_string()).or_default();
        if mode == WriteMode::Overwrite {
            entry.clear();
        }
        entry.push_str(content);
        Ok(())
    }

    fn read(&mut self, path: &str) -> anyhow::Result<String> {
        match self.files.get(path) {
            Some(content) => Ok(content.clone()),
            None => bail!("{path} not found"),
        }
    }

    fn exists(&mut self, path: &str) -> bool {
        let prefix = Self::dir_prefix(path);
        self.files.contains_key(path) || self.files.keys().any(|k| k.starts_with(&prefix))
    }

    fn list(&mut self, dir: &str) -> anyhow::Result<Vec<String>> {
        let prefix = Self::dir_prefix(dir);
        Ok(self
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn remove(&mut self, path: &str) -> anyhow::Result<()> {
        match self.files.remove(path) {
            Some(_) => Ok(()),
            None => bail!("{path} not found"),
        }
    }
}
