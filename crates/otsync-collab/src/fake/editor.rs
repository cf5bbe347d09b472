use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt as _;

use crate::events::DocumentEvent;
use crate::events::FileStat;
use crate::events::FsEvent;
use crate::text_edit::TextEdit;
use crate::traits::EditorHost;

/// In-memory-ish [`EditorHost`]: filesystem operations go through a real
/// `tempfile::TempDir` so `otsync-mirror`'s disk-reconciliation code can be
/// exercised against an actual filesystem, while open editor buffers live
/// purely in memory (mirroring how an editor keeps unsaved changes off
/// disk until a save).
pub struct FakeEditorHost {
    root: TempDir,
    root_path: Utf8PathBuf,
    buffers: Mutex<HashMap<Utf8PathBuf, String>>,
    watch_tx: broadcast::Sender<FsEvent>,
    doc_tx: broadcast::Sender<DocumentEvent>,
}

impl FakeEditorHost {
    /// # Panics
    /// Panics if a temporary directory cannot be created, or if its path
    /// is not valid UTF-8.
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp workspace");
        let root_path =
            Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("temp dir path is not utf-8");
        let (watch_tx, _) = broadcast::channel(256);
        let (doc_tx, _) = broadcast::channel(256);
        Self { root, root_path, buffers: Mutex::new(HashMap::new()), watch_tx, doc_tx }
    }

    #[must_use]
    pub fn root(&self) -> &TempDir {
        &self.root
    }

    fn absolute(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_path.join(path)
        }
    }

    /// Simulate a raw filesystem notification, as if the host's own
    /// watcher had observed it.
    pub fn push_fs_event(&self, event: FsEvent) {
        let _ = self.watch_tx.send(event);
    }

    #[must_use]
    pub fn is_buffer_open(&self, path: &Utf8Path) -> bool {
        self.buffers.lock().expect("buffers mutex poisoned").contains_key(path)
    }

    pub fn open_buffer(&self, path: &Utf8Path, contents: impl Into<String>) {
        self.buffers.lock().expect("buffers mutex poisoned").insert(path.to_path_buf(), contents.into());
    }

    pub fn close_buffer(&self, path: &Utf8Path) {
        self.buffers.lock().expect("buffers mutex poisoned").remove(path);
    }

    /// Simulate the editor reporting a content change on one of its open
    /// documents.
    pub fn push_document_change(&self, path: &Utf8Path, changes: Vec<crate::events::RawTextChange>) {
        let _ = self.doc_tx.send(DocumentEvent::Changed { path: path.to_path_buf(), changes });
    }

    /// Simulate the user triggering a save of an open document.
    pub fn push_save_requested(&self, path: &Utf8Path) {
        let _ = self.doc_tx.send(DocumentEvent::SaveRequested { path: path.to_path_buf() });
    }
}

impl Default for FakeEditorHost {
    fn default() -> Self {
        Self::new()
    }
}

fn utf16_col_to_byte(line: &str, character: u32) -> usize {
    let mut utf16_count = 0u32;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= character {
            return byte_idx;
        }
        utf16_count += ch.len_utf16() as u32;
    }
    line.len()
}

fn apply_text_edit(contents: &mut String, edit: &TextEdit) {
    let lines: Vec<&str> = contents.split('\n').collect();
    let byte_offset = |line: u32, character: u32| -> usize {
        let mut offset = 0;
        for l in lines.iter().take(line as usize) {
            offset += l.len() + 1;
        }
        let line_text = lines.get(line as usize).copied().unwrap_or("");
        offset + utf16_col_to_byte(line_text, character)
    };
    let start = byte_offset(edit.range.start.line, edit.range.start.character);
    let end = byte_offset(edit.range.end.line, edit.range.end.character);
    contents.replace_range(start..end, &edit.new_text);
}

#[async_trait]
impl EditorHost for FakeEditorHost {
    fn workspace_root(&self) -> &Utf8Path {
        &self.root_path
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = FsEvent> + Send>> {
        Box::pin(BroadcastStream::new(self.watch_tx.subscribe()).filter_map(Result::ok))
    }

    async fn stat(&self, path: &Utf8Path) -> anyhow::Result<Option<FileStat>> {
        let path = self.absolute(path);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(FileStat::Directory)),
            Ok(_) => Ok(Some(FileStat::File)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_to_string(&self, path: &Utf8Path) -> anyhow::Result<String> {
        Ok(tokio::fs::read_to_string(self.absolute(path)).await?)
    }

    async fn read_dir(&self, path: &Utf8Path) -> anyhow::Result<Vec<(Utf8PathBuf, FileStat)>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(self.absolute(path)).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| anyhow::anyhow!("non-utf8 directory entry"))?;
            let rel = if path.as_str().is_empty() { Utf8PathBuf::from(name) } else { path.join(name) };
            let stat = if file_type.is_dir() { FileStat::Directory } else { FileStat::File };
            entries.push((rel, stat));
        }
        Ok(entries)
    }

    async fn write(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
        Ok(tokio::fs::write(self.absolute(path), contents).await?)
    }

    async fn create_dir(&self, path: &Utf8Path) -> anyhow::Result<()> {
        Ok(tokio::fs::create_dir_all(self.absolute(path)).await?)
    }

    async fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()> {
        Ok(tokio::fs::remove_file(self.absolute(path)).await?)
    }

    async fn remove_dir(&self, path: &Utf8Path) -> anyhow::Result<()> {
        Ok(tokio::fs::remove_dir_all(self.absolute(path)).await?)
    }

    async fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> anyhow::Result<()> {
        Ok(tokio::fs::rename(self.absolute(from), self.absolute(to)).await?)
    }

    async fn open_document(&self, path: &Utf8Path) -> anyhow::Result<()> {
        if self.is_buffer_open(path) {
            return Ok(());
        }
        let contents = self.read_to_string(path).await?;
        self.open_buffer(path, contents);
        Ok(())
    }

    async fn apply_edits(&self, path: &Utf8Path, edits: Vec<TextEdit>) -> anyhow::Result<()> {
        let mut buffers = self.buffers.lock().expect("buffers mutex poisoned");
        let contents = buffers.entry(path.to_path_buf()).or_insert_with(String::new);
        for edit in &edits {
            apply_text_edit(contents, edit);
        }
        Ok(())
    }

    async fn open_buffer_contents(&self, path: &Utf8Path) -> anyhow::Result<Option<String>> {
        Ok(self.buffers.lock().expect("buffers mutex poisoned").get(path).cloned())
    }

    fn document_events(&self) -> Pin<Box<dyn Stream<Item = DocumentEvent> + Send>> {
        Box::pin(BroadcastStream::new(self.doc_tx.subscribe()).filter_map(Result::ok))
    }
}
