//! File tail source listener: watches a path (inode-stable), emitting
//! each completed newline-terminated line; on rotation, reopens the path.

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::model::{SourceKind, SourceSpec};

use super::{stopped, FrameSink};

#[cfg(unix)]
fn file_inode(path: &std::path::Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|m| m.ino())
}

#[cfg(not(unix))]
fn file_inode(_path: &std::path::Path) -> Option<u64> {
    None
}

pub async fn spawn(
    spec: SourceSpec,
    sink: FrameSink,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, SourceError> {
    let SourceKind::File { path } = spec.kind.clone() else {
        unreachable!("file_tail::spawn called with non-file source kind")
    };
    let path = PathBuf::from(path);

    if !path.exists() {
        return Err(SourceError::StartFailed {
            reason: format!("file tail path does not exist: {}", path.display()),
        });
    }

    Ok(tokio::spawn(run(path, sink, stop)))
}

async fn run(path: PathBuf, sink: FrameSink, stop: Arc<AtomicBool>) {
    let (tx, mut rx) = mpsc::channel::<()>(16);

    let watcher_path = path.clone();
    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx.blocking_send(());
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "file tail watcher init failed; falling back to polling");
            poll_loop(path, sink, stop).await;
            return;
        }
    };

    if let Some(dir) = watcher_path.parent() {
        if watcher.watch(dir, RecursiveMode::NonRecursive).is_err() {
            poll_loop(path, sink, stop).await;
            return;
        }
    }

    let mut inode = file_inode(&path);
    let mut reader = open_tail(&path);

    loop {
        if stopped(&stop) {
            return;
        }

        drain_ready_lines(&mut reader, &sink);

        let current_inode = file_inode(&path);
        if current_inode != inode {
            // Rotation: reopen from the start of the new file.
            inode = current_inode;
            reader = open_tail(&path);
            drain_ready_lines(&mut reader, &sink);
        }

        let _ = tokio::time::timeout(std::time::Duration::from_millis(500), rx.recv()).await;
    }
}

async fn poll_loop(path: PathBuf, sink: FrameSink, stop: Arc<AtomicBool>) {
    let mut inode = file_inode(&path);
    let mut reader = open_tail(&path);
    loop {
        if stopped(&stop) {
            return;
        }
        drain_ready_lines(&mut reader, &sink);
        let current_inode = file_inode(&path);
        if current_inode != inode {
            inode = current_inode;
            reader = open_tail(&path);
            drain_ready_lines(&mut reader, &sink);
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}

fn open_tail(path: &std::path::Path) -> Option<BufReader<std::fs::File>> {
    let mut file = std::fs::File::open(path).ok()?;
    let _ = file.seek(SeekFrom::End(0));
    Some(BufReader::new(file))
}

fn drain_ready_lines(reader: &mut Option<BufReader<std::fs::File>>, sink: &FrameSink) {
    let Some(reader) = reader else { return };
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => return, // no complete line available yet
            Ok(_) => {
                if line.ends_with('\n') {
                    let trimmed = line.trim_end_matches(['\n', '\r']);
                    if !trimmed.is_empty() {
                        sink.accept(trimmed.to_string());
                    }
                } else {
                    // Partial line at EOF: rewind so it's re-read once complete.
                    let _ = reader.seek_relative(-(line.len() as i64));
                    return;
                }
            }
            Err(_) => {
                sink.record_framing_error();
                return;
            }
        }
    }
}
