//! `sftp` and `sync`: one-shot upload of built output.
//!
//! Both tasks hand an [`Upload`] to the context's [`Transport`]. The real
//! transport drives the system `sftp` client in batch mode, feeding it a
//! generated script on stdin: `-mkdir` for every directory (the `-` prefix
//! tolerates existing ones) followed by a `put` for every file. A client
//! that cannot be started is [`TransferError::Spawn`]; a client that exits
//! non-zero is [`TransferError::Failed`] carrying its stderr. There is no
//! retry, resume or verification; any failure fails the task.

use super::{TaskError, TaskSummary};
use crate::runner::BuildContext;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Local directory {0} does not exist")]
    MissingSource(PathBuf),
    #[error("Cannot start '{client}': {source}")]
    Spawn {
        client: String,
        #[source]
        source: io::Error,
    },
    #[error("'{client}' exited with {status}: {stderr}")]
    Failed {
        client: String,
        status: String,
        stderr: String,
    },
    #[error("{path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// One directory tree to copy to the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub local: PathBuf,
    pub remote: String,
}

impl Upload {
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.remote)
    }
}

pub trait Transport: Send + Sync {
    /// Copy `upload.local` to `upload.remote`; returns the number of files sent.
    fn upload(&self, upload: &Upload) -> Result<usize, TransferError>;
}

/// Uploads through an `sftp`-compatible client in batch mode.
#[derive(Debug, Clone)]
pub struct SftpClient {
    pub program: String,
}

impl SftpClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transport for SftpClient {
    fn upload(&self, upload: &Upload) -> Result<usize, TransferError> {
        let (script, files) = batch_script(&upload.local, &upload.remote)?;
        let spawn_err = |source| TransferError::Spawn {
            client: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(["-b", "-", "-P"])
            .arg(upload.port.to_string())
            .args(["-o", "BatchMode=yes"])
            .arg(format!("{}@{}", upload.user, upload.host))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // A client that quits early closes the pipe; its exit status and
        // stderr carry the real cause.
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(script.as_bytes())
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(spawn_err(e));
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        if !output.status.success() {
            return Err(TransferError::Failed {
                client: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(files)
    }
}

fn quote(path: &str) -> String {
    format!("\"{}\"", path.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Batch commands copying `local` to `remote`, and the file count.
pub fn batch_script(local: &Path, remote: &str) -> Result<(String, usize), TransferError> {
    if !local.is_dir() {
        return Err(TransferError::MissingSource(local.to_path_buf()));
    }
    let remote = remote.trim_end_matches('/');
    let mut script = format!("-mkdir {}\n", quote(remote));
    let mut files = 0;

    for entry in WalkDir::new(local).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| TransferError::Walk {
            path: local.to_path_buf(),
            source,
        })?;
        let rel = entry
            .path()
            .strip_prefix(local)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let target = format!("{remote}/{rel}");
        if entry.file_type().is_dir() {
            script.push_str(&format!("-mkdir {}\n", quote(&target)));
        } else if entry.file_type().is_file() {
            script.push_str(&format!(
                "put {} {}\n",
                quote(&entry.path().to_string_lossy()),
                quote(&target)
            ));
            files += 1;
        }
    }
    Ok((script, files))
}

fn upload(ctx: &BuildContext, local: PathBuf, remote: &str) -> Result<TaskSummary, TaskError> {
    let remote_cfg = &ctx.config.project.remote;
    let upload = Upload {
        host: remote_cfg.host.clone(),
        port: remote_cfg.port,
        user: ctx.config.user.clone(),
        local,
        remote: remote.to_string(),
    };
    tracing::info!(to = %upload.destination(), "Uploading {}", upload.local.display());
    let files = ctx.transport.upload(&upload)?;
    Ok(TaskSummary {
        notes: vec![format!("{files} files → {}", upload.destination())],
        ..TaskSummary::default()
    })
}

pub fn sftp(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let remote = &ctx.config.project.remote;
    upload(ctx, ctx.config.dest(), &remote.deploy_path)
}

pub fn sync(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let remote = &ctx.config.project.remote;
    upload(ctx, ctx.config.dest_path(&remote.sync_source), &remote.sync_path)
}

/// Records uploads instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    uploads: Mutex<Vec<Upload>>,
    reject: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every upload fails.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads
            .lock()
            .map(|u| u.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }
}

impl Transport for RecordingTransport {
    fn upload(&self, upload: &Upload) -> Result<usize, TransferError> {
        if self.reject {
            return Err(TransferError::Rejected(upload.destination()));
        }
        let (_, files) = batch_script(&upload.local, &upload.remote)?;
        self.uploads
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(upload.clone());
        Ok(files)
    }
}
