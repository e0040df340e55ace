//! Remote process types and the capability traits the session drives.

use crate::terminal::TerminalGeometry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Window size requested for a pseudo-terminal.
pub type WindowSize = TerminalGeometry;

/// Pseudo-terminal request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtySpec {
    /// Initial window size; the server picks a default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<WindowSize>,
}

impl TtySpec {
    /// Creates a request carrying an optional window size.
    pub fn new(window_size: Option<WindowSize>) -> Self {
        Self { window_size }
    }
}

/// Specification of a process to run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    /// `KEY=VALUE` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<TtySpec>,
}

impl ProcessSpec {
    /// Builds a spec from a command line (program followed by arguments).
    ///
    /// Returns `None` for an empty command line.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (path, args) = command.split_first()?;
        Some(Self {
            path: path.clone(),
            args: args.to_vec(),
            ..Default::default()
        })
    }
}

/// Final status of a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub exit_status: i32,
}

impl ExitOutcome {
    /// Returns true if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Bidirectional byte stream carrying a process's stdio.
pub trait ProcessStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ProcessStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Control channel for a running remote process.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Server-assigned process id.
    fn id(&self) -> u32;

    /// Pushes a new window size to the process's pseudo-terminal.
    async fn set_window_size(&self, geometry: WindowSize) -> anyhow::Result<()>;

    /// Blocks until the process terminates.
    async fn wait(&self) -> anyhow::Result<ExitOutcome>;
}

/// A started or attached remote process.
pub struct RemoteProcess {
    pub control: Arc<dyn ProcessControl>,
    pub stream: Box<dyn ProcessStream>,
}

impl RemoteProcess {
    /// Bundles a control handle with its stdio stream.
    pub fn new(control: Arc<dyn ProcessControl>, stream: impl ProcessStream + 'static) -> Self {
        Self {
            control,
            stream: Box::new(stream),
        }
    }
}

/// Starts a remote process, or attaches to an existing one.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launches with an optional pseudo-terminal request.
    async fn launch(&self, tty: Option<TtySpec>) -> anyhow::Result<RemoteProcess>;
}

#[async_trait]
impl<T> ProcessLauncher for &T
where
    T: ProcessLauncher + ?Sized,
{
    async fn launch(&self, tty: Option<TtySpec>) -> anyhow::Result<RemoteProcess> {
        (**self).launch(tty).await
    }
}
