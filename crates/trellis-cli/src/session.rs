//! Interactive sessions against remote processes.
//!
//! An [`InteractiveSession`] puts the local terminal in raw mode, launches a
//! remote process with a pseudo-terminal sized like the local one, forwards
//! local stdin and remote output, keeps the remote window size in sync and
//! restores the terminal before returning, whatever the outcome.

use crate::error::{Error, Result};
use crate::process::{ExitOutcome, ProcessLauncher, ProcessStream, TtySpec};
use crate::resize::{window_change_events, ResizeBridge};
use crate::terminal::Terminal;
use bytes::Bytes;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::io::StreamReader;

/// How long remote output may keep draining after the process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Interactive terminal session for a remote process.
pub struct InteractiveSession<L, I, O> {
    launcher: L,
    input: I,
    output: O,
}

impl<L, I, O> InteractiveSession<L, I, O>
where
    L: ProcessLauncher,
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a session forwarding `input` to the process and process
    /// output to `output`.
    pub fn new(launcher: L, input: I, output: O) -> Self {
        Self {
            launcher,
            input,
            output,
        }
    }

    /// Runs the session to completion.
    ///
    /// Raw mode is held by a guard for the whole run, so the terminal is
    /// restored on every path out of this function, including a failed
    /// launch, a failed wait and unwinding.
    pub async fn run<E>(self, terminal: Arc<Terminal>, resize_events: E) -> Result<ExitOutcome>
    where
        E: Stream<Item = ()> + Send + Unpin + 'static,
    {
        let raw_guard = terminal.set_raw()?;

        let window_size = match terminal.current_geometry() {
            Ok(geometry) => {
                tracing::debug!(
                    "Initial terminal size: {}x{}",
                    geometry.columns,
                    geometry.rows
                );
                Some(geometry)
            }
            Err(e) => {
                tracing::debug!("launching without window size: {}", e);
                None
            }
        };

        let process = self
            .launcher
            .launch(Some(TtySpec::new(window_size)))
            .await
            .map_err(Error::ProcessStart)?;

        let control = process.control;
        let bridge = ResizeBridge::spawn(Arc::clone(&terminal), Arc::clone(&control), resize_events);
        let pumps = StdioPumps::spawn(process.stream, self.input, self.output);

        let outcome = control.wait().await;
        pumps.finish().await;
        drop(bridge);

        if let Err(e) = raw_guard.restore() {
            tracing::warn!("failed to restore terminal: {}", e);
        }

        let outcome = outcome.map_err(Error::ProcessWait)?;
        tracing::debug!(
            "process {} exited with status {}",
            control.id(),
            outcome.exit_status
        );
        Ok(outcome)
    }
}

/// Runs an interactive session on the local terminal with the process's
/// stdin and stdout as endpoints.
///
/// Fails with [`Error::TerminalUnavailable`] before launching anything when
/// standard input is not a terminal.
pub async fn run_interactive<L: ProcessLauncher>(launcher: L) -> Result<ExitOutcome> {
    let terminal = Terminal::open()?;
    let input = stdin_reader()?;

    InteractiveSession::new(launcher, input, tokio::io::stdout())
        .run(terminal, window_change_events())
        .await
}

/// Launches a process without a pseudo-terminal, forwards stdio and waits
/// for it. Terminal mode is left untouched.
pub async fn run_attached<L, I, O>(launcher: &L, input: I, output: O) -> Result<ExitOutcome>
where
    L: ProcessLauncher,
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let process = launcher.launch(None).await.map_err(Error::ProcessStart)?;
    let pumps = StdioPumps::spawn(process.stream, input, output);

    let outcome = process.control.wait().await;
    pumps.finish().await;

    outcome.map_err(Error::ProcessWait)
}

/// Returns an async reader over the process's standard input.
///
/// Reads happen on a dedicated thread, so a read blocked on the terminal
/// never keeps the runtime from shutting down once the session is over.
pub fn stdin_reader() -> io::Result<impl AsyncRead + Unpin + Send + 'static> {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(16);

    std::thread::Builder::new()
        .name("trellis-stdin".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 1024];

            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break, // EOF
                    Ok(n) => {
                        if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        })?;

    Ok(StreamReader::new(ReceiverStream::new(rx)))
}

/// Tasks copying local input to the process and process output back.
struct StdioPumps {
    input: JoinHandle<()>,
    output: JoinHandle<()>,
}

impl StdioPumps {
    fn spawn<I, O>(stream: Box<dyn ProcessStream>, input: I, output: O) -> Self
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            input: tokio::spawn(forward_input(input, writer)),
            output: tokio::spawn(forward_output(reader, output)),
        }
    }

    /// Stops forwarding input and lets buffered output drain briefly.
    async fn finish(mut self) {
        self.input.abort();

        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut self.output)
            .await
            .is_err()
        {
            tracing::debug!("output still open after process exit");
        }
    }
}

impl Drop for StdioPumps {
    fn drop(&mut self) {
        self.input.abort();
        self.output.abort();
    }
}

async fn forward_input<I, W>(mut input: I, mut writer: W)
where
    I: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];

    loop {
        match input.read(&mut buf).await {
            Ok(0) => {
                // Propagate EOF so the remote side sees stdin close.
                let _ = writer.shutdown().await;
                break;
            }
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    tracing::debug!("Failed to write to remote: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    tracing::debug!("Failed to flush remote: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

async fn forward_output<R, O>(mut reader: R, mut output: O)
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break, // EOF
            Ok(n) => {
                if let Err(e) = output.write_all(&buf[..n]).await {
                    tracing::debug!("Failed to write to stdout: {}", e);
                    break;
                }
                if let Err(e) = output.flush().await {
                    tracing::debug!("Failed to flush stdout: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Failed to read from remote: {}", e);
                break;
            }
        }
    }
}
