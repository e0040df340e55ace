//! In-memory terminal and process fakes shared by unit tests.

use crate::process::{
    ExitOutcome, ProcessControl, ProcessLauncher, RemoteProcess, TtySpec, WindowSize,
};
use crate::terminal::TerminalDevice;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, DuplexStream};

#[derive(Default)]
struct DeviceState {
    raw_entries: AtomicUsize,
    restores: AtomicUsize,
    reject_raw: AtomicBool,
    reject_restore: AtomicBool,
    size: Mutex<Option<(u16, u16)>>,
    scripted_sizes: Mutex<VecDeque<Option<(u16, u16)>>>,
}

/// Terminal device that counts mode changes and reports scripted sizes.
#[derive(Clone)]
pub struct FakeDevice {
    state: Arc<DeviceState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let state = DeviceState {
            size: Mutex::new(Some((24, 80))),
            ..Default::default()
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn rejecting_raw_mode(self) -> Self {
        self.state.reject_raw.store(true, Ordering::SeqCst);
        self
    }

    pub fn rejecting_restore(self) -> Self {
        self.state.reject_restore.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_size(self, rows: u16, columns: u16) -> Self {
        self.set_size(Some((rows, columns)));
        self
    }

    /// Sets the size reported once the scripted sizes run out.
    pub fn set_size(&self, size: Option<(u16, u16)>) {
        *self.state.size.lock().unwrap() = size;
    }

    /// Queues sizes returned by successive queries; `None` fails the query.
    pub fn script_sizes(&self, sizes: impl IntoIterator<Item = Option<(u16, u16)>>) {
        self.state.scripted_sizes.lock().unwrap().extend(sizes);
    }

    pub fn raw_entries(&self) -> usize {
        self.state.raw_entries.load(Ordering::SeqCst)
    }

    pub fn restores(&self) -> usize {
        self.state.restores.load(Ordering::SeqCst)
    }
}

impl TerminalDevice for FakeDevice {
    fn enable_raw_mode(&self) -> io::Result<()> {
        if self.state.reject_raw.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not a tty"));
        }
        self.state.raw_entries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        self.state.restores.fetch_add(1, Ordering::SeqCst);
        if self.state.reject_restore.load(Ordering::SeqCst) {
            return Err(io::Error::other("device gone"));
        }
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let next = self.state.scripted_sizes.lock().unwrap().pop_front();
        let size = match next {
            Some(size) => size,
            None => *self.state.size.lock().unwrap(),
        };
        size.ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no size"))
    }
}

/// How a [`FakeProcess`] finishes.
#[derive(Clone, Copy)]
pub enum WaitBehavior {
    Exit(i32),
    Fail,
    Panic,
}

/// Process control that records window-size pushes.
pub struct FakeProcess {
    wait: WaitBehavior,
    window_sizes: Mutex<Vec<WindowSize>>,
    fail_resize: bool,
}

impl FakeProcess {
    pub fn new(wait: WaitBehavior) -> Arc<Self> {
        Arc::new(Self {
            wait,
            window_sizes: Mutex::new(Vec::new()),
            fail_resize: false,
        })
    }

    pub fn failing_resize() -> Arc<Self> {
        Arc::new(Self {
            wait: WaitBehavior::Exit(0),
            window_sizes: Mutex::new(Vec::new()),
            fail_resize: true,
        })
    }

    pub fn window_sizes(&self) -> Vec<WindowSize> {
        self.window_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessControl for FakeProcess {
    fn id(&self) -> u32 {
        7
    }

    async fn set_window_size(&self, geometry: WindowSize) -> anyhow::Result<()> {
        self.window_sizes.lock().unwrap().push(geometry);
        if self.fail_resize {
            anyhow::bail!("resize rejected");
        }
        Ok(())
    }

    async fn wait(&self) -> anyhow::Result<ExitOutcome> {
        match self.wait {
            WaitBehavior::Exit(exit_status) => Ok(ExitOutcome { exit_status }),
            WaitBehavior::Fail => anyhow::bail!("connection reset while waiting"),
            WaitBehavior::Panic => panic!("wait exploded"),
        }
    }
}

/// Launcher that hands out a [`FakeProcess`] whose stdio already holds
/// `output` and is closed by the remote side.
pub struct FakeLauncher {
    process: Arc<FakeProcess>,
    output: Vec<u8>,
    fail: bool,
    requests: Mutex<Vec<Option<TtySpec>>>,
}

impl FakeLauncher {
    pub fn new(process: Arc<FakeProcess>, output: &[u8]) -> Self {
        Self {
            process,
            output: output.to_vec(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            process: FakeProcess::new(WaitBehavior::Exit(0)),
            output: Vec::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn process(&self) -> &Arc<FakeProcess> {
        &self.process
    }

    /// Pseudo-terminal requests received so far.
    pub fn requests(&self) -> Vec<Option<TtySpec>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, tty: Option<TtySpec>) -> anyhow::Result<RemoteProcess> {
        self.requests.lock().unwrap().push(tty);
        if self.fail {
            anyhow::bail!("container not found");
        }

        let (local, mut remote): (DuplexStream, DuplexStream) = tokio::io::duplex(4096);
        remote.write_all(&self.output).await?;
        drop(remote);

        Ok(RemoteProcess::new(self.process.clone(), local))
    }
}
