//! Server client for CLI communication.
//!
//! Provides an HTTP client for the container server, reached over TCP. Each
//! request opens its own connection; process stdio is carried on a connection
//! upgraded to a raw byte stream.

use crate::process::{
    ExitOutcome, ProcessControl, ProcessLauncher, ProcessSpec, RemoteProcess, TtySpec, WindowSize,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Bytes, Frame, Incoming};
use hyper::header;
use hyper::upgrade::Upgraded;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

/// Default server address.
pub const DEFAULT_TARGET: &str = "localhost:7777";

/// Client for the container server's HTTP API.
#[derive(Debug, Clone)]
pub struct ServerClient {
    target: String,
}

impl ServerClient {
    /// Creates a client for the server at `target` (`host:port`).
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Returns the server address.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<()> {
        self.request(Method::GET, "/ping", None::<()>).await?;
        Ok(())
    }

    /// Lists container handles.
    pub async fn containers(&self) -> Result<Vec<String>> {
        let response: ContainerList = self.get("/containers").await?;
        Ok(response.handles)
    }

    /// Creates a container and returns its handle.
    pub async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let response: ContainerCreated = self.post("/containers", Some(spec)).await?;
        Ok(response.handle)
    }

    /// Destroys a container.
    pub async fn destroy(&self, handle: &str) -> Result<()> {
        let path = format!("/containers/{}", encode(handle));
        self.request(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }

    /// Starts a process and returns its id.
    pub async fn run_process(&self, handle: &str, spec: &ProcessSpec) -> Result<u32> {
        let path = format!("/containers/{}/processes", encode(handle));
        let response: ProcessCreated = self.post(&path, Some(spec)).await?;
        Ok(response.id)
    }

    /// Opens the stdio stream of a running process.
    pub async fn attach_stdio(
        &self,
        handle: &str,
        process_id: u32,
    ) -> Result<TokioIo<Upgraded>> {
        let path = format!(
            "/containers/{}/processes/{}/attach",
            encode(handle),
            process_id
        );
        self.upgrade_connection(&path).await
    }

    /// Updates a process's pseudo-terminal.
    pub async fn set_tty(&self, handle: &str, process_id: u32, tty: &TtySpec) -> Result<()> {
        let path = format!("/containers/{}/processes/{}/tty", encode(handle), process_id);
        self.request(Method::PUT, &path, Some(tty)).await?;
        Ok(())
    }

    /// Blocks until a process exits.
    pub async fn wait_process(&self, handle: &str, process_id: u32) -> Result<ExitOutcome> {
        let path = format!("/containers/{}/processes/{}/wait", encode(handle), process_id);
        self.get(&path).await
    }

    /// Uploads a tar stream, extracting it into `destination`.
    pub async fn stream_in<R>(&self, handle: &str, destination: &str, archive: R) -> Result<()>
    where
        R: AsyncRead + Send + 'static,
    {
        let path = format!(
            "/containers/{}/files?destination={}",
            encode(handle),
            encode(destination)
        );
        let body = StreamBody::new(ReaderStream::new(archive).map(|chunk| chunk.map(Frame::data)));
        let request = self
            .request_builder(Method::PUT, &path)
            .header(header::CONTENT_TYPE, "application/x-tar")
            .body(body)
            .context("failed to build request")?;

        let response = self.send(request).await?;
        read_body(response).await?;
        Ok(())
    }

    /// Downloads `source` as a tar stream.
    pub async fn stream_out(
        &self,
        handle: &str,
        source: &str,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let path = format!(
            "/containers/{}/files?source={}",
            encode(handle),
            encode(source)
        );
        let request = self
            .request_builder(Method::GET, &path)
            .body(Full::new(Bytes::new()))
            .context("failed to build request")?;

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            read_body(response).await?;
            anyhow::bail!("server returned error {}", status);
        }

        let stream = response
            .into_body()
            .into_data_stream()
            .map(|chunk| chunk.map_err(io::Error::other));
        Ok(Box::pin(StreamReader::new(stream)))
    }

    /// Maps a host port to a container port. Returns `(host_port, container_port)`.
    pub async fn net_in(
        &self,
        handle: &str,
        host_port: u32,
        container_port: u32,
    ) -> Result<(u32, u32)> {
        let path = format!("/containers/{}/net/in", encode(handle));
        let request = PortMapping {
            host_port,
            container_port,
        };
        let response: PortMapping = self.post(&path, Some(&request)).await?;
        Ok((response.host_port, response.container_port))
    }

    /// Performs a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(Method::GET, path, None::<()>).await?;
        serde_json::from_slice(&body).context("failed to parse response")
    }

    /// Performs a POST request with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: Option<B>,
    ) -> Result<T> {
        let body = self.request(Method::POST, path, body).await?;
        serde_json::from_slice(&body).context("failed to parse response")
    }

    /// Upgrades a connection into a raw bidirectional stream.
    async fn upgrade_connection(&self, path: &str) -> Result<TokioIo<Upgraded>> {
        let request = self
            .request_builder(Method::POST, path)
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "tcp")
            .body(Full::new(Bytes::new()))
            .context("failed to build request")?;

        let mut response = self.send(request).await?;
        let status = response.status();

        if status != StatusCode::SWITCHING_PROTOCOLS {
            read_body(response).await?;
            anyhow::bail!("server did not upgrade connection ({})", status);
        }

        let upgraded = hyper::upgrade::on(&mut response)
            .await
            .context("failed to upgrade process stream")?;

        Ok(TokioIo::new(upgraded))
    }

    /// Performs an HTTP request with an optional JSON body.
    async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<Bytes> {
        let request = if let Some(body) = body {
            let body_bytes = serde_json::to_vec(&body).context("failed to serialize body")?;
            self.request_builder(method, path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::CONTENT_LENGTH, body_bytes.len())
                .body(Full::new(Bytes::from(body_bytes)))
                .context("failed to build request")?
        } else {
            self.request_builder(method, path)
                .body(Full::new(Bytes::new()))
                .context("failed to build request")?
        };

        let response = self.send(request).await?;
        read_body(response).await
    }

    fn request_builder(&self, method: Method, path: &str) -> hyper::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.target, path))
            .header(header::HOST, self.target.as_str())
    }

    /// Opens a connection and sends a single request on it.
    async fn send<B>(&self, request: Request<B>) -> Result<Response<Incoming>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let stream = TcpStream::connect(&self.target)
            .await
            .with_context(|| format!("failed to connect to server at {}", self.target))?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .context("HTTP handshake failed")?;

        // The connection task must keep running for upgrades to work.
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                tracing::debug!("Connection closed: {}", e);
            }
        });

        sender
            .send_request(request)
            .await
            .context("failed to send request")
    }
}

/// Reads a response body, turning non-success statuses into errors.
async fn read_body(response: Response<Incoming>) -> Result<Bytes> {
    let status = response.status();

    let body = response
        .into_body()
        .collect()
        .await
        .context("failed to read response")?
        .to_bytes();

    if !status.is_success() {
        let error_msg = String::from_utf8_lossy(&body);
        anyhow::bail!("server returned error {}: {}", status, error_msg.trim());
    }

    Ok(body)
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

// =============================================================================
// API Types
// =============================================================================

/// Container creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rootfs: Option<String>,
    /// Grace time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_time: Option<u64>,
    #[serde(default)]
    pub privileged: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ContainerList {
    handles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContainerCreated {
    handle: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcessCreated {
    id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PortMapping {
    host_port: u32,
    container_port: u32,
}

// =============================================================================
// Process capabilities
// =============================================================================

/// Control handle for a process in a container.
pub struct ContainerProcess {
    client: ServerClient,
    handle: String,
    id: u32,
}

impl ContainerProcess {
    pub fn new(client: ServerClient, handle: impl Into<String>, id: u32) -> Self {
        Self {
            client,
            handle: handle.into(),
            id,
        }
    }
}

#[async_trait]
impl ProcessControl for ContainerProcess {
    fn id(&self) -> u32 {
        self.id
    }

    async fn set_window_size(&self, geometry: WindowSize) -> Result<()> {
        self.client
            .set_tty(&self.handle, self.id, &TtySpec::new(Some(geometry)))
            .await
    }

    async fn wait(&self) -> Result<ExitOutcome> {
        self.client.wait_process(&self.handle, self.id).await
    }
}

/// Starts a new process and attaches to its stdio.
pub struct RunLauncher {
    client: ServerClient,
    handle: String,
    spec: ProcessSpec,
}

impl RunLauncher {
    pub fn new(client: ServerClient, handle: impl Into<String>, spec: ProcessSpec) -> Self {
        Self {
            client,
            handle: handle.into(),
            spec,
        }
    }
}

#[async_trait]
impl ProcessLauncher for RunLauncher {
    async fn launch(&self, tty: Option<TtySpec>) -> Result<RemoteProcess> {
        let spec = ProcessSpec {
            tty,
            ..self.spec.clone()
        };
        let id = self.client.run_process(&self.handle, &spec).await?;
        tracing::debug!("started process {} in {}", id, self.handle);

        let stream = self.client.attach_stdio(&self.handle, id).await?;
        let control = ContainerProcess::new(self.client.clone(), self.handle.clone(), id);
        Ok(RemoteProcess::new(Arc::new(control), stream))
    }
}

/// Attaches to an already running process.
///
/// A window size in the pseudo-terminal request is pushed right after
/// attaching.
pub struct AttachLauncher {
    client: ServerClient,
    handle: String,
    id: u32,
}

impl AttachLauncher {
    pub fn new(client: ServerClient, handle: impl Into<String>, id: u32) -> Self {
        Self {
            client,
            handle: handle.into(),
            id,
        }
    }
}

#[async_trait]
impl ProcessLauncher for AttachLauncher {
    async fn launch(&self, tty: Option<TtySpec>) -> Result<RemoteProcess> {
        let stream = self.client.attach_stdio(&self.handle, self.id).await?;
        let control = ContainerProcess::new(self.client.clone(), self.handle.clone(), self.id);

        if let Some(window_size) = tty.and_then(|tty| tty.window_size) {
            if let Err(e) = control.set_window_size(window_size).await {
                tracing::debug!("Failed to push initial window size: {:#}", e);
            }
        }

        Ok(RemoteProcess::new(Arc::new(control), stream))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Returns the host part of a `host:port` target.
pub fn target_host(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }
    match target.rsplit_once(':') {
        Some((host, _)) => host,
        None => target,
    }
}

/// Joins a host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u32) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_host() {
        assert_eq!(target_host("localhost:7777"), "localhost");
        assert_eq!(target_host("10.0.0.5:7777"), "10.0.0.5");
        assert_eq!(target_host("[::1]:7777"), "::1");
        assert_eq!(target_host("example.com"), "example.com");
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("localhost", 61001), "localhost:61001");
        assert_eq!(join_host_port("::1", 61001), "[::1]:61001");
    }

    #[test]
    fn test_query_values_are_encoded() {
        assert_eq!(encode("/tmp/my file.txt"), "%2Ftmp%2Fmy%20file.txt");
        assert_eq!(encode("plain"), "plain");
    }

    #[test]
    fn test_container_spec_json() {
        let spec = ContainerSpec {
            handle: Some("web".to_string()),
            grace_time: Some(300),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            serde_json::json!({"handle": "web", "grace_time": 300, "privileged": false})
        );
    }
}
