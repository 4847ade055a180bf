// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `tnc-gateway` binary as a subprocess and exercises it
//! over its gRPC port and health port.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `tnc-gateway` binary.
pub fn gateway_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tnc-gateway")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `tnc-gateway` process that is killed on drop.
pub struct GatewayProcess {
    child: Child,
    grpc_port: u16,
    health_port: Option<u16>,
    _db_dir: tempfile::TempDir,
}

/// Builder for configuring a spawned [`GatewayProcess`].
pub struct GatewayBuilder {
    health: bool,
    bus_url: Option<String>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self { health: false, bus_url: None }
    }
}

impl GatewayBuilder {
    /// Enable the health-only HTTP port (`--health-port`).
    pub fn health(mut self) -> Self {
        self.health = true;
        self
    }

    /// Configure a bus URL (`--bus-url`).
    pub fn bus(mut self, url: &str) -> Self {
        self.bus_url = Some(url.to_owned());
        self
    }

    pub fn spawn(self) -> anyhow::Result<GatewayProcess> {
        let binary = gateway_binary();
        anyhow::ensure!(binary.exists(), "tnc-gateway binary not found at {}", binary.display());

        let grpc_port = free_port()?;
        let health_port = if self.health { Some(free_port()?) } else { None };
        let db_dir = tempfile::tempdir()?;

        let mut args: Vec<String> = vec![
            "--grpc-port".into(),
            grpc_port.to_string(),
            "--consensus-db-folder".into(),
            db_dir.path().to_string_lossy().into_owned(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        if let Some(p) = health_port {
            args.extend(["--health-port".into(), p.to_string()]);
        }
        if let Some(ref url) = self.bus_url {
            args.extend(["--bus-url".into(), url.clone()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(GatewayProcess { child, grpc_port, health_port, _db_dir: db_dir })
    }
}

impl GatewayProcess {
    pub fn build() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn grpc_port(&self) -> u16 {
        self.grpc_port
    }

    pub fn health_port(&self) -> Option<u16> {
        self.health_port
    }

    pub fn grpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.grpc_port)
    }

    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.health_port.unwrap_or(0))
    }

    /// Poll `/healthz` on the gateway's own HTTP port until it answers, or
    /// poll the gRPC port by attempting a TCP connect if no health port was
    /// requested.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("tnc-gateway did not become ready within {timeout:?}");
            }
            if tokio::net::TcpStream::connect(("127.0.0.1", self.grpc_port)).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("tnc-gateway did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Make a raw HTTP/1.1 GET request over TCP, returning the status line and body.
pub async fn http_get(port: u16, path: &str) -> anyhow::Result<(u16, String)> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8(buf)?;

    let (head, body) = response.split_once("\r\n\r\n").unwrap_or((response.as_str(), ""));
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    Ok((status, body.to_string()))
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
