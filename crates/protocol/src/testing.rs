//! Bus fixtures for tests.
//!
//! [`PrivateBus`] runs a throwaway `dbus-daemon` so tests get real name
//! ownership and `NameOwnerChanged` without touching the session bus.
//! [`peer_pair`] connects two endpoints directly for tests that only need
//! method calls and signals between one client and one object.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use zbus::{Connection, Guid, connection};

/// A `dbus-daemon --session` owned by the test; killed on drop.
pub struct PrivateBus {
    address: String,
    _daemon: Child,
}

impl PrivateBus {
    /// Starts a daemon and waits for its address.
    ///
    /// Returns `None` when `dbus-daemon` is not installed or fails to
    /// start, so callers can skip instead of failing.
    pub async fn start() -> Option<Self> {
        let mut daemon = match Command::new("dbus-daemon")
            .args(["--session", "--nofork", "--print-address"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(daemon) => daemon,
            Err(e) => {
                warn!("dbus-daemon unavailable, skipping: {e}");
                return None;
            }
        };

        let stdout = daemon.stdout.take()?;
        let mut line = String::new();
        if let Err(e) = BufReader::new(stdout).read_line(&mut line).await {
            warn!("dbus-daemon printed no address: {e}");
            return None;
        }
        let address = line.trim().to_string();
        if address.is_empty() {
            warn!("dbus-daemon exited before printing its address");
            return None;
        }
        debug!(%address, "private bus started");

        Some(Self {
            address,
            _daemon: daemon,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Opens a new connection; each one gets its own unique name.
    pub async fn connect(&self) -> zbus::Result<Connection> {
        connection::Builder::address(self.address.as_str())?
            .build()
            .await
    }
}

/// Two connections joined over a socket pair, without a bus daemon.
///
/// The first is the server end. Messages carry no sender and names cannot
/// be requested; calls use no destination.
pub async fn peer_pair() -> zbus::Result<(Connection, Connection)> {
    let (server, client) = UnixStream::pair()?;
    let guid = Guid::generate();
    let server = connection::Builder::unix_stream(server)
        .server(guid)?
        .p2p()
        .build();
    let client = connection::Builder::unix_stream(client).p2p().build();
    tokio::try_join!(server, client)
}
