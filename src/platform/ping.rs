//! Lightweight echo probe using the system `ping` command
//!
//! Raw ICMP sockets need elevated privileges on most platforms, the system
//! binary does not.

use crate::core::ProbeFailure;
use std::net::IpAddr;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

fn ping_command(addr: IpAddr, wait: Duration) -> Command {
    let mut cmd = Command::new("ping");

    #[cfg(windows)]
    {
        cmd.arg("-n")
            .arg("1")
            .arg("-w")
            .arg(wait.as_millis().max(1).to_string());
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    #[cfg(target_os = "macos")]
    {
        cmd.arg("-c")
            .arg("1")
            .arg("-W")
            .arg(wait.as_millis().max(1).to_string());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        // -W takes whole seconds here
        let secs = wait.as_secs_f64().ceil().max(1.0) as u64;
        cmd.arg("-c").arg("1").arg("-W").arg(secs.to_string());
        if addr.is_ipv6() {
            cmd.arg("-6");
        }
    }

    cmd.arg(addr.to_string());
    cmd
}

/// Send one echo request to `addr`, waiting at most `wait` for the reply
pub async fn ping(addr: IpAddr, wait: Duration) -> Result<(), ProbeFailure> {
    let output = tokio::task::spawn_blocking(move || ping_command(addr, wait).output())
        .await
        .map_err(|e| ProbeFailure::new(format!("Failed to spawn ping: {}", e)))?
        .map_err(|e| ProbeFailure::new(format!("Ping execution failed: {}", e)))?;

    debug!(addr = %addr, status = ?output.status.code(), "Echo probe finished");

    if output.status.success() {
        Ok(())
    } else {
        Err(ProbeFailure::new(format!(
            "No echo reply from {} within {} ms (host unreachable or ICMP filtered)",
            addr,
            wait.as_millis()
        )))
    }
}
