//! Host name detection

use sysinfo::System;

/// Fallback when the system reports no host name
pub const FALLBACK_HOSTNAME: &str = "localhost";

/// Lowercased system host name
pub fn detect_hostname() -> String {
    match System::host_name() {
        Some(name) if !name.trim().is_empty() => name.trim().to_lowercase(),
        _ => {
            tracing::warn!(fallback = FALLBACK_HOSTNAME, "unable to detect host name");
            FALLBACK_HOSTNAME.to_string()
        }
    }
}

/// Configured override if set, else the detected host name
pub fn resolve_hostname(configured: Option<String>) -> String {
    configured.unwrap_or_else(detect_hostname)
}
