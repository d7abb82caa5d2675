//! Location lookup for client addresses
//!
//! Real geo-IP resolution is out of scope; the stub keeps the address visible
//! in alerts and audit records.

/// Resolves a human-readable location for an IP address
pub trait LocationResolver: Send + Sync + 'static {
    /// Location description for `ip`
    fn location_for(&self, ip: &str) -> String;
}

/// Resolver that echoes the address back
#[derive(Debug, Clone, Copy, Default)]
pub struct StubLocationResolver;

impl LocationResolver for StubLocationResolver {
    fn location_for(&self, ip: &str) -> String {
        format!("IP: {}", ip)
    }
}
