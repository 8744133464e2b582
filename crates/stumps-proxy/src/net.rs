//! Network utilities for the proxy runtime.

use rand::Rng;
use std::net::TcpListener;
use tracing::debug;

/// Lowest port considered by [`find_random_open_port`].
pub const PORT_RANGE_START: u16 = 7000;
/// Highest port considered by [`find_random_open_port`].
pub const PORT_RANGE_END: u16 = 10000;

const MAX_ATTEMPTS: usize = 100;

/// Pick a random TCP port in `[7000, 10000]` that is currently free.
///
/// Candidates are sampled at random and probed with a throwaway bind, which
/// rejects ports held by active listeners or lingering connections. Gives up
/// after 100 attempts and returns `None`.
pub fn find_random_open_port() -> Option<u16> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let port = rng.gen_range(PORT_RANGE_START..=PORT_RANGE_END);
        if port_is_available(port) {
            debug!("Selected open port {}", port);
            return Some(port);
        }
    }
    None
}

/// Probe a port by binding it on all interfaces.
pub fn port_is_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_port_in_range() {
        let port = find_random_open_port().expect("no open port in range");
        assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));
    }

    #[test]
    fn test_port_availability_probe() {
        let port = find_random_open_port().expect("no open port in range");
        let _holder = TcpListener::bind(("0.0.0.0", port)).unwrap();
        assert!(!port_is_available(port));
    }
}
