use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::net::IpAddr;

/// Fast Extension (BEP-6) state the choker needs for one peer.
///
/// Only the outgoing side matters here: the pieces we told the peer it may
/// download from us even while choked.
#[derive(Debug, Clone, Default)]
pub struct FastExtensionState {
    allowed_fast_outgoing: HashSet<u32>,
}

impl FastExtensionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an AllowedFast piece we sent to the peer.
    pub fn allow(&mut self, piece: u32) {
        self.allowed_fast_outgoing.insert(piece);
    }

    /// Checks if a request for `piece` may be served while the peer is choked.
    pub fn should_serve_choked_request(&self, piece: u32) -> bool {
        self.allowed_fast_outgoing.contains(&piece)
    }

    pub fn allowed(&self) -> impl Iterator<Item = u32> + '_ {
        self.allowed_fast_outgoing.iter().copied()
    }

    pub fn clear(&mut self) {
        self.allowed_fast_outgoing.clear();
    }
}

/// Generates the allowed fast set for a peer (BEP-6).
///
/// The set depends only on the peer's masked address and the info hash, so
/// both ends can compute it. IPv4 addresses are masked to /24; IPv6 addresses
/// contribute their first four bytes.
pub fn generate_allowed_fast_set(
    info_hash: &[u8; 20],
    peer_ip: IpAddr,
    num_pieces: u32,
    set_size: usize,
) -> Vec<u32> {
    if num_pieces == 0 {
        return Vec::new();
    }
    // The set cannot hold more distinct pieces than the torrent has.
    let set_size = set_size.min(num_pieces as usize);

    let prefix = match peer_ip {
        IpAddr::V4(ip) => {
            let [a, b, c, _] = ip.octets();
            [a, b, c, 0]
        }
        IpAddr::V6(ip) => {
            let octets = ip.octets();
            [octets[0], octets[1], octets[2], octets[3]]
        }
    };

    let mut seed: Vec<u8> = prefix.iter().chain(info_hash.iter()).copied().collect();
    let mut pieces = Vec::with_capacity(set_size);

    while pieces.len() < set_size {
        let digest = Sha1::digest(&seed);

        for word in digest.chunks_exact(4) {
            if pieces.len() == set_size {
                break;
            }
            let index = u32::from_be_bytes([word[0], word[1], word[2], word[3]]) % num_pieces;
            if !pieces.contains(&index) {
                pieces.push(index);
            }
        }

        seed = digest.to_vec();
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bep6_reference_vector() {
        // From BEP-6: 80.4.4.200, info hash of 0xaa bytes, 1313 pieces.
        let info_hash = [0xaa; 20];
        let ip = IpAddr::V4(Ipv4Addr::new(80, 4, 4, 200));

        let set = generate_allowed_fast_set(&info_hash, ip, 1313, 7);
        assert_eq!(set, vec![1059, 431, 808, 1217, 287, 376, 1188]);

        let set = generate_allowed_fast_set(&info_hash, ip, 1313, 9);
        assert_eq!(set, vec![1059, 431, 808, 1217, 287, 376, 1188, 353, 508]);
    }

    #[test]
    fn test_same_subnet_same_set() {
        let info_hash = [7; 20];
        let a = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
        let b = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 250));
        assert_eq!(
            generate_allowed_fast_set(&info_hash, a, 500, 10),
            generate_allowed_fast_set(&info_hash, b, 500, 10)
        );
    }

    #[test]
    fn test_small_torrent_caps_set_size() {
        let info_hash = [1; 20];
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let set = generate_allowed_fast_set(&info_hash, ip, 3, 10);
        assert_eq!(set.len(), 3);
        assert!(generate_allowed_fast_set(&info_hash, ip, 0, 10).is_empty());
    }

    #[test]
    fn test_allowed_pieces_are_served_while_choked() {
        let mut state = FastExtensionState::new();
        state.allow(4);
        assert!(state.should_serve_choked_request(4));
        assert!(!state.should_serve_choked_request(5));
        state.clear();
        assert!(!state.should_serve_choked_request(4));
    }
}
