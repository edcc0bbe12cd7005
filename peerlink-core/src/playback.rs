//! Playback hand-off to the peer that owns an item.

use crate::url_policy::trim_trailing_slash;

/// Builds the native stream address of `remote_item_id` on `peer_base`.
///
/// The address is trusted as-is: HTTPS policy checks belong to the caller.
pub fn build_stream_address(peer_base: &str, remote_item_id: &str) -> String {
    format!(
        "{}/Items/{}/Playback",
        trim_trailing_slash(peer_base.trim()),
        remote_item_id.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_policy::normalize;

    #[test]
    fn strips_trailing_slash_once() {
        assert_eq!(
            build_stream_address("https://peer.example:8096/", "abc123"),
            "https://peer.example:8096/Items/abc123/Playback"
        );
        assert_eq!(
            build_stream_address("https://peer.example:8096", "abc123"),
            "https://peer.example:8096/Items/abc123/Playback"
        );
    }

    #[test]
    fn stored_and_typed_addresses_agree() {
        let stored = normalize("peer.example:8096/", false).unwrap();
        assert_eq!(
            build_stream_address(stored.as_str(), "abc"),
            build_stream_address("http://peer.example:8096//", "abc")
        );
    }
}
