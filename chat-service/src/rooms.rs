//! Canonical room identifiers.
//!
//! A room is the conversation between exactly two participants. Its id is
//! derived from the unordered pair of participant identities, so both sides
//! resolve the same room no matter who connects first.

/// Build the canonical room id for a pair of participant identities.
///
/// Symmetric and deterministic: the pair is sorted before joining, so
/// `room_id(a, b) == room_id(b, a)`.
pub fn room_id(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    pair.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_is_symmetric() {
        assert_eq!(room_id("alice", "bob"), room_id("bob", "alice"));
    }

    #[test]
    fn room_id_is_deterministic() {
        assert_eq!(room_id("alice", "bob"), "alice_bob");
        assert_eq!(room_id("bob", "alice"), "alice_bob");
    }

    #[test]
    fn room_id_with_self() {
        assert_eq!(room_id("alice", "alice"), "alice_alice");
    }
}
