//! Property-based tests for the circle codec and canonical digest.
//!
//! These tests verify:
//! - Encoding is deterministic and round-trip stable for arbitrary
//!   circles built through the public membership operations
//! - Decoded circles preserve the canonical digest and keep their
//!   signatures verifiable
//! - Version negotiation always yields a clean version error, never a
//!   parse error, for any foreign version
//! - Truncated encodings are always rejected as malformed

use accord_core::keys::KeyPair;
use accord_core::peer::FullPeerInfo;
use accord_core::wire::Encoder;
use accord_core::{encode_incompatible_marker, Circle, CircleError, INCOMPATIBLE_VERSION_SENTINEL};
use proptest::prelude::*;

fn user_key() -> KeyPair {
    KeyPair::from_seed([200; 32])
}

fn device(seed: u8) -> FullPeerInfo {
    FullPeerInfo::new(KeyPair::from_seed([seed; 32]), format!("dev-{seed}"))
}

/// What becomes of a device that applied to the circle.
#[derive(Debug, Clone, Copy)]
enum Fate {
    Applicant,
    Member,
    Rejected,
    Retired,
}

fn fate_strategy() -> impl Strategy<Value = Fate> {
    prop_oneof![
        Just(Fate::Applicant),
        Just(Fate::Member),
        Just(Fate::Rejected),
        Just(Fate::Retired),
    ]
}

/// Builds a circle by replaying a membership script through the
/// public operations, so every generated circle is one that could
/// exist in the wild.
fn build_circle(name: &str, others: &[(u8, Fate)]) -> Circle {
    let founder = device(99);
    let mut circle = Circle::new(name);
    circle
        .reset_to_offering(&user_key(), &founder)
        .expect("offering should succeed");

    for (seed, fate) in others {
        let other = device(*seed);
        circle
            .request_admission(&user_key(), &other)
            .expect("request should succeed");
        match fate {
            Fate::Applicant => {}
            Fate::Member => circle
                .accept_request(&user_key(), &founder, other.id())
                .expect("accept should succeed"),
            Fate::Rejected => circle
                .reject_request(founder.id(), other.id())
                .expect("reject should succeed"),
            Fate::Retired => {
                circle
                    .accept_request(&user_key(), &founder, other.id())
                    .expect("accept should succeed");
                circle
                    .retire_peer(&user_key(), &other)
                    .expect("retire should succeed");
            }
        }
    }
    circle
}

// ============================================================================
// Deterministic boundary cases
// ============================================================================

/// A name outside ASCII must survive the byte round-trip unchanged.
#[test]
fn unicode_name_round_trips() {
    let circle = build_circle("famille \u{2764} \u{5bb6}\u{65cf}", &[]);
    let decoded = Circle::decode(&circle.encode().unwrap()).unwrap();
    assert_eq!(decoded.name(), circle.name());
    assert_eq!(decoded, circle);
}

/// A generation near the counter's ceiling must be carried verbatim.
#[test]
fn extreme_generation_round_trips() {
    let mut enc = Encoder::new();
    enc.sequence(|enc| {
        enc.uint(1);
        enc.string("old");
        enc.uint(u64::MAX - 1);
        for _ in 0..4 {
            enc.sequence(|_| {});
        }
    });
    let bytes = enc.finish().unwrap();

    let decoded = Circle::decode(&bytes).unwrap();
    assert_eq!(decoded.generation(), u64::MAX - 1);
    assert_eq!(decoded.encode().unwrap(), bytes);
}

/// The reserved sentinel and version zero are both refused as version
/// mismatches, not parse errors.
#[test]
fn sentinel_and_zero_versions_are_version_errors() {
    let marker = encode_incompatible_marker().unwrap();
    assert!(matches!(
        Circle::decode(&marker),
        Err(CircleError::IncompatibleVersion(v)) if v == INCOMPATIBLE_VERSION_SENTINEL
    ));

    let mut enc = Encoder::new();
    enc.sequence(|enc| {
        enc.uint(0);
    });
    assert!(matches!(
        Circle::decode(&enc.finish().unwrap()),
        Err(CircleError::IncompatibleVersion(0))
    ));
}

// ============================================================================
// Round-trip and determinism properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: any circle reachable through the membership operations
    /// encodes deterministically, and decoding its bytes rebuilds an
    /// equal circle whose re-encoding is byte-identical.
    #[test]
    fn any_circle_round_trips(
        name in "[a-zA-Z0-9 _-]{0,24}",
        others in prop::collection::btree_map(0u8..=60, fate_strategy(), 0..5),
    ) {
        let others: Vec<(u8, Fate)> = others.into_iter().collect();
        let circle = build_circle(&name, &others);

        let bytes = circle.encode().expect("encode must succeed");
        prop_assert_eq!(&circle.encode().expect("encode must succeed"), &bytes);

        let decoded = Circle::decode(&bytes).expect("decode must succeed");
        prop_assert_eq!(&decoded, &circle);
        prop_assert_eq!(&decoded.encode().expect("encode must succeed"), &bytes);
    }

    /// Property: the canonical digest and the recorded signatures are
    /// unaffected by a trip through the wire, so a decoded circle still
    /// verifies under the user key.
    #[test]
    fn decoding_preserves_digest_and_signatures(
        others in prop::collection::btree_map(0u8..=60, fate_strategy(), 0..5),
    ) {
        let others: Vec<(u8, Fate)> = others.into_iter().collect();
        let circle = build_circle("digest", &others);

        let decoded = Circle::decode(&circle.encode().expect("encode must succeed"))
            .expect("decode must succeed");

        prop_assert_eq!(decoded.digest(), circle.digest());
        prop_assert!(decoded
            .verify_signature(&user_key().public())
            .expect("user signature must be present"));
    }

    /// Property: base64 transport is as lossless as the byte form.
    #[test]
    fn base64_transport_round_trips(
        others in prop::collection::btree_map(0u8..=60, fate_strategy(), 0..4),
    ) {
        let others: Vec<(u8, Fate)> = others.into_iter().collect();
        let circle = build_circle("text", &others);

        let text = circle.encode_base64().expect("encode must succeed");
        let decoded = Circle::decode_base64(&text).expect("decode must succeed");
        prop_assert_eq!(decoded, circle);
    }
}

// ============================================================================
// Version negotiation and malformed input properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: any version other than the compatible one is refused
    /// with that exact version number before the body is interpreted,
    /// whatever the body holds.
    #[test]
    fn foreign_versions_never_misparse(
        version in 2u64..,
        body in prop::collection::vec(any::<u8>(), 0..40),
    ) {
        let mut enc = Encoder::new();
        enc.sequence(|enc| {
            enc.uint(version);
            enc.octets(&body);
        });
        let bytes = enc.finish().expect("encode must succeed");

        match Circle::decode(&bytes) {
            Err(CircleError::IncompatibleVersion(v)) => prop_assert_eq!(v, version),
            other => prop_assert!(false, "expected a version error, got {:?}", other),
        }
    }

    /// Property: chopping any number of trailing bytes off a valid
    /// encoding yields a format error, never a partially built circle.
    #[test]
    fn truncated_encodings_never_parse(
        others in prop::collection::btree_map(0u8..=60, fate_strategy(), 0..4),
        cut in 1usize..64,
    ) {
        let others: Vec<(u8, Fate)> = others.into_iter().collect();
        let bytes = build_circle("cut", &others)
            .encode()
            .expect("encode must succeed");
        let cut = cut.min(bytes.len());

        let result = Circle::decode(&bytes[..bytes.len() - cut]);
        prop_assert!(matches!(result, Err(CircleError::BadFormat(_))));
    }
}
