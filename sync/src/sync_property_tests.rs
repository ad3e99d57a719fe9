//! Property tests over the diff/packetize/apply pipeline

use proptest::prelude::*;

use crate::codec::{self, EditInterpreter};
use crate::diff::diff;

fn line_lists() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abx]{0,6}", 0..12)
}

/// Runs packets through an interpreter and applies the result to `base`.
fn deliver(packets: Vec<sync_net::EditPacket>, base: &[String]) -> Vec<String> {
    let mut interpreter = EditInterpreter::new();
    interpreter.begin("f");
    for packet in packets {
        interpreter.insert(packet);
    }
    let finalized = interpreter.end("f");
    let mut live = base.to_vec();
    codec::apply_edits("f", &finalized, &mut live).unwrap();
    live
}

proptest! {
    /// Encoding diff(A, B) and replaying it onto A always reproduces B.
    #[test]
    fn diff_apply_round_trip(a in line_lists(), b in line_lists()) {
        let edits = diff(&a, &b);
        let packets = codec::encode_edits("f", &b, &edits).unwrap();
        prop_assert_eq!(deliver(packets, &a), b);
    }

    /// Identical inputs diff to nothing, and an empty batch is a no-op.
    #[test]
    fn identical_inputs_are_a_no_op(a in line_lists()) {
        prop_assert!(diff(&a, &a).is_empty());
        prop_assert_eq!(deliver(Vec::new(), &a), a.clone());
    }

    /// Any buffer limit above the largest line yields the same applied
    /// result as the unbounded encoding.
    #[test]
    fn packetization_is_invisible_to_the_result(
        a in line_lists(),
        b in line_lists(),
        limit in 16usize..64,
    ) {
        let edits = diff(&a, &b);
        let mut packets = Vec::new();
        for edit in &edits {
            packets.extend(codec::encode_edit_with_limit("f", &b, edit, limit).unwrap());
        }
        prop_assert_eq!(deliver(packets, &a), b);
    }
}
