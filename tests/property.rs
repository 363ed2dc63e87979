use itchcast::book::{BookOp, OrderBook, Side};
use proptest::prelude::*;

proptest! {
    #[test]
    fn book_invariants_hold(ops in prop::collection::vec(any_op(), 1..5000)) {
        let mut book = OrderBook::new();
        book.reserve_orders(10_000);

        for op in ops {
            book.apply(op).expect("sorted rings never lose an insertion point");
        }
        book.assert_invariants();
    }

    #[test]
    fn snapshots_match_top_of_book(ops in prop::collection::vec(any_op(), 1..2000)) {
        let mut book = OrderBook::new();
        for op in ops {
            book.apply(op).unwrap();
        }
        for side in [Side::Bid, Side::Ask] {
            let snap = book.snapshot_top_k(side, 5);
            match book.top_of_book(side) {
                Some((px, qty)) => {
                    prop_assert_eq!(snap[0].px, px);
                    prop_assert_eq!(snap[0].qty, qty);
                }
                None => prop_assert!(snap.is_empty()),
            }
        }
    }
}

// A narrow price band and small id space so ops collide: levels aggregate,
// rings fill and spill into mid/deep, and mutations hit live orders.
fn any_op() -> impl Strategy<Value = BookOp> {
    prop_oneof![
        (1u64..500u64, any_side(), 9_800u32..10_600u32, 1u32..5_000u32)
            .prop_map(|(oid, side, px, qty)| BookOp::Add { order_id: oid, side, price: px, qty }),

        (1u64..500u64, 1u32..5_000u32)
            .prop_map(|(oid, qty)| BookOp::Execute { order_id: oid, qty }),

        (1u64..500u64, 1u32..5_000u32)
            .prop_map(|(oid, qty)| BookOp::Cancel { order_id: oid, qty }),

        (1u64..500u64).prop_map(|oid| BookOp::Delete { order_id: oid }),

        (1u64..500u64, 500u64..1_000u64, 9_800u32..10_600u32, 1u32..5_000u32)
            .prop_map(|(oid, new_oid, px, qty)| BookOp::Replace {
                order_id: oid,
                new_order_id: new_oid,
                price: px,
                qty,
            }),
    ]
}

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}
