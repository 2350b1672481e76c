// tests/threshold_properties.rs

use std::sync::{Arc, Barrier};
use std::thread;

use equinox_automation::task::{InputDecision, MultipleInputBuffer};
use proptest::prelude::*;

/// Owners as (index, succeeds), in arrival order.
fn arrivals_strategy() -> impl Strategy<Value = Vec<(usize, bool)>> {
    (2usize..8).prop_flat_map(|n| {
        proptest::collection::vec(any::<bool>(), n).prop_flat_map(|outcomes| {
            let owners: Vec<(usize, bool)> = outcomes.into_iter().enumerate().collect();
            Just(owners).prop_shuffle()
        })
    })
}

proptest! {
    #[test]
    fn follower_fires_once_iff_at_least_two_owners_succeed(arrivals in arrivals_strategy()) {
        let n = arrivals.len();
        let buffer = MultipleInputBuffer::new("M", n).unwrap();

        let mut fired = Vec::new();
        for (owner, succeeds) in &arrivals {
            let name = format!("owner{owner}");
            let decision = if *succeeds {
                buffer.add_input(&name, *owner)
            } else {
                buffer.input_failed(&name)
            };
            if let InputDecision::Fire(values) = decision {
                fired.push(values);
            }
        }

        let successes: Vec<usize> = arrivals
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(owner, _)| *owner)
            .collect();

        if successes.len() >= 2 {
            prop_assert_eq!(fired, vec![successes]);
            prop_assert!(buffer.has_fired());
        } else {
            prop_assert!(fired.is_empty());
            prop_assert!(!buffer.has_fired());
        }
    }

    #[test]
    fn threshold_never_drops_below_one(failures in 0usize..10, threshold in 1usize..6) {
        let buffer: MultipleInputBuffer<u8> = MultipleInputBuffer::new("M", threshold).unwrap();
        for i in 0..failures {
            buffer.input_failed(&format!("o{i}"));
        }
        prop_assert!(buffer.threshold() >= 1);
        if failures > 0 && threshold.saturating_sub(failures) < 2 {
            prop_assert!(buffer.is_abandoned());
        }
    }
}

#[test]
fn concurrent_owners_fire_exactly_once() {
    const OWNERS: usize = 16;

    for _ in 0..20 {
        let buffer = Arc::new(MultipleInputBuffer::new("M", OWNERS).unwrap());
        let barrier = Arc::new(Barrier::new(OWNERS));

        let handles: Vec<_> = (0..OWNERS)
            .map(|i| {
                let buffer = Arc::clone(&buffer);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    buffer.add_input(&format!("o{i}"), i).fires()
                })
            })
            .collect();

        let fires = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(fires, 1);
        let mut inputs = buffer.inputs();
        inputs.sort_unstable();
        assert_eq!(inputs, (0..OWNERS).collect::<Vec<_>>());
    }
}
