#![cfg(test)]

// Property tests for Shared and RefCount kept inside the crate so they can
// check handle state against the control block directly.

use crate::ref_count::RefCount;
use crate::shared::Shared;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Drops are recorded per value id so double drops are visible.
struct Tracked {
    id: usize,
    drops: Arc<Vec<AtomicUsize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops[self.id].fetch_add(1, Ordering::SeqCst);
    }
}

const SLOTS: usize = 6;
const VALUES: usize = 8;

#[derive(Copy, Clone, Debug)]
enum Op {
    Make(usize),
    Adopt(usize),
    CloneInto(usize, usize),
    Assign(usize, usize),
    Swap(usize, usize),
    Reset(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let slot = 0..SLOTS;
    let op = prop_oneof![
        slot.clone().prop_map(Op::Make),
        slot.clone().prop_map(Op::Adopt),
        (slot.clone(), slot.clone()).prop_map(|(a, b)| Op::CloneInto(a, b)),
        (slot.clone(), slot.clone()).prop_map(|(a, b)| Op::Assign(a, b)),
        (slot.clone(), slot.clone()).prop_map(|(a, b)| Op::Swap(a, b)),
        slot.prop_map(Op::Reset),
    ];
    proptest::collection::vec(op, 1..80)
}

// Property: slot-by-slot equivalence against a model of which value each
// slot owns.
// - strong_count equals the number of slots owning the same value.
// - A value is dropped exactly once, right when its last slot lets go.
// - Equality between slots is identity of the owned value.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_ownership_model(ops in arb_ops()) {
        let drops: Arc<Vec<AtomicUsize>> = Arc::new((0..VALUES).map(|_| AtomicUsize::new(0)).collect());
        let mut slots: Vec<Shared<Tracked>> = (0..SLOTS).map(|_| Shared::empty()).collect();
        let mut model: Vec<Option<usize>> = vec![None; SLOTS];
        let mut next_id = 0usize;

        for op in ops {
            match op {
                Op::Make(i) | Op::Adopt(i) if next_id < VALUES => {
                    let t = Tracked { id: next_id, drops: drops.clone() };
                    slots[i] = match op {
                        Op::Make(_) => Shared::new(t),
                        _ => Shared::from_box(Box::new(t)),
                    };
                    model[i] = Some(next_id);
                    next_id += 1;
                }
                Op::Make(_) | Op::Adopt(_) => {}
                Op::CloneInto(i, j) => {
                    slots[j] = slots[i].clone();
                    model[j] = model[i];
                }
                Op::Assign(i, j) => {
                    let src = slots[i].clone();
                    slots[j].assign(&src);
                    model[j] = model[i];
                }
                Op::Swap(i, j) => {
                    if i != j {
                        let (lo, hi) = (i.min(j), i.max(j));
                        let (a, b) = slots.split_at_mut(hi);
                        a[lo].swap(&mut b[0]);
                        model.swap(i, j);
                    }
                }
                Op::Reset(i) => {
                    slots[i].reset();
                    model[i] = None;
                }
            }

            for (s, m) in slots.iter().zip(&model) {
                match m {
                    Some(id) => {
                        prop_assert_eq!(s.id, *id);
                        let owners = model.iter().filter(|x| **x == Some(*id)).count();
                        prop_assert_eq!(s.strong_count(), owners);
                    }
                    None => prop_assert!(s.is_empty()),
                }
            }
            for a in 0..SLOTS {
                for b in 0..SLOTS {
                    prop_assert_eq!(slots[a] == slots[b], model[a] == model[b]);
                }
            }
            for id in 0..next_id {
                let live = model.contains(&Some(id));
                let dropped = drops[id].load(Ordering::SeqCst);
                prop_assert_eq!(dropped, if live { 0 } else { 1 });
            }
        }

        drop(slots);
        for id in 0..next_id {
            prop_assert_eq!(drops[id].load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn prop_refcount_clone_drop_balance(clones in 0usize..64, drop_order in proptest::collection::vec(any::<usize>(), 0..64)) {
        let drops: Arc<Vec<AtomicUsize>> = Arc::new(vec![AtomicUsize::new(0)]);
        let t = Tracked { id: 0, drops: drops.clone() };
        let (first, _) = RefCount::try_new_in_place(crate::Global, || Ok::<_, ()>(t)).map_err(|_| TestCaseError::fail("alloc"))?;
        let mut handles: Vec<RefCount> = (0..clones).map(|_| first.clone()).collect();
        handles.push(first);
        prop_assert_eq!(handles[0].use_count(), clones + 1);

        for k in drop_order {
            if handles.len() <= 1 {
                break;
            }
            let idx = k % handles.len();
            drop(handles.swap_remove(idx));
            prop_assert_eq!(handles[0].use_count(), handles.len());
            prop_assert_eq!(drops[0].load(Ordering::SeqCst), 0);
        }
        drop(handles);
        prop_assert_eq!(drops[0].load(Ordering::SeqCst), 1);
    }
}
