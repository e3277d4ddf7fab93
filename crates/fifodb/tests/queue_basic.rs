//! Single-threaded queue behavior over the reference store.

use fifodb::{
    KeyCodec, KeyWidth, MemoryStore, PersistentQueue, Prefix, StatsSnapshot, Store,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng() -> StdRng {
    StdRng::seed_from_u64(0xF1F0_D8)
}

fn random_value(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(50..3000);
    (0..len).map(|_| rng.gen()).collect()
}

fn wide_codec() -> KeyCodec {
    KeyCodec::with_prefix(KeyWidth::U32, Prefix::new(1, 231)).unwrap()
}

fn narrow_codec() -> KeyCodec {
    KeyCodec::with_prefix(KeyWidth::U16, Prefix::new(1, 231)).unwrap()
}

fn assert_drained<S: Store>(queue: &PersistentQueue<'_, S>) {
    assert_eq!(queue.top().unwrap(), None);
    assert!(!queue.pop().unwrap());
    assert_eq!(queue.poll().unwrap(), None);
    assert_eq!(queue.len(), 0);
    assert!(queue.is_empty());
}

#[test]
fn fresh_queue_lifecycle() {
    let mut rng = rng();
    let store = MemoryStore::new();
    let queue = PersistentQueue::open(&store, wide_codec()).unwrap();
    assert_eq!(queue.stats(), StatsSnapshot::default());
    assert_drained(&queue);

    // Push then pop.
    let value = random_value(&mut rng);
    assert!(queue.push(&value).unwrap());
    assert_eq!(queue.top().unwrap(), Some(value.clone()));
    assert_eq!(queue.len(), 1);
    assert!(queue.pop().unwrap());
    assert_drained(&queue);

    // Push then poll.
    let value = random_value(&mut rng);
    assert!(queue.push(&value).unwrap());
    assert_eq!(queue.top().unwrap(), Some(value.clone()));
    assert_eq!(queue.poll().unwrap(), Some(value));
    assert_drained(&queue);

    // Two items, polled in order.
    let first = random_value(&mut rng);
    let second = random_value(&mut rng);
    assert!(queue.push(&first).unwrap());
    assert_eq!(queue.len(), 1);
    assert!(queue.push(&second).unwrap());
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.top().unwrap(), Some(first.clone()));
    assert_eq!(queue.poll().unwrap(), Some(first));
    assert_eq!(queue.top().unwrap(), Some(second.clone()));
    assert_eq!(queue.poll().unwrap(), Some(second));
    assert_drained(&queue);

    // Two items, popped blindly.
    let first = random_value(&mut rng);
    let second = random_value(&mut rng);
    assert!(queue.push(&first).unwrap());
    assert!(queue.push(&second).unwrap());
    assert_eq!(queue.top().unwrap(), Some(first));
    assert!(queue.pop().unwrap());
    assert_eq!(queue.top().unwrap(), Some(second));
    assert!(queue.pop().unwrap());
    assert_drained(&queue);

    // Bulk fill.
    for i in 0..100 {
        assert!(queue.push(&random_value(&mut rng)).unwrap());
        assert_eq!(queue.len(), i + 1);
    }

    // No concurrency happened, so no retries, yields, or misses.
    assert_eq!(queue.stats(), StatsSnapshot::default());
}

#[test]
fn restart_preserves_items_in_order() {
    let mut rng = rng();
    let store = MemoryStore::new();
    let mut pushed = Vec::new();

    {
        let queue = PersistentQueue::open(&store, wide_codec()).unwrap();
        for _ in 0..100 {
            let value = random_value(&mut rng);
            assert!(queue.push(&value).unwrap());
            pushed.push(value);
        }
    }

    // A new engine instance over the same store recovers everything.
    let queue = PersistentQueue::open(&store, wide_codec()).unwrap();
    assert_eq!(queue.len(), 100);
    assert_eq!(queue.stats().shift_down_count, 0);
    for expected in &pushed {
        assert_eq!(queue.poll().unwrap().as_ref(), Some(expected));
    }
    assert_drained(&queue);
}

#[test]
fn reopen_continues_the_id_sequence() {
    let mut rng = rng();
    let store = MemoryStore::new();

    {
        let queue = PersistentQueue::open(&store, wide_codec()).unwrap();
        for _ in 0..100 {
            assert!(queue.push(&random_value(&mut rng)).unwrap());
        }
    }

    let queue = PersistentQueue::open(&store, wide_codec()).unwrap();
    assert_eq!(queue.len(), 100);
    assert!(queue.poll().unwrap().is_some());
    assert_eq!(queue.len(), 99);
    assert!(queue.push(&random_value(&mut rng)).unwrap());
    assert_eq!(queue.len(), 100);
    assert!(queue.push(&random_value(&mut rng)).unwrap());
    assert_eq!(queue.len(), 101);
    assert!(queue.pop().unwrap());
    assert_eq!(queue.len(), 100);
    assert!(queue.pop().unwrap());
    assert_eq!(queue.len(), 99);
    assert_eq!(queue.stats(), StatsSnapshot::default());
}

#[test]
fn unprefixed_codec_sees_a_prefixed_sibling() {
    let mut rng = rng();
    let store = MemoryStore::new();
    let mut pushed = Vec::new();

    {
        let queue = PersistentQueue::open_with_limit(&store, narrow_codec(), 20).unwrap();
        for _ in 0..99 {
            let value = random_value(&mut rng);
            assert!(queue.push(&value).unwrap());
            pushed.push(value);
        }
    }

    // An unprefixed 16-bit codec owns the whole key space, so the
    // prefixed queue's records decode as ids with the prefix byte folded
    // in. The recovery walk starts from a far-from-zero head.
    let codec = KeyCodec::new(KeyWidth::U16);
    let queue = PersistentQueue::open_with_limit(&store, codec, 20).unwrap();
    assert_eq!(queue.len(), 99);
    for expected in &pushed {
        assert_eq!(queue.poll().unwrap().as_ref(), Some(expected));
    }
    assert_drained(&queue);

    // The drained queue keeps working from its recovered position.
    let value = random_value(&mut rng);
    assert!(queue.push(&value).unwrap());
    assert_eq!(queue.top().unwrap(), Some(value.clone()));
    assert_eq!(queue.len(), 1);
    assert!(queue.pop().unwrap());
    assert_drained(&queue);

    let value = random_value(&mut rng);
    assert!(queue.push(&value).unwrap());
    assert_eq!(queue.poll().unwrap(), Some(value));
    assert_drained(&queue);

    assert_eq!(queue.stats(), StatsSnapshot::default());
}

#[test]
fn values_are_stored_verbatim() {
    let store = MemoryStore::new();
    let codec = wide_codec();
    let queue = PersistentQueue::open(&store, codec).unwrap();
    assert!(queue.push(b"").unwrap());
    assert!(queue.push(&[0u8; 4]).unwrap());
    assert_eq!(queue.poll().unwrap(), Some(Vec::new()));
    assert_eq!(queue.poll().unwrap(), Some(vec![0u8; 4]));

    // The key on disk is exactly the big-endian prefixed id, the value
    // exactly the payload.
    assert!(queue.push(b"payload").unwrap());
    let raw = store.get(codec.to_key(2).as_bytes()).unwrap();
    assert_eq!(raw.as_deref(), Some(&b"payload"[..]));
}
