use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::*;

#[derive(Debug)]
struct Client(#[allow(dead_code)] u32);

#[derive(Debug)]
struct View;

#[test]
fn test_register_is_idempotent() {
    let reg = Registry::new();
    let client = Arc::new(Client(1));

    let a = reg.register(&client);
    let b = reg.register(&client);

    assert_eq!(a, b);
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_identity_is_by_reference() {
    let reg = Registry::new();
    let first = Arc::new(Client(7));
    let second = Arc::new(Client(7));

    let a = reg.register(&first);
    let b = reg.register(&second);
    assert_ne!(a, b);

    // A clone of the Arc is the same instance.
    let alias = first.clone();
    assert_eq!(reg.id_of(&alias), Some(a));
}

#[test]
fn test_get_resolves_and_checks_type() {
    let reg = Registry::new();
    let client = Arc::new(Client(3));
    let id = reg.register(&client);

    let back: Arc<Client> = reg.get(id).expect("client should resolve");
    assert!(Arc::ptr_eq(&back, &client));

    assert!(reg.get::<View>(id).is_none());
    assert!(reg.get::<Client>(BridgeId(9999)).is_none());
}

#[test]
fn test_remove_returns_id_once() {
    let reg = Registry::new();
    let client = Arc::new(Client(1));
    let id = reg.register(&client);

    assert_eq!(reg.remove(&client), Some(id));
    assert_eq!(reg.remove(&client), None);
    assert!(reg.get::<Client>(id).is_none());
    assert!(reg.id_of(&client).is_none());
}

#[test]
fn test_remove_unregistered_is_none() {
    let reg = Registry::new();
    let view = Arc::new(View);
    assert_eq!(reg.remove(&view), None);
}

#[test]
fn test_ids_are_not_reused_after_removal() {
    let reg = Registry::new();
    let a = Arc::new(Client(1));
    let id_a = reg.register(&a);
    reg.remove(&a);

    let b = Arc::new(Client(2));
    let id_b = reg.register(&b);
    assert_ne!(id_a, id_b);

    // Re-registering a removed instance yields a fresh id.
    let id_a2 = reg.register(&a);
    assert_ne!(id_a, id_a2);
}

#[test]
fn test_insert_with_id() {
    let reg = Registry::new();
    let view = Arc::new(View);
    reg.insert_with_id(&view, BridgeId(1)).unwrap();
    assert_eq!(reg.id_of(&view), Some(BridgeId(1)));

    // Same binding again is fine.
    reg.insert_with_id(&view, BridgeId(1)).unwrap();

    let other = Arc::new(View);
    assert_eq!(reg.insert_with_id(&other, BridgeId(1)), Err(Error::IdInUse(BridgeId(1))));
    assert_eq!(reg.insert_with_id(&view, BridgeId(2)), Err(Error::AlreadyRegistered(BridgeId(1))));

    // Allocation skips the adopted id.
    let client = Arc::new(Client(0));
    assert_eq!(reg.register(&client), BridgeId(2));
}

#[test]
fn test_remove_id_and_clear() {
    let reg = Registry::new();
    let a = Arc::new(Client(1));
    let b = Arc::new(View);
    let id_a = reg.register(&a);
    let id_b = reg.register(&b);

    assert!(reg.remove_id(id_a));
    assert!(!reg.remove_id(id_a));
    assert!(reg.id_of(&a).is_none());
    assert!(reg.contains(id_b));

    reg.clear();
    assert!(reg.is_empty());
    assert!(reg.id_of(&b).is_none());

    let c = Arc::new(View);
    assert!(reg.register(&c).0 > id_b.0);
}

#[test]
fn test_unsized_handles() {
    let reg = Registry::new();
    let client = Arc::new(Client(5));
    let id = reg.register(&client);

    let erased: Arc<dyn std::fmt::Debug + Send + Sync> = client.clone();
    assert_eq!(reg.id_of(&erased), Some(id));
    assert_eq!(reg.remove(&erased), Some(id));
}

/// Random register/remove walk checked against a model after every step.
#[test]
fn test_bijection_under_random_operations() {
    let reg = Registry::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let pool: Vec<Arc<Client>> = (0..16).map(|i| Arc::new(Client(i))).collect();
    let mut live: HashMap<usize, BridgeId> = HashMap::new();
    let mut issued: HashSet<BridgeId> = HashSet::new();

    for _ in 0..2000 {
        let idx = rng.gen_range(0..pool.len());
        let handle = &pool[idx];

        if rng.gen_bool(0.6) {
            let id = reg.register(handle);
            match live.get(&idx) {
                Some(prev) => assert_eq!(*prev, id),
                None => {
                    assert!(issued.insert(id), "id {} issued twice", id);
                    live.insert(idx, id);
                }
            }
        } else {
            assert_eq!(reg.remove(handle), live.remove(&idx));
        }

        assert_eq!(reg.len(), live.len());
        for (idx, id) in &live {
            assert_eq!(reg.id_of(&pool[*idx]), Some(*id));
            let back: Arc<Client> = reg.get(*id).unwrap();
            assert!(Arc::ptr_eq(&back, &pool[*idx]));
        }
    }
}
