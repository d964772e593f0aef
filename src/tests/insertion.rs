// Insertion and slot allocation comprehensive tests
// 插入和 slot 分配的全面测试

use crate::{FREE_LIST_END, Handle, HandleMap};
use std::collections::HashSet;

#[test]
fn test_insert_round_trip() {
    let mut map = HandleMap::new(0);

    let handle = map.insert("value".to_string());

    assert_eq!(map.get(handle), Some(&"value".to_string()));
}

#[test]
fn test_sequential_inserts_use_fresh_slots() {
    let mut map = HandleMap::new(0);

    for expected_index in 0..10u32 {
        let handle = map.insert(expected_index);
        assert_eq!(handle.index(), expected_index);
        assert_eq!(handle.generation(), 1);
    }
}

#[test]
fn test_handle_uniqueness() {
    let mut map = HandleMap::new(0);

    // N sequential inserts yield pairwise distinct 64-bit values
    // N 次连续插入产生两两不同的 64 位值
    let mut raws = HashSet::new();
    for i in 0..100 {
        let handle = map.insert(i);
        assert!(raws.insert(handle.raw()), "duplicate handle issued");
    }
}

#[test]
fn test_insert_marks_fragmented() {
    let mut map = HandleMap::new(0);
    assert!(!map.is_fragmented());

    map.insert(1);

    assert!(map.is_fragmented());
}

#[test]
fn test_insert_with_passes_own_handle() {
    let mut map = HandleMap::new(2);

    let handle = map.insert_with(|own| (own, 42));

    let &(stored, value) = map.at(handle);
    assert_eq!(stored, handle);
    assert_eq!(value, 42);
}

#[test]
fn test_insert_many_returns_handles_in_order() {
    let mut map = HandleMap::new(0);

    let handles = map.insert_many(vec![10, 20, 30]);

    assert_eq!(handles.len(), 3);
    assert_eq!(map.len(), 3);
    for (i, &handle) in handles.iter().enumerate() {
        assert_eq!(map.get(handle), Some(&((i as i32 + 1) * 10)));
    }
}

#[test]
fn test_insert_many_reserves_capacity() {
    let mut map = HandleMap::new(0);

    map.insert_many(0..64);

    assert!(map.capacity() >= 64);
    assert_eq!(map.len(), 64);
}

#[test]
fn test_insert_many_with_empty_iterator() {
    let mut map: HandleMap<i32> = HandleMap::new(0);

    let handles = map.insert_many(std::iter::empty());

    assert!(handles.is_empty());
    assert!(map.is_empty());
}

#[test]
fn test_insert_pops_free_list_front() {
    let mut map = HandleMap::new(0);

    let handles: Vec<_> = (0..4).map(|i| map.insert(i)).collect();

    // Free slots 1 and 3, in that order
    // 依次释放 slot 1 和 3
    map.remove(handles[1]);
    map.remove(handles[3]);
    assert_eq!(map.free_list_front(), 1);
    assert_eq!(map.free_list_back(), 3);

    // FIFO: reuse spreads over the freed slots front-first
    // FIFO：复用从头部开始分布到被释放的 slot 上
    let reuse_a = map.insert(100);
    assert_eq!(reuse_a.index(), 1);
    let reuse_b = map.insert(200);
    assert_eq!(reuse_b.index(), 3);

    // The list drained, both cursors must show the sentinel
    // 列表已耗尽，两个游标都必须是哨兵值
    assert_eq!(map.free_list_front(), FREE_LIST_END);
    assert_eq!(map.free_list_back(), FREE_LIST_END);
}

#[test]
fn test_reused_slot_points_at_dense_tail() {
    let mut map = HandleMap::new(0);

    let a = map.insert('a');
    let b = map.insert('b');
    map.insert('c');
    map.remove(a);

    // The recycled slot must point at the dense position the new item takes
    // 被回收的 slot 必须指向新条目占据的密集位置
    let d = map.insert('d');
    assert_eq!(d.index(), 0);
    assert_eq!(map.inner_index(d) as usize, map.len() - 1);
    assert_eq!(map.get(d), Some(&'d'));
    assert_eq!(map.get(b), Some(&'b'));
}

#[test]
fn test_documented_scenario() {
    // Container with type tag 5 and reserve 4
    // 类型标签为 5、预留 4 的容器
    let mut map = HandleMap::with_capacity(5, 4);

    let ha = map.insert("A");
    let hb = map.insert("B");
    let hc = map.insert("C");

    assert_eq!((ha.index(), ha.generation()), (0, 1));
    assert_eq!((hb.index(), hb.generation()), (1, 1));
    assert_eq!((hc.index(), hc.generation()), (2, 1));

    map.remove(hb);
    assert_eq!(map.len(), 2);
    assert!(!map.is_valid(hb));
    assert_eq!(map.get(ha), Some(&"A"));
    assert_eq!(map.get(hc), Some(&"C"));

    // Slot index 1 is reused with generation 2
    // slot 索引 1 以代数 2 被复用
    let hd = map.insert("D");
    assert_eq!((hd.index(), hd.generation()), (1, 2));
    assert_ne!(hd, hb);
    assert_eq!(map.get(hd), Some(&"D"));
}

#[test]
fn test_insert_after_drain_reuses_all_slots() {
    let mut map = HandleMap::new(0);

    let first: Vec<Handle> = (0..8).map(|i| map.insert(i)).collect();
    for &handle in &first {
        map.remove(handle);
    }

    // Refill: every insert recycles a slot, none are appended
    // 重新填充：每次插入都回收 slot，不追加新 slot
    for i in 0..8 {
        let handle = map.insert(i + 100);
        assert!(handle.index() < 8);
        assert_eq!(handle.generation(), 2);
    }
    assert_eq!(map.sparse_ids().len(), 8);
}
