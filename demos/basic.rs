use handle_map::HandleMap;

fn main() {
    // 1. Create a map with type tag 1 and room for a few items
    // 1. 创建一个类型标签为 1、预留少量空间的 map
    let mut map = HandleMap::with_capacity(1, 8);

    // 2. Insert values and keep the handles
    // 2. 插入值并保留 handle
    println!("Inserting values...");
    let alice = map.insert("Alice");
    let bob = map.insert("Bob");
    let charlie = map.insert("Charlie");

    // 3. Handles resolve to their items in O(1)
    // 3. handle 以 O(1) 解析到各自的条目
    println!("\nAccessing values:");
    println!("alice:   {:?}", map.get(alice));
    println!("bob:     {:?}", map.get(bob));
    println!("charlie: {:?}", map.get(charlie));

    // 4. Modify a value in place
    // 4. 就地修改值
    *map.at_mut(bob) = "Bob Updated";
    println!("bob after update: {:?}", map.get(bob));

    // 5. Removal frees the slot and makes the handle stale
    // 5. 删除释放 slot 并使 handle 过期
    println!("\nRemoving bob: {:?}", map.remove(bob));
    println!("bob is_valid: {}", map.is_valid(bob));

    // The dense store stays compact: charlie moved into the gap
    // 密集存储保持紧凑：charlie 填入了空洞
    println!("charlie still resolves: {:?}", map.get(charlie));
    println!("dense items: {:?}", map.items());

    // 6. The freed slot is recycled with a new generation
    // 6. 被释放的 slot 以新代数被回收
    let dave = map.insert("Dave");
    println!("\ndave reuses slot {} generation {}", dave.index(), dave.generation());
    println!("stale bob still invalid: {}", map.is_valid(bob));

    // 7. Defragmentation restores a caller-defined order, a bounded
    //    number of relocations at a time
    // 7. 碎片整理按调用者定义的顺序恢复排序，每次只做有限次移动
    let swaps = map.defragment(|a, b| a > b, 0);
    println!("\ndefragment performed {swaps} relocations");
    println!("dense items now: {:?}", map.items());

    // 8. Iterate in dense order, handles included
    // 8. 按密集顺序遍历，包含 handle
    println!("\nAll entries:");
    for (handle, value) in map.iter() {
        println!("  [{}v{}] {}", handle.index(), handle.generation(), value);
    }
}
