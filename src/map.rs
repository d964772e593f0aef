use crate::handle::{FIRST_GENERATION, FREE_LIST_END, Handle};
use crate::utils::{likely, unlikely};
use std::ops::{Index, IndexMut};

/// Diagnostic for contract-tier accessors, kept out of the hot path
///
/// 契约层访问器的诊断报告，保持在热路径之外
#[cold]
#[inline(never)]
fn invalid_handle(handle: Handle) -> ! {
    panic!("handle does not refer to a live item: {handle:?}");
}

/// Per-dense-position metadata record
///
/// `dense_to_sparse` names the sparse slot that currently owns the dense
/// position. It closes the loop needed for O(1) swap-removal and for
/// rewriting slot links while defragmentation relocates items.
///
/// 每个密集位置的元数据记录
///
/// `dense_to_sparse` 记录当前拥有该密集位置的稀疏 slot，
/// 用于 O(1) 交换删除以及碎片整理移动条目时回写 slot 链接。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    /// Sparse-table index owning this dense position
    ///
    /// 拥有该密集位置的稀疏表索引
    pub dense_to_sparse: u32,
}

/// HandleMap stores items contiguously while clients hold stable handles
///
/// The sparse table adds one level of indirection between a handle and the
/// dense item array, so items can be relocated (swap-removal, incremental
/// defragmentation) without invalidating handles. Every slot carries a
/// generation that is incremented when the slot is freed, making stale
/// handles detectable, plus the map's fixed 15-bit type tag, making handles
/// from another map detectable. Free slots form an embedded FIFO freelist:
/// erase pushes to the back, insert pops from the front, spreading reuse
/// across slots and delaying generation wraparound.
///
/// HandleMap 连续存储条目，客户端只持有稳定的 handle
///
/// 稀疏表在 handle 与密集条目数组之间增加一层间接：条目可以被移动
/// （交换删除、增量碎片整理）而不会使 handle 失效。每个 slot 携带
/// 一个代数，在 slot 被释放时递增，从而可以检测过期 handle；还携带
/// map 固定的 15 位类型标签，从而可以检测来自其他 map 的 handle。
/// 空闲 slot 构成内嵌的 FIFO 空闲列表：删除推入尾部，插入从头部取出，
/// 将复用分散到各个 slot 上，延迟代数回绕。
///
/// # Lookup tiers (查找层级)
///
/// Two tiers, never mixed: [`is_valid`](Self::is_valid), [`get`](Self::get),
/// [`get_mut`](Self::get_mut), [`remove`](Self::remove) treat a stale or
/// foreign handle as an expected outcome and report it via `bool`/`Option`;
/// [`at`](Self::at), [`at_mut`](Self::at_mut),
/// [`inner_index`](Self::inner_index) and indexing require a valid handle
/// and panic otherwise, in every build configuration.
///
/// 两个层级，绝不混用：软层级将过期或外来 handle 视为预期结果，
/// 通过 `bool`/`Option` 报告；契约层级要求 handle 有效，否则在任何
/// 构建配置下都会 panic。
///
/// # Examples (示例)
///
/// ```
/// use handle_map::HandleMap;
///
/// let mut map = HandleMap::new(1);
///
/// let handle = map.insert("alpha");
/// assert_eq!(map.get(handle), Some(&"alpha"));
///
/// assert_eq!(map.remove(handle), Some("alpha"));
/// assert!(!map.is_valid(handle));
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandleMap<T> {
    free_list_front: u32, // Freelist head, FREE_LIST_END when empty | 空闲列表头部，空时为 FREE_LIST_END
    free_list_back: u32,  // Freelist tail, FREE_LIST_END when empty | 空闲列表尾部，空时为 FREE_LIST_END
    item_type_id: u16,    // Fixed tag stamped into every handle | 写入每个 handle 的固定标签
    fragmented: bool,     // Set by insert/erase, cleared by a full defragment pass | 由插入/删除置位，完整碎片整理后清除
    sparse_ids: Vec<Handle>,
    items: Vec<T>,
    meta: Vec<Meta>,
}

impl<T> HandleMap<T> {
    /// Create an empty HandleMap with the given type tag
    ///
    /// The tag is stamped into every handle this map produces and checked
    /// on every lookup, so handles cannot be redeemed against another map.
    /// Only the low 15 bits are representable.
    ///
    /// 使用给定的类型标签创建空 HandleMap
    ///
    /// 标签写入该 map 产生的每个 handle，并在每次查找时校验，
    /// 因此 handle 无法在其他 map 上兑换。仅低 15 位可表示。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let map: HandleMap<i32> = HandleMap::new(1);
    /// assert!(map.is_empty());
    /// assert_eq!(map.item_type_id(), 1);
    /// ```
    #[inline(always)]
    pub fn new(item_type_id: u16) -> Self {
        Self::with_capacity(item_type_id, 0)
    }

    /// Create a HandleMap with space reserved for `capacity` items
    ///
    /// Reserves the sparse table, the dense store and the metadata array.
    ///
    /// 创建一个为 `capacity` 个条目预留空间的 HandleMap
    ///
    /// 预留稀疏表、密集存储和元数据数组。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let map: HandleMap<i32> = HandleMap::with_capacity(5, 16);
    /// assert!(map.capacity() >= 16);
    /// assert_eq!(map.len(), 0);
    /// ```
    #[inline]
    pub fn with_capacity(item_type_id: u16, capacity: usize) -> Self {
        debug_assert!(
            item_type_id <= Handle::MAX_TYPE_ID,
            "item_type_id exceeds 15 bits"
        );
        Self {
            free_list_front: FREE_LIST_END,
            free_list_back: FREE_LIST_END,
            item_type_id: item_type_id & Handle::MAX_TYPE_ID,
            fragmented: false,
            sparse_ids: Vec::with_capacity(capacity),
            items: Vec::with_capacity(capacity),
            meta: Vec::with_capacity(capacity),
        }
    }

    /// True while the freelist holds no recyclable slot
    ///
    /// 空闲列表中没有可回收 slot 时为真
    #[inline(always)]
    fn free_list_empty(&self) -> bool {
        self.free_list_front == FREE_LIST_END
    }

    /// Activate a slot for the next dense position and return its handle
    ///
    /// Pops the freelist front when possible, otherwise appends a fresh
    /// slot with generation 1. The slot's inner index is pointed at the
    /// current dense size; the caller must push the item right after.
    ///
    /// 为下一个密集位置激活一个 slot 并返回其 handle
    ///
    /// 尽可能从空闲列表头部取出，否则以代数 1 追加新 slot。
    /// slot 的内部索引指向当前密集大小；调用者必须随即压入条目。
    fn allocate_slot(&mut self) -> Handle {
        self.fragmented = true;
        let inner_index = self.items.len() as u32;

        if self.free_list_empty() {
            let outer_index = self.sparse_ids.len() as u32;
            self.sparse_ids.push(Handle::pack(
                inner_index,
                FIRST_GENERATION,
                self.item_type_id,
                false,
            ));
            Handle::pack(outer_index, FIRST_GENERATION, self.item_type_id, false)
        } else {
            let outer_index = self.free_list_front;
            let slot = &mut self.sparse_ids[outer_index as usize];

            // A free slot's index field is the next freelist link
            // 空闲 slot 的 index 字段即下一个空闲列表链接
            let next_free = slot.index();
            slot.set_free(false);
            slot.set_index(inner_index);
            let generation = slot.generation();

            self.free_list_front = next_free;
            if self.free_list_empty() {
                self.free_list_back = FREE_LIST_END;
            }

            Handle::pack(outer_index, generation, self.item_type_id, false)
        }
    }

    /// Insert a value, returning its handle
    ///
    /// Amortized O(1). Marks the map fragmented.
    ///
    /// 插入一个值并返回其 handle
    ///
    /// 摊销 O(1)。会将 map 标记为碎片化。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// assert_eq!(map.get(handle), Some(&42));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> Handle {
        let handle = self.allocate_slot();
        self.items.push(value);
        self.meta.push(Meta {
            dense_to_sparse: handle.index(),
        });
        handle
    }

    /// Insert a value constructed from its own handle
    ///
    /// The closure receives the handle the value will be stored under,
    /// which is useful when the item needs to know its own id.
    ///
    /// 插入一个由其自身 handle 构造的值
    ///
    /// 闭包会收到该值将要存储于其下的 handle，
    /// 当条目需要知道自己的 id 时很有用。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::{Handle, HandleMap};
    ///
    /// struct Node {
    ///     own: Handle,
    ///     value: i32,
    /// }
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert_with(|own| Node { own, value: 7 });
    ///
    /// assert_eq!(map.at(handle).own, handle);
    /// assert_eq!(map.at(handle).value, 7);
    /// ```
    pub fn insert_with<F>(&mut self, f: F) -> Handle
    where
        F: FnOnce(Handle) -> T,
    {
        let handle = self.allocate_slot();
        self.items.push(f(handle));
        self.meta.push(Meta {
            dense_to_sparse: handle.index(),
        });
        handle
    }

    /// Insert every value yielded by the iterator
    ///
    /// Reserves from the size hint up front and returns the handles in
    /// insertion order.
    ///
    /// 插入迭代器产出的每个值
    ///
    /// 预先按 size hint 预留空间，并按插入顺序返回 handle。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handles = map.insert_many(0..3);
    ///
    /// assert_eq!(handles.len(), 3);
    /// assert_eq!(map.get(handles[2]), Some(&2));
    /// ```
    pub fn insert_many<I>(&mut self, values: I) -> Vec<Handle>
    where
        I: IntoIterator<Item = T>,
    {
        let iter = values.into_iter();
        let (lower, _) = iter.size_hint();
        self.items.reserve(lower);
        self.meta.reserve(lower);

        let mut handles = Vec::with_capacity(lower);
        for value in iter {
            handles.push(self.insert(value));
        }
        handles
    }

    /// Remove the item referred to by the handle
    ///
    /// Returns `None` with no effect if the handle is stale, foreign or out
    /// of bounds. Otherwise O(1): the slot is freed (generation bumped, so
    /// remaining copies of the handle go stale) and pushed to the freelist
    /// back, and the dense gap is closed by swapping the tail item in and
    /// repointing the tail's owning slot.
    ///
    /// 删除 handle 指向的条目
    ///
    /// 若 handle 已过期、来自其他 map 或越界，返回 `None` 且无副作用。
    /// 否则为 O(1)：slot 被释放（代数递增，该 handle 的其余拷贝随之
    /// 失效）并推入空闲列表尾部；密集数组的空洞由尾部条目换入填补，
    /// 同时回写尾部条目所属 slot 的内部索引。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// assert_eq!(map.remove(handle), Some(42));
    /// assert_eq!(map.remove(handle), None);
    /// ```
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if unlikely(!self.is_valid(handle)) {
            return None;
        }
        self.fragmented = true;

        let outer_index = handle.index();
        let slot = &mut self.sparse_ids[outer_index as usize];
        let inner_index = slot.index() as usize;

        // Free the slot before touching the dense arrays
        // 先释放 slot，再处理密集数组
        slot.set_free(true);
        slot.bump_generation();
        slot.set_index(FREE_LIST_END);

        if self.free_list_empty() {
            self.free_list_front = outer_index;
            self.free_list_back = outer_index;
        } else {
            self.sparse_ids[self.free_list_back as usize].set_index(outer_index);
            self.free_list_back = outer_index;
        }

        // Close the dense gap by swapping the tail in. When the erased item
        // already is the tail there is no relocation, and no slot may be
        // rewritten: the erased slot's index field now carries its freelist
        // link.
        // 通过换入尾部条目填补密集空洞。被删条目本身就是尾部时没有
        // 移动发生，也不能回写任何 slot：被删 slot 的 index 字段
        // 此时承载的是空闲列表链接。
        let last = self.items.len() - 1;
        if inner_index != last {
            self.items.swap(inner_index, last);
            self.meta.swap(inner_index, last);
            let owner = self.meta[inner_index].dense_to_sparse as usize;
            self.sparse_ids[owner].set_index(inner_index as u32);
        }

        self.meta.pop();
        self.items.pop()
    }

    /// Remove every handle in the set, returning how many removals succeeded
    ///
    /// No atomicity: stale handles are skipped, the rest are removed, and
    /// partial progress is never rolled back.
    ///
    /// 删除集合中的每个 handle，返回成功删除的数量
    ///
    /// 无原子性：过期 handle 被跳过，其余被删除，部分进度不会回滚。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let a = map.insert(1);
    /// let b = map.insert(2);
    /// map.remove(b);
    ///
    /// // b is already stale, only a is removed
    /// // b 已过期，只有 a 被删除
    /// assert_eq!(map.remove_many(&[a, b]), 1);
    /// ```
    pub fn remove_many(&mut self, handles: &[Handle]) -> usize {
        let mut count = 0;
        for &handle in handles {
            if self.remove(handle).is_some() {
                count += 1;
            }
        }
        count
    }

    /// Check whether a handle refers to a live item
    ///
    /// Never panics: the outer index is bounds-checked, the slot must be
    /// active, and the generation and type tag must match.
    ///
    /// 检查 handle 是否指向存活条目
    ///
    /// 绝不 panic：外部索引经过边界检查，slot 必须处于活跃状态,
    /// 且代数与类型标签必须匹配。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// assert!(map.is_valid(handle));
    /// map.remove(handle);
    /// assert!(!map.is_valid(handle));
    /// ```
    #[inline]
    pub fn is_valid(&self, handle: Handle) -> bool {
        let outer_index = handle.index() as usize;
        if unlikely(outer_index >= self.sparse_ids.len()) {
            return false;
        }
        let slot = self.sparse_ids[outer_index];
        !slot.is_free()
            && slot.generation() == handle.generation()
            && handle.type_id() == self.item_type_id
    }

    /// Get a reference to the item, or `None` for a stale handle
    ///
    /// 获取条目的引用，handle 过期时返回 `None`
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// assert_eq!(map.get(handle), Some(&42));
    /// ```
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let outer_index = handle.index() as usize;
        if unlikely(outer_index >= self.sparse_ids.len()) {
            return None;
        }

        // SAFETY: bounds checked above
        let slot = *unsafe { self.sparse_ids.get_unchecked(outer_index) };

        if likely(
            !slot.is_free()
                && slot.generation() == handle.generation()
                && handle.type_id() == self.item_type_id,
        ) {
            // SAFETY: an active slot always points inside the dense store
            Some(unsafe { self.items.get_unchecked(slot.index() as usize) })
        } else {
            None
        }
    }

    /// Get a mutable reference to the item, or `None` for a stale handle
    ///
    /// 获取条目的可变引用，handle 过期时返回 `None`
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// if let Some(value) = map.get_mut(handle) {
    ///     *value = 100;
    /// }
    /// assert_eq!(map.get(handle), Some(&100));
    /// ```
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let outer_index = handle.index() as usize;
        if unlikely(outer_index >= self.sparse_ids.len()) {
            return None;
        }

        // SAFETY: bounds checked above
        let slot = *unsafe { self.sparse_ids.get_unchecked(outer_index) };

        if likely(
            !slot.is_free()
                && slot.generation() == handle.generation()
                && handle.type_id() == self.item_type_id,
        ) {
            // SAFETY: an active slot always points inside the dense store
            Some(unsafe { self.items.get_unchecked_mut(slot.index() as usize) })
        } else {
            None
        }
    }

    /// Get a reference to the item of a handle the caller knows is valid
    ///
    /// Contract tier: the caller must have established validity, e.g. via
    /// [`is_valid`](Self::is_valid) or by holding a handle from a live
    /// insert.
    ///
    /// 获取调用者确知有效的 handle 的条目引用
    ///
    /// 契约层级：调用者必须已确认有效性，例如通过
    /// [`is_valid`](Self::is_valid) 或持有来自存活插入的 handle。
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, foreign or out of bounds.
    ///
    /// # Panics (恐慌)
    ///
    /// 若 handle 已过期、来自其他 map 或越界则 panic。
    #[inline]
    pub fn at(&self, handle: Handle) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => invalid_handle(handle),
        }
    }

    /// Mutable counterpart of [`at`](Self::at), same contract
    ///
    /// [`at`](Self::at) 的可变版本，契约相同
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, foreign or out of bounds.
    ///
    /// # Panics (恐慌)
    ///
    /// 若 handle 已过期、来自其他 map 或越界则 panic。
    #[inline]
    pub fn at_mut(&mut self, handle: Handle) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => invalid_handle(handle),
        }
    }

    /// The dense-store position backing a handle
    ///
    /// For advanced callers indexing [`items`](Self::items) directly. The
    /// position is only stable until the next mutating call.
    ///
    /// handle 背后的密集存储位置
    ///
    /// 供直接索引 [`items`](Self::items) 的高级调用者使用。
    /// 该位置仅在下一次修改调用前保持稳定。
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, foreign or out of bounds.
    ///
    /// # Panics (恐慌)
    ///
    /// 若 handle 已过期、来自其他 map 或越界则 panic。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert("x");
    ///
    /// let inner = map.inner_index(handle) as usize;
    /// assert_eq!(map.items()[inner], "x");
    /// ```
    #[inline]
    pub fn inner_index(&self, handle: Handle) -> u32 {
        if unlikely(!self.is_valid(handle)) {
            invalid_handle(handle);
        }
        self.sparse_ids[handle.index() as usize].index()
    }

    /// Number of live items
    ///
    /// 存活条目的数量
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the map holds no items
    ///
    /// map 是否不含任何条目
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Capacity of the dense item store
    ///
    /// 密集条目存储的容量
    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// The type tag stamped into every handle this map produces
    ///
    /// 写入该 map 产生的每个 handle 的类型标签
    #[inline]
    pub fn item_type_id(&self) -> u16 {
        self.item_type_id
    }

    /// Whether inserts or erases happened since the last complete
    /// defragmentation pass
    ///
    /// 自上次完整碎片整理以来是否发生过插入或删除
    #[inline]
    pub fn is_fragmented(&self) -> bool {
        self.fragmented
    }

    /// Freelist front: the next slot index an insert will recycle
    ///
    /// [`FREE_LIST_END`](crate::FREE_LIST_END) when the list is empty.
    ///
    /// 空闲列表头部：下一次插入将回收的 slot 索引
    ///
    /// 列表为空时为 [`FREE_LIST_END`](crate::FREE_LIST_END)。
    #[inline]
    pub fn free_list_front(&self) -> u32 {
        self.free_list_front
    }

    /// Freelist back: the slot index erased most recently
    ///
    /// [`FREE_LIST_END`](crate::FREE_LIST_END) when the list is empty.
    ///
    /// 空闲列表尾部：最近被删除的 slot 索引
    ///
    /// 列表为空时为 [`FREE_LIST_END`](crate::FREE_LIST_END)。
    #[inline]
    pub fn free_list_back(&self) -> u32 {
        self.free_list_back
    }

    /// The dense item array, ordered by current physical position
    ///
    /// 密集条目数组，按当前物理位置排列
    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Mutable view of the dense item array
    ///
    /// Values may be mutated in place; the slice cannot grow or shrink, so
    /// the sparse↔dense links stay intact.
    ///
    /// 密集条目数组的可变视图
    ///
    /// 可以就地修改值；切片无法增长或收缩，因此稀疏↔密集链接保持完好。
    #[inline]
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// The metadata array parallel to [`items`](Self::items)
    ///
    /// 与 [`items`](Self::items) 平行的元数据数组
    #[inline]
    pub fn meta(&self) -> &[Meta] {
        &self.meta
    }

    /// The sparse slot table, one entry per issued handle index
    ///
    /// 稀疏 slot 表，每个已签发的 handle 索引对应一个条目
    #[inline]
    pub fn sparse_ids(&self) -> &[Handle] {
        &self.sparse_ids
    }

    /// Iterate over `(handle, &item)` pairs in dense order
    ///
    /// Invalidated by any insert or erase performed during the traversal.
    ///
    /// 按密集顺序遍历 `(handle, &item)` 对
    ///
    /// 遍历期间的任何插入或删除都会使其失效。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// map.insert(1);
    /// map.insert(2);
    ///
    /// let sum: i32 = map.iter().map(|(_, v)| v).sum();
    /// assert_eq!(sum, 3);
    /// ```
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.meta.iter().zip(self.items.iter()).map(|(meta, item)| {
            let slot = self.sparse_ids[meta.dense_to_sparse as usize];
            let handle = Handle::pack(
                meta.dense_to_sparse,
                slot.generation(),
                slot.type_id(),
                false,
            );
            (handle, item)
        })
    }

    /// Mutable counterpart of [`iter`](Self::iter)
    ///
    /// [`iter`](Self::iter) 的可变版本
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// map.insert(1);
    /// map.insert(2);
    ///
    /// for (_, value) in map.iter_mut() {
    ///     *value *= 10;
    /// }
    /// let sum: i32 = map.iter().map(|(_, v)| v).sum();
    /// assert_eq!(sum, 30);
    /// ```
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        let sparse_ids = &self.sparse_ids;
        self.meta
            .iter()
            .zip(self.items.iter_mut())
            .map(move |(meta, item)| {
                let slot = sparse_ids[meta.dense_to_sparse as usize];
                let handle = Handle::pack(
                    meta.dense_to_sparse,
                    slot.generation(),
                    slot.type_id(),
                    false,
                );
                (handle, item)
            })
    }

    /// Remove all items, keeping the sparse table so stale handles stay
    /// detectable
    ///
    /// O(n) in the sparse-table size: every slot is freed with a bumped
    /// generation and the whole table is rethreaded into one fresh
    /// freelist (slot 0 at the front, the last slot at the back). Every
    /// handle issued before the call fails validity afterwards. Prefer
    /// [`reset`](Self::reset) when that safety is not needed.
    ///
    /// 删除所有条目，保留稀疏表以便过期 handle 仍可被检测
    ///
    /// 与稀疏表大小成线性：每个 slot 被释放并递增代数，整个表被
    /// 重新串成一条新的空闲列表（slot 0 在头部，最后一个 slot 在
    /// 尾部）。调用前签发的所有 handle 此后都无法通过有效性检查。
    /// 不需要这种安全性时可用 [`reset`](Self::reset)。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let handle = map.insert(42);
    ///
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert!(!map.is_valid(handle));
    /// ```
    pub fn clear(&mut self) {
        let size = self.sparse_ids.len();
        if size == 0 {
            return;
        }

        self.items.clear();
        self.meta.clear();

        self.free_list_front = 0;
        self.free_list_back = (size - 1) as u32;
        self.fragmented = false;

        for (i, slot) in self.sparse_ids.iter_mut().enumerate() {
            slot.set_free(true);
            slot.bump_generation();
            slot.set_index(i as u32 + 1);
        }
        self.sparse_ids[size - 1].set_index(FREE_LIST_END);
    }

    /// Remove all items and discard the sparse table, keeping capacity
    ///
    /// O(1) (plus dropping the items). Faster than [`clear`](Self::clear),
    /// but handles issued before the call can alias newly issued handles
    /// once the map is repopulated: the same index/generation pairs are
    /// handed out again. This is a documented hazard, not a bug — callers
    /// must guarantee no pre-reset handle is dereferenced afterwards.
    ///
    /// 删除所有条目并丢弃稀疏表，保留容量
    ///
    /// O(1)（外加条目的析构）。比 [`clear`](Self::clear) 更快，但在
    /// map 重新填充后，调用前签发的 handle 可能与新签发的 handle
    /// 发生混叠：相同的 index/generation 组合会被再次发出。这是有
    /// 文档记录的风险而非缺陷——调用者必须保证此后不再解引用任何
    /// reset 前的 handle。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let old = map.insert(1);
    ///
    /// map.reset();
    /// assert!(map.is_empty());
    ///
    /// // The first insert after the reset reissues the same raw id
    /// // reset 后的第一次插入会重新发出相同的原始 id
    /// let new = map.insert(2);
    /// assert_eq!(new, old);
    /// ```
    pub fn reset(&mut self) {
        self.free_list_front = FREE_LIST_END;
        self.free_list_back = FREE_LIST_END;
        self.fragmented = false;

        self.items.clear();
        self.meta.clear();
        self.sparse_ids.clear();
    }

    /// Restore an ascending order under `comp`, a bounded step at a time
    ///
    /// In-place insertion sort over the dense store, where
    /// `comp(a, b) == true` means "a must be ordered after b". Every
    /// single-position relocation immediately rewrites the owning sparse
    /// slots of both moved items, so the sparse↔dense links hold at every
    /// intermediate step and handles stay valid throughout.
    ///
    /// The sort is resumable: it returns after `max_swaps` relocations
    /// (0 means run to completion) and every call rescans from the front,
    /// where the comparator short-circuits over the already-sorted prefix.
    /// Repeated bounded calls therefore converge to the fully sorted order
    /// without ever blocking the caller for a full-array sort. A call while
    /// the map is not fragmented is a no-op returning 0; the fragmented
    /// flag is cleared only by a pass that completes within its budget.
    ///
    /// 以有界步长逐步恢复 `comp` 下的升序
    ///
    /// 对密集存储的就地插入排序，`comp(a, b) == true` 表示
    /// “a 必须排在 b 之后”。每次单位置移动都会立即回写两个被移动
    /// 条目所属的稀疏 slot，因此稀疏↔密集链接在每个中间步骤都成立，
    /// handle 全程有效。
    ///
    /// 排序可恢复：完成 `max_swaps` 次移动后返回（0 表示运行到完成），
    /// 每次调用从头重新扫描，比较器在已排序前缀上会立即短路。
    /// 因此反复的有界调用会收敛到完全有序，而不会让调用者阻塞于
    /// 一次全量排序。map 未碎片化时调用是返回 0 的空操作；
    /// 碎片化标志只会被一次在预算内完成的完整扫描清除。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_map::HandleMap;
    ///
    /// let mut map = HandleMap::new(0);
    /// let h3 = map.insert(3);
    /// map.insert(1);
    /// map.insert(2);
    ///
    /// map.defragment(|a, b| a > b, 0);
    ///
    /// assert_eq!(map.items(), &[1, 2, 3]);
    /// // Relocated items are still reachable through their handles
    /// // 被移动的条目仍可通过其 handle 访问
    /// assert_eq!(map.at(h3), &3);
    /// assert!(!map.is_fragmented());
    /// ```
    pub fn defragment<F>(&mut self, mut comp: F, max_swaps: usize) -> usize
    where
        F: FnMut(&T, &T) -> bool,
    {
        if !self.fragmented {
            return 0;
        }

        let len = self.items.len();
        let mut swaps = 0;
        let mut i = 1;

        'pass: while i < len {
            // Sink items[i] leftward one position at a time until ordered
            // 将 items[i] 逐位置左移，直到有序
            let mut j = i;
            while j > 0 && comp(&self.items[j - 1], &self.items[j]) {
                if max_swaps != 0 && swaps == max_swaps {
                    break 'pass;
                }
                self.items.swap(j - 1, j);
                self.meta.swap(j - 1, j);

                let lower = self.meta[j - 1].dense_to_sparse as usize;
                let upper = self.meta[j].dense_to_sparse as usize;
                self.sparse_ids[lower].set_index((j - 1) as u32);
                self.sparse_ids[upper].set_index(j as u32);

                swaps += 1;
                j -= 1;
            }
            i += 1;
        }

        if i >= len {
            self.fragmented = false;
        }
        swaps
    }
}

impl<T> Index<Handle> for HandleMap<T> {
    type Output = T;

    /// Same contract as [`at`](HandleMap::at)
    ///
    /// 契约与 [`at`](HandleMap::at) 相同
    #[inline]
    fn index(&self, handle: Handle) -> &T {
        self.at(handle)
    }
}

impl<T> IndexMut<Handle> for HandleMap<T> {
    #[inline]
    fn index_mut(&mut self, handle: Handle) -> &mut T {
        self.at_mut(handle)
    }
}

impl<T: Clone> Clone for HandleMap<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            free_list_front: self.free_list_front,
            free_list_back: self.free_list_back,
            item_type_id: self.item_type_id,
            fragmented: self.fragmented,
            sparse_ids: self.sparse_ids.clone(),
            items: self.items.clone(),
            meta: self.meta.clone(),
        }
    }

    #[inline]
    fn clone_from(&mut self, source: &Self) {
        self.free_list_front = source.free_list_front;
        self.free_list_back = source.free_list_back;
        self.item_type_id = source.item_type_id;
        self.fragmented = source.fragmented;
        self.sparse_ids.clone_from(&source.sparse_ids);
        self.items.clone_from(&source.items);
        self.meta.clone_from(&source.meta);
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn test_map_round_trip_preserves_handles() {
        let mut map = HandleMap::new(6);
        let a = map.insert(1);
        let b = map.insert(2);
        let c = map.insert(3);
        map.remove(b);

        let serialized = serde_json::to_string(&map).expect("Failed to serialize");
        let restored: HandleMap<i32> =
            serde_json::from_str(&serialized).expect("Failed to deserialize");

        // Handles issued before serialization redeem against the copy
        // 序列化前签发的 handle 可在副本上兑换
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(a), Some(&1));
        assert_eq!(restored.get(b), None);
        assert_eq!(restored.get(c), Some(&3));
        assert_eq!(restored.item_type_id(), 6);
        assert_eq!(restored.free_list_front(), map.free_list_front());
    }
}
