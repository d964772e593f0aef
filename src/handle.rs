use std::fmt;

/// Number of bits the generation field is shifted left inside the raw value
///
/// generation 字段在原始值中左移的位数
const GENERATION_SHIFT: u32 = 32;

/// Number of bits the type id field is shifted left inside the raw value
///
/// type id 字段在原始值中左移的位数
const TYPE_ID_SHIFT: u32 = 48;

/// Bit position of the free flag (most significant bit)
///
/// free 标志的位位置（最高位）
const FREE_SHIFT: u32 = 63;

const INDEX_MASK: u64 = 0xFFFF_FFFF;
const GENERATION_MASK: u64 = 0xFFFF << GENERATION_SHIFT;
const TYPE_ID_MASK: u64 = 0x7FFF << TYPE_ID_SHIFT;
const FREE_BIT: u64 = 1 << FREE_SHIFT;

/// Generation given to a freshly appended slot
///
/// 新追加的 slot 的初始代数
pub(crate) const FIRST_GENERATION: u16 = 1;

/// Sentinel index marking the end of the embedded freelist
///
/// Stored in the `index` field of the last free slot, and in the
/// freelist front/back cursors when the list is empty.
///
/// 标记内嵌空闲列表结尾的哨兵索引
///
/// 存储在最后一个空闲 slot 的 `index` 字段中，当列表为空时
/// 也存储在空闲列表的 front/back 游标中。
pub const FREE_LIST_END: u32 = 0xFFFF_FFFF;

/// Handle is an opaque 64-bit id referring to one item in a [`HandleMap`]
///
/// The packed layout is:
///
/// | Bits  | Field      | Meaning |
/// |-------|------------|---------|
/// | 0–31  | index      | outer index into the sparse table |
/// | 32–47 | generation | incremented every time the owning slot is freed |
/// | 48–62 | type_id    | fixed tag of the map that produced the handle |
/// | 63    | free       | always 0 on handles given to clients |
///
/// Handles compare by the raw 64-bit value, so sorting a set of handles
/// orders them by (free, type_id, generation, index). The same encoding is
/// reused inside the sparse table, where `index` holds the dense position of
/// the item (active slot) or the next free slot (freelist link).
///
/// Handle 是指向 [`HandleMap`] 中某个条目的不透明 64 位 id
///
/// 按原始 64 位值比较，因此对一组 handle 排序时优先级为
/// (free, type_id, generation, index)。相同的编码也在稀疏表内部复用：
/// 活跃 slot 的 `index` 存储条目的密集位置，空闲 slot 的 `index`
/// 存储下一个空闲 slot（空闲列表链接）。
///
/// # Examples (示例)
///
/// ```
/// use handle_map::HandleMap;
///
/// let mut map = HandleMap::new(1);
/// let handle = map.insert("hello");
///
/// assert_eq!(handle.index(), 0);
/// assert_eq!(handle.generation(), 1);
/// assert_eq!(handle.type_id(), 1);
/// ```
///
/// [`HandleMap`]: crate::HandleMap
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Handle {
    raw: u64,
}

impl Handle {
    /// The canonical null handle (all fields zero)
    ///
    /// Never returned by an insert: live handles always carry a
    /// generation of at least 1.
    ///
    /// 规范的 null handle（所有字段为零）
    ///
    /// 插入操作永远不会返回它：有效 handle 的代数至少为 1。
    pub const NULL: Self = Self { raw: 0 };

    /// Largest representable type tag (the field is 15 bits wide)
    ///
    /// 可表示的最大类型标签（该字段宽 15 位）
    pub const MAX_TYPE_ID: u16 = 0x7FFF;

    /// Pack the four logical fields into a handle
    ///
    /// 将四个逻辑字段打包为一个 handle
    #[inline(always)]
    pub(crate) fn pack(index: u32, generation: u16, type_id: u16, free: bool) -> Self {
        debug_assert!(type_id <= Self::MAX_TYPE_ID, "type_id exceeds 15 bits");
        Self {
            raw: (index as u64)
                | ((generation as u64) << GENERATION_SHIFT)
                | (((type_id & Self::MAX_TYPE_ID) as u64) << TYPE_ID_SHIFT)
                | ((free as u64) << FREE_SHIFT),
        }
    }

    /// Reconstruct a handle from its raw 64-bit value
    ///
    /// The inverse of [`raw`](Self::raw). Intended for moving handles across
    /// serialization or FFI boundaries; forging raw values does not grant
    /// access, since lookups still verify generation and type tag.
    ///
    /// 从原始 64 位值重建 handle
    ///
    /// [`raw`](Self::raw) 的逆操作。用于跨序列化或 FFI 边界传递 handle；
    /// 伪造原始值无法获得访问权，查找仍会校验代数和类型标签。
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

    /// The raw 64-bit value, bit-exact across runs
    ///
    /// 原始 64 位值，跨运行逐位一致
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.raw
    }

    /// Extract the index field (bits 0–31)
    ///
    /// 提取 index 字段（第 0–31 位）
    #[inline(always)]
    pub const fn index(self) -> u32 {
        self.raw as u32
    }

    /// Extract the generation field (bits 32–47)
    ///
    /// 提取 generation 字段（第 32–47 位）
    #[inline(always)]
    pub const fn generation(self) -> u16 {
        (self.raw >> GENERATION_SHIFT) as u16
    }

    /// Extract the type tag field (bits 48–62)
    ///
    /// 提取类型标签字段（第 48–62 位）
    #[inline(always)]
    pub const fn type_id(self) -> u16 {
        ((self.raw & TYPE_ID_MASK) >> TYPE_ID_SHIFT) as u16
    }

    /// Whether the free flag (bit 63) is set
    ///
    /// Only meaningful for slots read from the sparse table; handles
    /// returned to clients always have it clear.
    ///
    /// free 标志（第 63 位）是否置位
    ///
    /// 仅对从稀疏表读取的 slot 有意义；返回给客户端的 handle
    /// 该位始终为 0。
    #[inline(always)]
    pub const fn is_free(self) -> bool {
        self.raw & FREE_BIT != 0
    }

    /// Whether this is the null handle
    ///
    /// 是否为 null handle
    #[inline(always)]
    pub const fn is_null(self) -> bool {
        self.raw == 0
    }

    /// Overwrite the index field, leaving the other fields untouched
    ///
    /// 覆写 index 字段，其余字段保持不变
    #[inline(always)]
    pub(crate) fn set_index(&mut self, index: u32) {
        self.raw = (self.raw & !INDEX_MASK) | (index as u64);
    }

    /// Set or clear the free flag
    ///
    /// 置位或清除 free 标志
    #[inline(always)]
    pub(crate) fn set_free(&mut self, free: bool) {
        self.raw = (self.raw & !FREE_BIT) | ((free as u64) << FREE_SHIFT);
    }

    /// Advance the generation by one, wrapping mod 2^16
    ///
    /// 代数加一，按模 2^16 回绕
    #[inline(always)]
    pub(crate) fn bump_generation(&mut self) {
        let next = self.generation().wrapping_add(1);
        self.raw = (self.raw & !GENERATION_MASK) | ((next as u64) << GENERATION_SHIFT);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index())
            .field("generation", &self.generation())
            .field("type_id", &self.type_id())
            .field("free", &self.is_free())
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Handle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // The wire form is the raw value, keeping the bit layout exact
        // 序列化形式即原始值，保持位布局逐位一致
        serializer.serialize_u64(self.raw)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Handle::from_raw)
    }
}
