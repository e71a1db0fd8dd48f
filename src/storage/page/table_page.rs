use crate::common::{DbError, PageId, Result, SlotId, INVALID_PAGE_ID};

/// Table page header layout (little endian):
///
/// | Field              | Offset | Size |
/// |--------------------|--------|------|
/// | page_id            | 0      | 4    |
/// | next_page_id       | 4      | 4    |
/// | num_slots          | 8      | 2    |
/// | tuple_count        | 10     | 2    |
/// | free_space_offset  | 12     | 2    |
/// | reserved           | 14     | 2    |
///
/// The slot directory follows the header and grows towards the end of the
/// page; tuple bytes are packed from the end of the page backwards.
pub const HEADER_SIZE: usize = 16;
const PAGE_ID_OFFSET: usize = 0;
const NEXT_PAGE_ID_OFFSET: usize = 4;
const NUM_SLOTS_OFFSET: usize = 8;
const TUPLE_COUNT_OFFSET: usize = 10;
const FREE_SPACE_OFFSET: usize = 12;

/// Slot layout: tuple offset (u16), tuple length (u16), flags (u16)
pub const SLOT_SIZE: usize = 6;
const SLOT_FLAG_TOMBSTONE: u16 = 1;

/// Slotted page holding variable-length tuples.
///
/// The view works over any byte buffer: `&[u8]` for reads under a shared
/// latch, `&mut [u8]` for mutation under an exclusive one. Deleting a tuple
/// only sets the tombstone bit of its slot; space is not compacted, and the
/// slot is handed out again by a later insert.
pub struct TablePage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TablePage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn read_u16(&self, offset: usize) -> u16 {
        let data = self.bytes();
        u16::from_le_bytes([data[offset], data[offset + 1]])
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let data = self.bytes();
        u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.read_u32(PAGE_ID_OFFSET))
    }

    /// Next page of the heap chain, `INVALID_PAGE_ID` at the end.
    pub fn next_page_id(&self) -> PageId {
        PageId::new(self.read_u32(NEXT_PAGE_ID_OFFSET))
    }

    /// Number of slots, tombstones included.
    pub fn num_slots(&self) -> u16 {
        self.read_u16(NUM_SLOTS_OFFSET)
    }

    /// Number of live tuples.
    pub fn tuple_count(&self) -> u16 {
        self.read_u16(TUPLE_COUNT_OFFSET)
    }

    fn free_space_offset(&self) -> usize {
        self.read_u16(FREE_SPACE_OFFSET) as usize
    }

    fn slot_directory_end(&self) -> usize {
        HEADER_SIZE + self.num_slots() as usize * SLOT_SIZE
    }

    /// Bytes between the slot directory and the tuple area.
    pub fn free_space(&self) -> usize {
        self.free_space_offset()
            .saturating_sub(self.slot_directory_end())
    }

    fn slot_position(slot: u16) -> usize {
        HEADER_SIZE + slot as usize * SLOT_SIZE
    }

    /// Returns (offset, length, flags) of a slot in range.
    fn slot(&self, slot: u16) -> (usize, usize, u16) {
        let pos = Self::slot_position(slot);
        (
            self.read_u16(pos) as usize,
            self.read_u16(pos + 2) as usize,
            self.read_u16(pos + 4),
        )
    }

    fn check_slot(&self, slot_id: SlotId) -> Result<()> {
        if slot_id.as_u16() >= self.num_slots() {
            return Err(DbError::SlotNotFound(slot_id));
        }
        Ok(())
    }

    pub fn is_tombstone(&self, slot_id: SlotId) -> bool {
        slot_id.as_u16() < self.num_slots()
            && self.slot(slot_id.as_u16()).2 & SLOT_FLAG_TOMBSTONE != 0
    }

    /// Returns the bytes of a live tuple.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        self.check_slot(slot_id)?;
        let (offset, length, flags) = self.slot(slot_id.as_u16());
        if flags & SLOT_FLAG_TOMBSTONE != 0 {
            return Err(DbError::SlotNotFound(slot_id));
        }
        self.bytes()
            .get(offset..offset + length)
            .ok_or_else(|| DbError::CorruptTuple(format!("slot {slot_id} points outside the page")))
    }

    /// First live slot at or after `from`.
    pub fn next_live_slot(&self, from: u16) -> Option<SlotId> {
        (from..self.num_slots())
            .map(SlotId::new)
            .find(|&slot_id| !self.is_tombstone(slot_id))
    }

    /// Live slots in slot order.
    pub fn live_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.num_slots())
            .map(SlotId::new)
            .filter(|&slot_id| !self.is_tombstone(slot_id))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TablePage<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Formats the buffer as an empty table page.
    pub fn init(&mut self, page_id: PageId) {
        let page_size = self.bytes().len();
        self.bytes_mut()[..HEADER_SIZE].fill(0);
        self.write_u32(PAGE_ID_OFFSET, page_id.as_u32());
        self.write_u32(NEXT_PAGE_ID_OFFSET, INVALID_PAGE_ID.as_u32());
        self.write_u16(NUM_SLOTS_OFFSET, 0);
        self.write_u16(TUPLE_COUNT_OFFSET, 0);
        self.write_u16(FREE_SPACE_OFFSET, page_size as u16);
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.write_u32(NEXT_PAGE_ID_OFFSET, page_id.as_u32());
    }

    fn write_slot(&mut self, slot: u16, offset: usize, length: usize, flags: u16) {
        let pos = Self::slot_position(slot);
        self.write_u16(pos, offset as u16);
        self.write_u16(pos + 2, length as u16);
        self.write_u16(pos + 4, flags);
    }

    /// Stores a tuple and returns its slot.
    ///
    /// The first tombstoned slot is reused; otherwise a slot is appended.
    /// Fails with `PageFull` if the bytes (plus a new slot, when one is
    /// needed) do not fit.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        let reuse = (0..self.num_slots()).find(|&slot| self.slot(slot).2 & SLOT_FLAG_TOMBSTONE != 0);
        let needed = tuple.len() + if reuse.is_some() { 0 } else { SLOT_SIZE };
        let available = self.free_space();
        if needed > available {
            return Err(DbError::PageFull {
                tuple_size: tuple.len(),
                needed,
                available,
            });
        }

        let offset = self.free_space_offset() - tuple.len();
        self.bytes_mut()[offset..offset + tuple.len()].copy_from_slice(tuple);
        self.write_u16(FREE_SPACE_OFFSET, offset as u16);

        let slot = match reuse {
            Some(slot) => slot,
            None => {
                let slot = self.num_slots();
                self.write_u16(NUM_SLOTS_OFFSET, slot + 1);
                slot
            }
        };
        self.write_slot(slot, offset, tuple.len(), 0);
        let count = self.tuple_count();
        self.write_u16(TUPLE_COUNT_OFFSET, count + 1);
        Ok(SlotId::new(slot))
    }

    /// Tombstones a live tuple.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        self.check_slot(slot_id)?;
        let (offset, length, flags) = self.slot(slot_id.as_u16());
        if flags & SLOT_FLAG_TOMBSTONE != 0 {
            return Err(DbError::SlotNotFound(slot_id));
        }
        self.write_slot(slot_id.as_u16(), offset, length, flags | SLOT_FLAG_TOMBSTONE);
        let count = self.tuple_count();
        self.write_u16(TUPLE_COUNT_OFFSET, count.saturating_sub(1));
        Ok(())
    }

    /// Clears the tombstone of a slot whose bytes were not reused since the
    /// delete.
    pub fn restore_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        self.check_slot(slot_id)?;
        let (offset, length, flags) = self.slot(slot_id.as_u16());
        if flags & SLOT_FLAG_TOMBSTONE == 0 {
            return Err(DbError::InvalidSlotId(slot_id));
        }
        self.write_slot(slot_id.as_u16(), offset, length, flags & !SLOT_FLAG_TOMBSTONE);
        let count = self.tuple_count();
        self.write_u16(TUPLE_COUNT_OFFSET, count + 1);
        Ok(())
    }
}
