//! Array storage with a movable live window.
//!
//! The backing buffer is laid out as `[prepend slack][live window][tail]`.
//! `start` is the index of element 0 inside `data`, so `shift` and
//! `unshift` only move the window. Everything outside the window is hole
//! padding.
use crate::{Error, Slot, Value};

/// Extra tail slots given to freshly created arrays.
pub const ARRAY_SPARE: usize = 8;

/// Requests below this many slots are doubled, larger ones grow by half.
const DOUBLING_LIMIT: usize = 16;

pub const MAX_LENGTH: usize = u32::MAX as usize;

#[derive(Debug, Clone, Default)]
pub struct Array {
    data: Vec<Slot>,
    start: usize,
    length: usize,
}

impl Array {
    pub fn new() -> Self {
        Self {
            data: vec![None; ARRAY_SPARE],
            start: 0,
            length: 0,
        }
    }

    /// An array of `length` holes with `spare` extra tail slots.
    pub fn allocate(length: usize, spare: usize) -> Result<Self, Error> {
        if length > MAX_LENGTH {
            return Err(Error::RangeError("invalid array length"));
        }
        let size = length.checked_add(spare).ok_or(Error::OutOfMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
        data.resize(size, None);
        Ok(Self { data, start: 0, length })
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let length = values.len();
        let mut data: Vec<Slot> = values.into_iter().map(Some).collect();
        data.resize(length + ARRAY_SPARE, None);
        Self { data, start: 0, length }
    }

    pub fn from_slots(slots: Vec<Slot>) -> Self {
        let length = slots.len();
        Self { data: slots, start: 0, length }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Total backing slots, including prepend slack.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Index of element 0 inside the backing buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.start
    }

    /// Backing slots from the window start to the end of the buffer.
    #[inline]
    fn size(&self) -> usize {
        self.data.len() - self.start
    }

    #[inline]
    fn tail_room(&self) -> usize {
        self.size() - self.length
    }

    pub fn slots(&self) -> &[Slot] {
        &self.data[self.start..self.start + self.length]
    }

    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.data[self.start..self.start + self.length]
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots().get(index).and_then(Option::as_ref)
    }

    /// Reads element `index`; holes and out-of-range reads are `undefined`.
    pub fn get_or_undefined(&self, index: usize) -> Value {
        self.get(index).cloned().unwrap_or_default()
    }

    pub fn is_hole(&self, index: usize) -> bool {
        matches!(self.slots().get(index), Some(None))
    }

    /// Stores `value` at `index`, growing the window with holes if needed.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), Error> {
        if index >= self.length {
            if index >= MAX_LENGTH {
                return Err(Error::RangeError("invalid array length"));
            }
            let needed = index + 1 - self.length;
            if needed > self.tail_room() {
                self.realloc(0, self.size() + needed)?;
            }
            let from = self.start + self.length;
            self.data[from..self.start + index].fill(None);
            self.length = index + 1;
        }
        let start = self.start;
        self.data[start + index] = Some(value);
        Ok(())
    }

    /// Sets the length, dropping elements past it or adding trailing holes.
    pub fn truncate_or_extend(&mut self, length: usize) -> Result<(), Error> {
        if length < self.length {
            let start = self.start;
            self.data[start + length..start + self.length].fill(None);
            self.length = length;
            Ok(())
        } else if length > self.length {
            if length > MAX_LENGTH {
                return Err(Error::RangeError("invalid array length"));
            }
            let needed = length - self.length;
            if needed > self.tail_room() {
                self.realloc(0, self.size() + needed)?;
            }
            self.length = length;
            Ok(())
        } else {
            Ok(())
        }
    }

    /// Moves the live window into a new buffer of `prepend + size` slots
    /// with the window starting at `prepend`. A `size` different from the
    /// current one is padded by the growth policy first. On failure the
    /// array is untouched.
    pub fn realloc(&mut self, prepend: usize, size: usize) -> Result<(), Error> {
        let mut size = size.max(self.length);
        if size != self.size() {
            size = if size < DOUBLING_LIMIT {
                size * 2
            } else {
                size + size / 2
            };
        }

        let total = prepend.checked_add(size).ok_or(Error::OutOfMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(total).map_err(|_| Error::OutOfMemory)?;

        log::debug!(
            "array realloc: length {} capacity {} -> {} (prepend {})",
            self.length,
            self.data.len(),
            total,
            prepend
        );

        data.resize(prepend, None);
        data.extend(self.slots_mut().iter_mut().map(Option::take));
        data.resize(total, None);

        self.data = data;
        self.start = prepend;
        Ok(())
    }

    pub fn push(&mut self, values: &[Value]) -> Result<usize, Error> {
        let n = values.len();
        if self.length + n > MAX_LENGTH {
            return Err(Error::RangeError("invalid array length"));
        }
        if n > self.tail_room() {
            self.realloc(0, self.size() + n)?;
        }
        let end = self.start + self.length;
        for (slot, value) in self.data[end..end + n].iter_mut().zip(values) {
            *slot = Some(value.clone());
        }
        self.length += n;
        Ok(self.length)
    }

    /// Removes the last element. Holes and an empty array yield `None`.
    pub fn pop(&mut self) -> Option<Value> {
        if self.length == 0 {
            return None;
        }
        self.length -= 1;
        self.data[self.start + self.length].take()
    }

    pub fn unshift(&mut self, values: &[Value]) -> Result<usize, Error> {
        let n = values.len();
        if n == 0 {
            return Ok(self.length);
        }
        if self.length + n > MAX_LENGTH {
            return Err(Error::RangeError("invalid array length"));
        }
        if n > self.start {
            self.realloc(n, self.size())?;
        }
        for value in values.iter().rev() {
            self.start -= 1;
            self.data[self.start] = Some(value.clone());
        }
        self.length += n;
        Ok(self.length)
    }

    /// Removes the first element by advancing the window.
    pub fn shift(&mut self) -> Option<Value> {
        if self.length == 0 {
            return None;
        }
        let value = self.data[self.start].take();
        self.start += 1;
        self.length -= 1;
        value
    }

    /// Removes `delete` elements at `start`, inserts `items` in their place
    /// and returns the removed elements as a new array. Both counts are
    /// clamped to the live window. All allocation happens before the first
    /// element moves.
    pub fn splice(
        &mut self,
        start: usize,
        delete: usize,
        items: &[Value],
    ) -> Result<Array, Error> {
        let start = start.min(self.length);
        let delete = delete.min(self.length - start);
        let insert = items.len();

        let mut deleted = Array::allocate(delete, 0)?;
        if insert > delete {
            let grow = insert - delete;
            if self.length + grow > MAX_LENGTH {
                return Err(Error::RangeError("invalid array length"));
            }
            if grow > self.tail_room() {
                self.realloc(0, self.size() + grow)?;
            }
        }

        let length = self.length;
        let base = self.start;
        let window = &mut self.data[base..base + length.max(length - delete + insert)];

        for (i, slot) in deleted.data.iter_mut().enumerate() {
            *slot = window[start + i].take();
        }

        if insert > delete {
            let delta = insert - delete;
            for i in (start + delete..length).rev() {
                window[i + delta] = window[i].take();
            }
        } else if insert < delete {
            let delta = delete - insert;
            for i in start + delete..length {
                window[i - delta] = window[i].take();
            }
        }

        for (slot, item) in window[start..start + insert].iter_mut().zip(items) {
            *slot = Some(item.clone());
        }

        self.length = length - delete + insert;
        Ok(deleted)
    }

    pub fn reverse(&mut self) {
        self.slots_mut().reverse();
    }

    /// Copies elements `begin..end` (clamped) into a new array, holes kept.
    pub fn slice(&self, begin: usize, end: usize) -> Result<Array, Error> {
        let end = end.min(self.length);
        let begin = begin.min(end);
        let mut array = Array::allocate(end - begin, ARRAY_SPARE)?;
        array.data[..end - begin].clone_from_slice(&self.slots()[begin..end]);
        Ok(array)
    }

    pub fn index_of(&self, value: &Value, from: usize) -> Option<usize> {
        self.slots()
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, slot)| slot.as_ref().is_some_and(|v| v.strict_equals(value)))
            .map(|(i, _)| i)
    }

    /// Searches backwards starting at `from` (clamped to the last element).
    pub fn last_index_of(&self, value: &Value, from: usize) -> Option<usize> {
        if self.length == 0 {
            return None;
        }
        let from = from.min(self.length - 1);
        self.slots()[..=from]
            .iter()
            .rposition(|slot| slot.as_ref().is_some_and(|v| v.strict_equals(value)))
    }

    /// First non-hole index in `from..min(bound, len)`.
    pub fn next_valid(&self, from: usize, bound: usize) -> Option<usize> {
        let end = bound.min(self.length);
        (from..end).find(|&i| self.slots()[i].is_some())
    }

    /// Last non-hole index below `before` (clamped to the live length).
    pub fn prev_valid(&self, before: usize) -> Option<usize> {
        let end = before.min(self.length);
        (0..end).rev().find(|&i| self.slots()[i].is_some())
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots().iter().map(|slot| slot.clone().unwrap_or_default())
    }
}
