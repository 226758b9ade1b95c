//! Call-frame allocation.
//!
//! Frames live in slot blocks. A new frame is carved from the unused tail
//! of the frame below it when it fits; otherwise it gets a block of its own
//! with spare room for the frames it will call. Such a frame is "first" and
//! releases its block when popped.
use std::{
    ops::{Index, IndexMut},
    rc::Rc,
};

use crate::{Continuation, Error, Function, Position, Value};

/// Address of one slot in the frame stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub block: usize,
    pub offset: usize,
}

impl SlotRef {
    #[inline]
    pub fn add(self, n: usize) -> SlotRef {
        SlotRef {
            block: self.block,
            offset: self.offset + n,
        }
    }
}

/// Where a call deposits its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Handed back to the host caller.
    Host,
    Discard,
    Slot(SlotRef),
    /// Scratch value `index` held by the continuation of frame `frame`.
    Scratch { frame: usize, index: usize },
}

/// The argument and local regions instructions currently address.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scopes {
    pub arguments: Option<SlotRef>,
    pub nargs: usize,
    pub local: Option<SlotRef>,
    pub local_size: usize,
}

#[derive(Debug)]
pub struct Frame {
    pub function: Option<Rc<Function>>,
    pub base: SlotRef,
    pub size: usize,
    free: usize,
    free_size: usize,
    /// Owns its block instead of borrowing the caller's tail.
    pub first: bool,
    /// Completed on behalf of another frame; popped without delivering.
    pub skip: bool,
    /// `this` (or the bound values) followed by the call arguments.
    pub arguments: SlotRef,
    pub nargs: usize,
    pub local: Option<SlotRef>,
    pub continuation: Option<Continuation>,
    /// Location whose string conversion this frame is waiting on.
    pub coercing: Option<Location>,
    pub retval: Location,
    pub return_address: Position,
    pub previous_scopes: Option<Scopes>,
}

impl Frame {
    fn new(base: SlotRef, size: usize, first: bool, free_size: usize) -> Self {
        Self {
            function: None,
            base,
            size,
            free: base.offset + size,
            free_size,
            first,
            skip: false,
            arguments: base,
            nargs: 0,
            local: None,
            continuation: None,
            coercing: None,
            retval: Location::Discard,
            return_address: Position::Halt,
            previous_scopes: None,
        }
    }

    /// Slots still available above this frame in its block.
    #[inline]
    pub fn free_size(&self) -> usize {
        self.free_size
    }
}

fn align(size: usize, quantum: usize) -> usize {
    if quantum == 0 {
        size
    } else {
        size.div_ceil(quantum) * quantum
    }
}

/// The stack of activation frames and the blocks backing them.
#[derive(Debug)]
pub struct FrameStack {
    blocks: Vec<Option<Vec<Value>>>,
    frames: Vec<Frame>,
    spare: usize,
    max_slots: usize,
    max_frames: usize,
    reserved: usize,
}

impl FrameStack {
    /// Creates the stack with a root frame whose spare room serves the
    /// first calls made by the host.
    pub fn new(spare: usize, max_slots: usize, max_frames: usize) -> Self {
        let capacity = spare.max(1);
        let mut stack = Self {
            blocks: vec![Some(vec![Value::Undefined; capacity])],
            frames: Vec::new(),
            spare,
            max_slots,
            max_frames,
            reserved: capacity,
        };
        let base = SlotRef { block: 0, offset: 0 };
        stack.frames.push(Frame::new(base, 0, true, capacity));
        stack
    }

    /// Pushes a frame of `size` slots and returns its index. On failure
    /// nothing is pushed.
    pub fn allocate(&mut self, size: usize) -> Result<usize, Error> {
        if self.frames.len() >= self.max_frames {
            return Err(Error::StackOverflow);
        }

        let borrowed = self
            .frames
            .last()
            .filter(|top| size <= top.free_size)
            .map(|top| (SlotRef { block: top.base.block, offset: top.free }, top.free_size));

        let frame = match borrowed {
            Some((base, free_size)) => Frame::new(base, size, false, free_size - size),
            None => {
                let capacity = align(size + self.spare, self.spare).max(1);
                if self.reserved + capacity > self.max_slots {
                    log::debug!(
                        "frame of {size} slots exceeds stack limit ({} of {} reserved)",
                        self.reserved,
                        self.max_slots
                    );
                    return Err(Error::OutOfMemory);
                }
                let mut block = Vec::new();
                block
                    .try_reserve_exact(capacity)
                    .map_err(|_| Error::OutOfMemory)?;
                block.resize(capacity, Value::Undefined);
                self.reserved += capacity;

                let index = match self.blocks.iter().position(Option::is_none) {
                    Some(index) => {
                        self.blocks[index] = Some(block);
                        index
                    }
                    None => {
                        self.blocks.push(Some(block));
                        self.blocks.len() - 1
                    }
                };
                log::trace!("new frame block {index}: {capacity} slots");
                Frame::new(SlotRef { block: index, offset: 0 }, size, true, capacity - size)
            }
        };

        self.frames.push(frame);
        Ok(self.frames.len() - 1)
    }

    /// Pops the top frame, clearing its slots and releasing its block if it
    /// owns one. The root frame is never popped.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() <= 1 {
            return None;
        }
        let frame = self.frames.pop()?;
        if frame.first {
            if let Some(block) = self.blocks[frame.base.block].take() {
                self.reserved -= block.len();
            }
        } else if let Some(block) = self.blocks[frame.base.block].as_mut() {
            let start = frame.base.offset;
            block[start..start + frame.size].fill(Value::Undefined);
        }
        Some(frame)
    }

    /// Number of frames, including the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Slots currently reserved by frame blocks.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    pub fn slot(&self, at: SlotRef) -> &Value {
        self.blocks
            .get(at.block)
            .and_then(Option::as_ref)
            .and_then(|block| block.get(at.offset))
            .unwrap_or(&Value::Undefined)
    }

    pub fn set(&mut self, at: SlotRef, value: Value) {
        if let Some(slot) = self
            .blocks
            .get_mut(at.block)
            .and_then(Option::as_mut)
            .and_then(|block| block.get_mut(at.offset))
        {
            *slot = value;
        }
    }

    pub fn region(&self, at: SlotRef, len: usize) -> &[Value] {
        self.blocks
            .get(at.block)
            .and_then(Option::as_ref)
            .and_then(|block| block.get(at.offset..at.offset + len))
            .unwrap_or(&[])
    }

    /// Copies `values` into consecutive slots starting at `at`.
    pub fn write(&mut self, at: SlotRef, values: &[Value]) {
        if let Some(region) = self
            .blocks
            .get_mut(at.block)
            .and_then(Option::as_mut)
            .and_then(|block| block.get_mut(at.offset..at.offset + values.len()))
        {
            region.clone_from_slice(values);
        }
    }

    /// `this` and the arguments of `frame`.
    pub fn arguments(&self, frame: usize) -> &[Value] {
        self.frames
            .get(frame)
            .map(|f| self.region(f.arguments, f.nargs))
            .unwrap_or(&[])
    }
}

impl Index<usize> for FrameStack {
    type Output = Frame;

    fn index(&self, index: usize) -> &Frame {
        &self.frames[index]
    }
}

impl IndexMut<usize> for FrameStack {
    fn index_mut(&mut self, index: usize) -> &mut Frame {
        &mut self.frames[index]
    }
}
