//! Resumable state of native functions that call back into script code.
//!
//! A framed native runs until it either finishes or hands control to a
//! callee. In the latter case its state stays in the frame and the engine
//! resumes it at the nexus once the callee has delivered its result.
use std::fmt;

use crate::{
    Engine, Error, Location, NativeContext, NativeFunction,
    primitives::{
        iterator::{Filter, Iteration, Map},
        join::Join,
        sort::Sort,
    },
};

/// Outcome of a native step or an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Finished; the result is in place.
    Ok,
    /// A frame was pushed; the dispatch loop takes over.
    Applied,
    Trap(Trap),
}

/// A request to the engine to fix up a value and retry the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// Replace the value at the location with its string form.
    StringArg(Location),
}

pub enum Continuation {
    /// First step of a framed native.
    Entry(NativeFunction),
    ToString,
    Join(Join),
    ForEach(Iteration),
    Some(Iteration),
    Every(Iteration),
    Filter(Filter),
    Map(Map),
    Reduce(Iteration),
    ReduceRight(Iteration),
    Sort(Sort),
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(_) => f.write_str("Entry"),
            Self::ToString => f.write_str("ToString"),
            Self::Join(join) => f.debug_tuple("Join").field(join).finish(),
            Self::ForEach(it) => f.debug_tuple("ForEach").field(it).finish(),
            Self::Some(it) => f.debug_tuple("Some").field(it).finish(),
            Self::Every(it) => f.debug_tuple("Every").field(it).finish(),
            Self::Filter(it) => f.debug_tuple("Filter").field(it).finish(),
            Self::Map(it) => f.debug_tuple("Map").field(it).finish(),
            Self::Reduce(it) => f.debug_tuple("Reduce").field(it).finish(),
            Self::ReduceRight(it) => f.debug_tuple("ReduceRight").field(it).finish(),
            Self::Sort(sort) => f.debug_tuple("Sort").field(sort).finish(),
        }
    }
}

/// Runs one step of the continuation stored in `frame`.
pub(crate) fn resume(engine: &mut Engine, frame: usize) -> Result<Status, Error> {
    let mut state = engine
        .frames
        .get_mut(frame)
        .and_then(|f| f.continuation.take())
        .ok_or(Error::Internal("frame has no continuation"))?;
    let args = engine.frames.arguments(frame).to_vec();

    let mut ctx = NativeContext::new(engine, &args, Some(frame));
    let status = match &mut state {
        Continuation::Entry(native) => (*native)(&mut ctx),
        Continuation::ToString => crate::primitives::join::to_string_continuation(&mut ctx),
        Continuation::Join(join) => join.resume(&mut ctx),
        Continuation::ForEach(it) => it.for_each(&mut ctx),
        Continuation::Some(it) => it.some(&mut ctx),
        Continuation::Every(it) => it.every(&mut ctx),
        Continuation::Filter(filter) => filter.resume(&mut ctx),
        Continuation::Map(map) => map.resume(&mut ctx),
        Continuation::Reduce(it) => it.reduce(&mut ctx),
        Continuation::ReduceRight(it) => it.reduce_right(&mut ctx),
        Continuation::Sort(sort) => sort.resume(&mut ctx),
    };
    let installed = ctx.take_installed();

    if let Some(f) = engine.frames.get_mut(frame) {
        f.continuation = Some(installed.unwrap_or(state));
    }
    status
}
