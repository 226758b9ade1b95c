//! forEach, some, every, filter, map, reduce and reduceRight.
//!
//! Each method validates its arguments, installs its state and then runs
//! the same step function it is resumed with. A step loops while callbacks
//! finish synchronously and suspends as soon as one needs a frame. The
//! callback result lands in reserve slot 0 of the method's frame.
use std::rc::Rc;

use crate::{
    Array, ArrayRef, Continuation, Error, Function, Location, NativeContext, Status, Value,
};

/// Cursor over the valid elements of an array.
///
/// `length` is the array length when the iteration started; every step is
/// additionally bounded by the live length, so elements appended by a
/// callback are never visited and removed ones are not read.
#[derive(Debug)]
pub struct Iteration {
    array: ArrayRef,
    callback: Rc<Function>,
    this_arg: Value,
    next: Option<usize>,
    length: usize,
}

impl Iteration {
    fn new(ctx: &NativeContext) -> Result<Self, Error> {
        let Value::Array(array) = ctx.this() else {
            return Err(Error::TypeError("receiver is not an array"));
        };
        let Value::Function(callback) = ctx.argument(1) else {
            return Err(Error::TypeError("callback is not a function"));
        };
        let length = array.borrow().len();
        let next = array.borrow().next_valid(0, length);
        Ok(Self {
            array,
            callback,
            this_arg: ctx.argument(2),
            next,
            length,
        })
    }

    fn new_reversed(ctx: &NativeContext) -> Result<Self, Error> {
        let mut iteration = Self::new(ctx)?;
        iteration.this_arg = Value::Undefined;
        iteration.next = iteration.array.borrow().prev_valid(iteration.length);
        Ok(iteration)
    }

    /// The index to visit now, if any is left.
    fn current(&self) -> Option<usize> {
        self.next.filter(|&n| n < self.array.borrow().len())
    }

    /// The index to visit now walking backwards. Indices past a shrunken
    /// array fall back to its last valid element.
    fn current_reversed(&mut self) -> Option<usize> {
        let n = self.next?;
        let array = self.array.borrow();
        if n < array.len() {
            Some(n)
        } else {
            self.next = array.prev_valid(array.len());
            self.next
        }
    }

    fn element(&self, n: usize) -> Value {
        self.array.borrow().get_or_undefined(n)
    }

    fn advance(&mut self, n: usize) {
        self.next = self.array.borrow().next_valid(n + 1, self.length);
    }

    fn advance_reversed(&mut self, n: usize) {
        self.next = self.array.borrow().prev_valid(n);
    }

    /// Calls the callback with `(element, index, array)` for index `n` and
    /// moves the cursor past it.
    fn invoke(&mut self, ctx: &mut NativeContext, n: usize, deposit: Location) -> Result<Status, Error> {
        let element = self.element(n);
        self.advance(n);
        let args = [element, Value::Number(n as f64), Value::Array(Rc::clone(&self.array))];
        ctx.apply(&self.callback, self.this_arg.clone(), &args, deposit)
    }

    /// Calls the reducer with `(accumulator, element, index, array)`.
    fn invoke_reducer(
        &self,
        ctx: &mut NativeContext,
        n: usize,
        deposit: Location,
    ) -> Result<Status, Error> {
        let args = [
            ctx.load(deposit),
            self.element(n),
            Value::Number(n as f64),
            Value::Array(Rc::clone(&self.array)),
        ];
        ctx.apply(&self.callback, Value::Undefined, &args, deposit)
    }

    pub(crate) fn for_each(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        while let Some(n) = self.current() {
            match self.invoke(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
        ctx.ret(Value::Undefined)
    }

    pub(crate) fn some(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        loop {
            if ctx.load(deposit).is_true() {
                return ctx.ret(Value::Boolean(true));
            }
            let Some(n) = self.current() else {
                return ctx.ret(Value::Boolean(false));
            };
            match self.invoke(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
    }

    pub(crate) fn every(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        loop {
            if !ctx.load(deposit).is_true() {
                return ctx.ret(Value::Boolean(false));
            }
            let Some(n) = self.current() else {
                return ctx.ret(Value::Boolean(true));
            };
            match self.invoke(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
    }

    pub(crate) fn reduce(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        while let Some(n) = self.current() {
            self.advance(n);
            match self.invoke_reducer(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
        let accumulator = ctx.load(deposit);
        ctx.ret(accumulator)
    }

    pub(crate) fn reduce_right(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        while let Some(n) = self.current_reversed() {
            self.advance_reversed(n);
            match self.invoke_reducer(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
        let accumulator = ctx.load(deposit);
        ctx.ret(accumulator)
    }
}

/// Elements whose callback returned a truthy value.
#[derive(Debug)]
pub struct Filter {
    iteration: Iteration,
    output: ArrayRef,
    /// The element handed to the callback still running.
    candidate: Option<Value>,
}

impl Filter {
    pub(crate) fn resume(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        loop {
            if let Some(candidate) = self.candidate.take() {
                if ctx.load(deposit).is_true() {
                    self.output.borrow_mut().push(&[candidate])?;
                }
            }
            let Some(n) = self.iteration.current() else {
                return ctx.ret(Value::Array(Rc::clone(&self.output)));
            };
            self.candidate = Some(self.iteration.element(n));
            match self.iteration.invoke(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
    }
}

/// Callback results stored at the index of the element they came from.
#[derive(Debug)]
pub struct Map {
    iteration: Iteration,
    output: ArrayRef,
    /// Output index of the callback still running.
    index: Option<usize>,
}

impl Map {
    pub(crate) fn resume(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        loop {
            if let Some(index) = self.index.take() {
                self.output.borrow_mut().set(index, ctx.load(deposit))?;
            }
            let Some(n) = self.iteration.current() else {
                return ctx.ret(Value::Array(Rc::clone(&self.output)));
            };
            self.index = Some(n);
            match self.iteration.invoke(ctx, n, deposit)? {
                Status::Ok => {}
                status => return Ok(status),
            }
        }
    }
}

/// Runs the first step and keeps the state for later resumptions.
fn start<S>(
    ctx: &mut NativeContext,
    mut state: S,
    step: fn(&mut S, &mut NativeContext) -> Result<Status, Error>,
    wrap: fn(S) -> Continuation,
) -> Result<Status, Error> {
    let status = step(&mut state, ctx);
    ctx.install(wrap(state));
    status
}

pub fn for_each(ctx: &mut NativeContext) -> Result<Status, Error> {
    let iteration = Iteration::new(ctx)?;
    start(ctx, iteration, Iteration::for_each, Continuation::ForEach)
}

pub fn some(ctx: &mut NativeContext) -> Result<Status, Error> {
    let iteration = Iteration::new(ctx)?;
    let deposit = ctx.reserve(0)?;
    ctx.store(deposit, Value::Boolean(false));
    start(ctx, iteration, Iteration::some, Continuation::Some)
}

pub fn every(ctx: &mut NativeContext) -> Result<Status, Error> {
    let iteration = Iteration::new(ctx)?;
    let deposit = ctx.reserve(0)?;
    ctx.store(deposit, Value::Boolean(true));
    start(ctx, iteration, Iteration::every, Continuation::Every)
}

pub fn filter(ctx: &mut NativeContext) -> Result<Status, Error> {
    let iteration = Iteration::new(ctx)?;
    let filter = Filter {
        iteration,
        output: Rc::new(Array::new().into()),
        candidate: None,
    };
    start(ctx, filter, Filter::resume, Continuation::Filter)
}

pub fn map(ctx: &mut NativeContext) -> Result<Status, Error> {
    let iteration = Iteration::new(ctx)?;
    let output = Array::allocate(iteration.length, 0)?;
    let map = Map {
        iteration,
        output: Rc::new(output.into()),
        index: None,
    };
    start(ctx, map, Map::resume, Continuation::Map)
}

pub fn reduce(ctx: &mut NativeContext) -> Result<Status, Error> {
    let mut iteration = Iteration::new(ctx)?;
    iteration.this_arg = Value::Undefined;
    let deposit = ctx.reserve(0)?;
    if ctx.nargs() > 2 {
        ctx.store(deposit, ctx.argument(2));
    } else {
        let Some(n) = iteration.next else {
            return Err(Error::TypeError("reduce of empty array with no initial value"));
        };
        ctx.store(deposit, iteration.element(n));
        iteration.advance(n);
    }
    start(ctx, iteration, Iteration::reduce, Continuation::Reduce)
}

pub fn reduce_right(ctx: &mut NativeContext) -> Result<Status, Error> {
    let mut iteration = Iteration::new_reversed(ctx)?;
    let deposit = ctx.reserve(0)?;
    if ctx.nargs() > 2 {
        ctx.store(deposit, ctx.argument(2));
    } else {
        let Some(n) = iteration.next else {
            return Err(Error::TypeError("reduce of empty array with no initial value"));
        };
        ctx.store(deposit, iteration.element(n));
        iteration.advance_reversed(n);
    }
    start(ctx, iteration, Iteration::reduce_right, Continuation::ReduceRight)
}
