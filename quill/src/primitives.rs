use crate::{Continuation, Engine, Error, Function, Location, NativeFunction, Status, Value};
use std::rc::Rc;

mod array;
mod function;
pub(crate) mod iterator;
pub(crate) mod join;
pub(crate) mod sort;

/// Slots reserved by natives that receive callback results.
const DEPOSIT: usize = 1;

// continuation_size 0 marks natives that never call back into the engine
#[derive(Clone, Copy)]
pub struct NativeMethod {
    pub name: &'static str,
    pub continuation_size: usize,
    pub ptr: NativeFunction,
}

impl NativeMethod {
    pub const fn new(name: &'static str, continuation_size: usize, ptr: NativeFunction) -> Self {
        Self {
            name,
            continuation_size,
            ptr,
        }
    }

    pub fn instantiate(&self) -> Function {
        Function::native(self.name, self.continuation_size, self.ptr)
    }
}

pub const ARRAY_PROTOTYPE: &[NativeMethod] = &[
    NativeMethod::new("slice", 0, array::slice),
    NativeMethod::new("push", 0, array::push),
    NativeMethod::new("pop", 0, array::pop),
    NativeMethod::new("unshift", 0, array::unshift),
    NativeMethod::new("shift", 0, array::shift),
    NativeMethod::new("splice", 0, array::splice),
    NativeMethod::new("reverse", 0, array::reverse),
    NativeMethod::new("concat", 0, array::concat),
    NativeMethod::new("indexOf", 0, array::index_of),
    NativeMethod::new("lastIndexOf", 0, array::last_index_of),
    NativeMethod::new("toString", DEPOSIT, join::to_string),
    NativeMethod::new("join", DEPOSIT, join::join),
    NativeMethod::new("forEach", DEPOSIT, iterator::for_each),
    NativeMethod::new("some", DEPOSIT, iterator::some),
    NativeMethod::new("every", DEPOSIT, iterator::every),
    NativeMethod::new("filter", DEPOSIT, iterator::filter),
    NativeMethod::new("map", DEPOSIT, iterator::map),
    NativeMethod::new("reduce", DEPOSIT, iterator::reduce),
    NativeMethod::new("reduceRight", DEPOSIT, iterator::reduce_right),
    NativeMethod::new("sort", DEPOSIT, sort::sort),
];

pub const FUNCTION_PROTOTYPE: &[NativeMethod] = &[
    NativeMethod::new("call", DEPOSIT, function::call),
    NativeMethod::new("apply", DEPOSIT, function::apply),
    NativeMethod::new("bind", 0, function::bind),
];

pub const ARRAY_CONSTRUCTOR: NativeMethod = NativeMethod::new("Array", 0, array::constructor);
pub const IS_ARRAY: NativeMethod = NativeMethod::new("isArray", 0, array::is_array);
/// Default sort comparator.
pub const STRING_COMPARE: NativeMethod = NativeMethod::new("compare", DEPOSIT, sort::string_compare);

/// What a native sees while it runs: the engine, its `this` value and
/// arguments, and the frame it owns when it was given one.
pub struct NativeContext<'a> {
    pub engine: &'a mut Engine,
    /// `this` (or the first bound value) followed by the arguments.
    pub arguments: &'a [Value],
    pub frame: Option<usize>,
    installed: Option<Continuation>,
}

impl<'a> NativeContext<'a> {
    pub fn new(engine: &'a mut Engine, arguments: &'a [Value], frame: Option<usize>) -> Self {
        Self {
            engine,
            arguments,
            frame,
            installed: None,
        }
    }

    #[inline]
    pub fn this(&self) -> Value {
        self.argument(0)
    }

    /// Argument `n`, where 0 is `this`. Missing arguments are `undefined`.
    #[inline]
    pub fn argument(&self, n: usize) -> Value {
        self.arguments.get(n).cloned().unwrap_or_default()
    }

    /// Count including `this`.
    #[inline]
    pub fn nargs(&self) -> usize {
        self.arguments.len()
    }

    /// Arguments after `this`, starting at argument `from`.
    pub fn rest(&self, from: usize) -> &[Value] {
        self.arguments.get(from..).unwrap_or(&[])
    }

    pub fn ret(&mut self, value: Value) -> Result<Status, Error> {
        self.engine.retval = value;
        Ok(Status::Ok)
    }

    /// Replaces the continuation of the running frame once this step ends.
    pub fn install(&mut self, continuation: Continuation) {
        self.installed = Some(continuation);
    }

    pub(crate) fn take_installed(&mut self) -> Option<Continuation> {
        self.installed.take()
    }

    pub fn frame(&self) -> Result<usize, Error> {
        self.frame.ok_or(Error::Internal("native runs without a frame"))
    }

    /// Continuation reserve slot `n` of the running frame.
    pub fn reserve(&self, n: usize) -> Result<Location, Error> {
        let frame = &self.engine.frames[self.frame()?];
        let size = frame.function.as_ref().map_or(0, |f| f.continuation_size);
        if n >= size {
            return Err(Error::Internal("continuation reserve too small"));
        }
        Ok(Location::Slot(frame.base.add(n)))
    }

    /// The frame slot holding argument `n`.
    pub fn argument_location(&self, n: usize) -> Result<Location, Error> {
        let frame = &self.engine.frames[self.frame()?];
        if n >= frame.nargs {
            return Err(Error::Internal("argument out of range"));
        }
        Ok(Location::Slot(frame.arguments.add(n)))
    }

    pub fn load(&self, location: Location) -> Value {
        self.engine.load(location)
    }

    pub fn store(&mut self, location: Location, value: Value) {
        self.engine.store(location, value);
    }

    /// Calls `function`, delivering its result to `retval`. `Ok` means the
    /// result is already there.
    pub fn apply(
        &mut self,
        function: &Rc<Function>,
        this: Value,
        args: &[Value],
        retval: Location,
    ) -> Result<Status, Error> {
        self.engine.apply(function, this, args, retval, false)
    }

    /// Tail-calls `function` in place of the running native.
    pub fn activate(
        &mut self,
        function: &Rc<Function>,
        this: &Value,
        args: &[Value],
    ) -> Result<Status, Error> {
        let frame = self.frame()?;
        self.engine.activate(function, this, args, frame)
    }
}

/// Relative index as used by `slice` and `splice`: negative counts from
/// the end, the result is clamped to `0..=len`.
pub(crate) fn relative_index(value: &Value, len: usize) -> usize {
    let n = value.to_integer();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}
