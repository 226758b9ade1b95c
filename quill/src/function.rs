use std::{fmt, rc::Rc};

use crate::{Code, Error, NativeContext, Status, Value};

pub type NativeFunction = fn(&mut NativeContext<'_>) -> Result<Status, Error>;

#[derive(Clone)]
pub enum FunctionKind {
    Native(NativeFunction),
    Lambda(Rc<Code>),
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native"),
            Self::Lambda(code) => f.debug_tuple("Lambda").field(&code.name).finish(),
        }
    }
}

/// A callable. `bound` holds the `this` value followed by pre-supplied
/// arguments for functions produced by `bind`; `args_offset` is the number
/// of leading slots (`this` or the bound values) placed before the
/// call-site arguments.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Rc<str>,
    pub kind: FunctionKind,
    pub args_offset: usize,
    pub bound: Option<Box<[Value]>>,
    /// Slots reserved at the bottom of a native frame for the
    /// function's continuation. Zero for natives that finish immediately.
    pub continuation_size: usize,
}

impl Function {
    pub fn native(
        name: impl Into<Rc<str>>,
        continuation_size: usize,
        ptr: NativeFunction,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Native(ptr),
            args_offset: 1,
            bound: None,
            continuation_size,
        }
    }

    pub fn lambda(code: Rc<Code>) -> Self {
        Self {
            name: Rc::clone(&code.name),
            kind: FunctionKind::Lambda(code),
            args_offset: 1,
            bound: None,
            continuation_size: 0,
        }
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self.kind, FunctionKind::Native(_))
    }

    /// A native that can run on the caller's stack without a frame.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.is_native() && self.continuation_size == 0 && self.bound.is_none()
    }

    /// Binds `this` and leading arguments. `this_and_args` starts with the
    /// `this` value; an empty slice binds `undefined`. Binding an already
    /// bound function keeps its `this` and appends the new arguments after
    /// the old ones.
    pub fn bind(&self, this_and_args: &[Value]) -> Function {
        let bound: Box<[Value]> = match &self.bound {
            Some(previous) => previous
                .iter()
                .chain(this_and_args.iter().skip(1))
                .cloned()
                .collect(),
            None if this_and_args.is_empty() => Box::new([Value::Undefined]),
            None => this_and_args.into(),
        };

        Function {
            name: self.name.clone(),
            kind: self.kind.clone(),
            args_offset: bound.len(),
            bound: Some(bound),
            continuation_size: self.continuation_size,
        }
    }

    /// The values placed before the call-site arguments in a frame.
    pub fn leading<'a>(&'a self, this: &'a Value) -> &'a [Value] {
        match &self.bound {
            Some(bound) => bound,
            None => std::slice::from_ref(this),
        }
    }
}
