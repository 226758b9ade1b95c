use std::{collections::HashMap, mem, rc::Rc};

use crate::{
    Code, Continuation, Error, Frame, FrameStack, Function, FunctionKind, Location,
    NativeContext, Operand, Position, Scopes, SlotRef, Status, Value,
    primitives::{self, NativeMethod},
};

// slots are `Value`s, so these are in units of values rather than bytes
const DEFAULT_FRAME_SPARE: usize = 32;
const DEFAULT_MAX_STACK_SLOTS: usize = 1 << 20;
const DEFAULT_MAX_FRAMES: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct EngineCreateInfo {
    /// Spare slots added to every freshly allocated frame block.
    pub frame_spare_slots: Option<usize>,
    /// Upper bound on slots held by frame blocks.
    pub max_stack_slots: Option<usize>,
    pub max_frames: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub frame_spare_slots: usize,
    pub max_stack_slots: usize,
    pub max_frames: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frame_spare_slots: DEFAULT_FRAME_SPARE,
            max_stack_slots: DEFAULT_MAX_STACK_SLOTS,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl From<&EngineCreateInfo> for EngineSettings {
    fn from(info: &EngineCreateInfo) -> Self {
        let default = Self::default();
        Self {
            frame_spare_slots: info.frame_spare_slots.unwrap_or(default.frame_spare_slots),
            max_stack_slots: info.max_stack_slots.unwrap_or(default.max_stack_slots),
            max_frames: info.max_frames.unwrap_or(default.max_frames).max(2),
        }
    }
}

/// Built-in functions, shared by every lookup.
#[derive(Debug)]
struct Builtins {
    array_prototype: HashMap<&'static str, Rc<Function>>,
    function_prototype: HashMap<&'static str, Rc<Function>>,
    array_constructor: Rc<Function>,
    is_array: Rc<Function>,
    string_compare: Rc<Function>,
}

impl Builtins {
    fn new() -> Self {
        fn table(methods: &[NativeMethod]) -> HashMap<&'static str, Rc<Function>> {
            methods
                .iter()
                .map(|method| (method.name, Rc::new(method.instantiate())))
                .collect()
        }

        Self {
            array_prototype: table(primitives::ARRAY_PROTOTYPE),
            function_prototype: table(primitives::FUNCTION_PROTOTYPE),
            array_constructor: Rc::new(primitives::ARRAY_CONSTRUCTOR.instantiate()),
            is_array: Rc::new(primitives::IS_ARRAY.instantiate()),
            string_compare: Rc::new(primitives::STRING_COMPARE.instantiate()),
        }
    }
}

/// The execution core: frame stack, dispatch position and the scopes the
/// running lambda addresses.
#[derive(Debug)]
pub struct Engine {
    pub(crate) frames: FrameStack,
    pub(crate) current: Position,
    pub(crate) scopes: Scopes,
    /// Result register written by natives before they report `Ok`.
    pub(crate) retval: Value,
    completion: Option<Value>,
    settings: EngineSettings,
    builtins: Builtins,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineCreateInfo::default())
    }
}

impl Engine {
    pub fn new(info: EngineCreateInfo) -> Self {
        let settings = EngineSettings::from(&info);
        log::debug!("engine settings: {settings:?}");
        Self {
            frames: FrameStack::new(
                settings.frame_spare_slots,
                settings.max_stack_slots,
                settings.max_frames,
            ),
            current: Position::Halt,
            scopes: Scopes::default(),
            retval: Value::Undefined,
            completion: None,
            settings,
            builtins: Builtins::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Frames on the stack, the root frame included.
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Slots reserved by frame blocks.
    pub fn reserved_slots(&self) -> usize {
        self.frames.reserved()
    }

    pub fn array_method(&self, name: &str) -> Option<Value> {
        self.builtins
            .array_prototype
            .get(name)
            .map(|f| Value::Function(Rc::clone(f)))
    }

    pub fn function_method(&self, name: &str) -> Option<Value> {
        self.builtins
            .function_prototype
            .get(name)
            .map(|f| Value::Function(Rc::clone(f)))
    }

    pub fn array_constructor(&self) -> Value {
        Value::Function(Rc::clone(&self.builtins.array_constructor))
    }

    pub fn is_array(&self) -> Value {
        Value::Function(Rc::clone(&self.builtins.is_array))
    }

    pub(crate) fn string_compare(&self) -> Rc<Function> {
        Rc::clone(&self.builtins.string_compare)
    }

    /// Calls `function` from the host and runs it to completion.
    ///
    /// Frames pushed by the call are unwound when it fails, so the engine
    /// stays usable afterwards.
    pub fn call(&mut self, function: &Value, this: Value, args: &[Value]) -> Result<Value, Error> {
        let Value::Function(function) = function else {
            return Err(Error::TypeError("value is not a function"));
        };
        log::debug!("host call {}({} args)", function.name, args.len());

        let depth = self.frames.depth();
        let current = mem::replace(&mut self.current, Position::Halt);
        let scopes = self.scopes;
        let completion = self.completion.take();

        let result = match self.apply(function, this, args, Location::Host, false) {
            Ok(Status::Ok) => Ok(()),
            Ok(Status::Applied) => self.run(),
            Ok(Status::Trap(_)) => Err(Error::Internal("trap outside of a frame")),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            log::debug!(
                "unwinding {} frames after error: {err}",
                self.frames.depth() - depth
            );
            self.unwind(depth);
        }

        let value = mem::replace(&mut self.completion, completion).unwrap_or_default();
        self.current = current;
        self.scopes = scopes;
        result.map(|()| value)
    }

    fn unwind(&mut self, depth: usize) {
        while self.frames.depth() > depth {
            if self.frames.pop().is_none() {
                break;
            }
        }
    }

    fn return_address(&self, advance: bool) -> Position {
        if advance {
            self.current.advance()
        } else {
            self.current.clone()
        }
    }

    /// Invokes `function`. Natives without continuation run on the spot and
    /// report `Ok` with the result stored at `retval`. Everything else gets
    /// a frame and reports `Applied`; the dispatch loop then runs it and
    /// later returns to the current position, or the one after it when
    /// `advance` is set.
    pub(crate) fn apply(
        &mut self,
        function: &Rc<Function>,
        this: Value,
        args: &[Value],
        retval: Location,
        advance: bool,
    ) -> Result<Status, Error> {
        log::trace!("apply {} ({} args) -> {retval:?}", function.name, args.len());
        match &function.kind {
            FunctionKind::Native(native) if function.is_immediate() => {
                let mut arguments = Vec::with_capacity(args.len() + 1);
                arguments.push(this);
                arguments.extend_from_slice(args);

                self.retval = Value::Undefined;
                let status = native(&mut NativeContext::new(self, &arguments, None))?;
                if status == Status::Ok {
                    let value = mem::take(&mut self.retval);
                    self.store(retval, value);
                }
                Ok(status)
            }
            FunctionKind::Native(native) => {
                let return_address = self.return_address(advance);
                let index = self.native_frame(function, &this, args)?;
                let frame = &mut self.frames[index];
                frame.continuation = Some(Continuation::Entry(*native));
                frame.retval = retval;
                frame.return_address = return_address;
                self.current = Position::Nexus;
                Ok(Status::Applied)
            }
            FunctionKind::Lambda(code) => {
                let return_address = self.return_address(advance);
                let index = self.lambda_frame(function, code, &this, args)?;
                self.function_call(index, code, retval, return_address);
                Ok(Status::Applied)
            }
        }
    }

    /// Runs `function` in place of the native in frame `caller`: the new
    /// frame delivers to the caller's destination and the caller is popped
    /// unseen when the callee returns.
    pub(crate) fn activate(
        &mut self,
        function: &Rc<Function>,
        this: &Value,
        args: &[Value],
        caller: usize,
    ) -> Result<Status, Error> {
        let (retval, return_address) = {
            let caller = &self.frames[caller];
            (caller.retval, caller.return_address.clone())
        };

        match &function.kind {
            FunctionKind::Native(native) => {
                let index = self.native_frame(function, this, args)?;
                let frame = &mut self.frames[index];
                frame.continuation = Some(Continuation::Entry(*native));
                frame.retval = retval;
                frame.return_address = return_address;
                self.current = Position::Nexus;
            }
            FunctionKind::Lambda(code) => {
                let index = self.lambda_frame(function, code, this, args)?;
                self.function_call(index, code, retval, return_address);
            }
        }

        self.frames[caller].skip = true;
        Ok(Status::Applied)
    }

    /// `[continuation reserve][this or bound values][arguments]`
    fn native_frame(
        &mut self,
        function: &Rc<Function>,
        this: &Value,
        args: &[Value],
    ) -> Result<usize, Error> {
        let reserve = function.continuation_size;
        let leading = function.leading(this);
        let index = self.frames.allocate(reserve + leading.len() + args.len())?;

        let base = self.frames[index].base;
        let arguments = base.add(reserve);
        self.frames.write(arguments, leading);
        self.frames.write(arguments.add(leading.len()), args);

        let frame = &mut self.frames[index];
        frame.function = Some(Rc::clone(function));
        frame.arguments = arguments;
        frame.nargs = leading.len() + args.len();
        Ok(index)
    }

    /// `[this or bound values][arguments, padded][locals]`
    fn lambda_frame(
        &mut self,
        function: &Rc<Function>,
        code: &Code,
        this: &Value,
        args: &[Value],
    ) -> Result<usize, Error> {
        let leading = function.leading(this);
        let nargs = leading.len() + args.len().max(code.nargs);
        let index = self.frames.allocate(nargs + code.local_size())?;

        let arguments = self.frames[index].base;
        let local = arguments.add(nargs);
        self.frames.write(arguments, leading);
        self.frames.write(arguments.add(leading.len()), args);
        // padding and locals: fresh slots are already undefined
        self.frames.write(local, &code.locals);

        let frame = &mut self.frames[index];
        frame.function = Some(Rc::clone(function));
        frame.arguments = arguments;
        frame.nargs = nargs;
        frame.local = Some(local);
        Ok(index)
    }

    /// Switches execution into the lambda frame `index`.
    fn function_call(
        &mut self,
        index: usize,
        code: &Rc<Code>,
        retval: Location,
        return_address: Position,
    ) {
        let frame = &mut self.frames[index];
        frame.retval = retval;
        frame.return_address = return_address;
        let scopes = Scopes {
            arguments: Some(frame.arguments),
            nargs: frame.nargs,
            local: frame.local,
            local_size: code.local_size(),
        };
        frame.previous_scopes = Some(mem::replace(&mut self.scopes, scopes));
        self.current = Position::Code {
            code: Rc::clone(code),
            pc: 0,
        };
    }

    /// Pops the top frame and delivers `value` to its destination, then
    /// drops any frames that were waiting only to be skipped.
    pub(crate) fn complete(&mut self, value: Value) -> Result<(), Error> {
        let frame = self
            .frames
            .pop()
            .ok_or(Error::Internal("return from the root frame"))?;
        self.leave(&frame);
        if !frame.skip {
            self.store(frame.retval, value);
        }

        while self.frames.depth() > 1 && self.frames[self.frames.top()].skip {
            if let Some(skipped) = self.frames.pop() {
                log::trace!("popping skipped frame {:?}", skipped.function.as_ref().map(|f| &f.name));
                if let Some(scopes) = skipped.previous_scopes {
                    self.scopes = scopes;
                }
            }
        }
        Ok(())
    }

    fn leave(&mut self, frame: &Frame) {
        if let Some(scopes) = frame.previous_scopes {
            self.scopes = scopes;
        }
        self.current = frame.return_address.clone();
    }

    pub(crate) fn load(&self, location: Location) -> Value {
        match location {
            Location::Host => self.completion.clone().unwrap_or_default(),
            Location::Discard => Value::Undefined,
            Location::Slot(at) => self.frames.slot(at).clone(),
            Location::Scratch { frame, index } => match self
                .frames
                .get(frame)
                .and_then(|f| f.continuation.as_ref())
            {
                Some(Continuation::Join(join)) => join.scratch(index),
                _ => Value::Undefined,
            },
        }
    }

    pub(crate) fn store(&mut self, location: Location, value: Value) {
        match location {
            Location::Host => self.completion = Some(value),
            Location::Discard => {}
            Location::Slot(at) => self.frames.set(at, value),
            Location::Scratch { frame, index } => {
                if let Some(Continuation::Join(join)) = self
                    .frames
                    .get_mut(frame)
                    .and_then(|f| f.continuation.as_mut())
                {
                    join.set_scratch(index, value);
                }
            }
        }
    }

    fn operand_slot(&self, operand: Operand) -> Result<SlotRef, Error> {
        let slot = match operand {
            Operand::Arg(n) if usize::from(n) < self.scopes.nargs => {
                self.scopes.arguments.map(|a| a.add(n.into()))
            }
            Operand::Local(n) if usize::from(n) < self.scopes.local_size => {
                self.scopes.local.map(|l| l.add(n.into()))
            }
            _ => None,
        };
        slot.ok_or(Error::InvalidOperand(operand))
    }

    pub(crate) fn location(&self, operand: Operand) -> Result<Location, Error> {
        self.operand_slot(operand).map(Location::Slot)
    }

    pub(crate) fn read(&self, operand: Operand) -> Result<Value, Error> {
        match operand {
            Operand::Const(n) => match &self.current {
                Position::Code { code, .. } => code
                    .constants
                    .get(usize::from(n))
                    .cloned()
                    .ok_or(Error::InvalidOperand(operand)),
                _ => Err(Error::InvalidOperand(operand)),
            },
            _ => Ok(self.frames.slot(self.operand_slot(operand)?).clone()),
        }
    }

    pub(crate) fn write(&mut self, operand: Operand, value: Value) -> Result<(), Error> {
        let at = self.operand_slot(operand)?;
        self.frames.set(at, value);
        Ok(())
    }

    /// Property read. Arrays expose `length` and the built-in methods,
    /// functions expose `name` and the function methods.
    pub fn get_property(&self, object: &Value, key: &str) -> Result<Value, Error> {
        match object {
            Value::Undefined | Value::Null => {
                Err(Error::TypeError("cannot read properties of null or undefined"))
            }
            Value::Array(array) => match key {
                "length" => Ok(Value::Number(array.borrow().len() as f64)),
                _ => match array_index(&Value::from(key)) {
                    Some(index) => Ok(array.borrow().get_or_undefined(index)),
                    None => Ok(self.array_method(key).unwrap_or_default()),
                },
            },
            Value::Object(object) => Ok(object.borrow().get(key).cloned().unwrap_or_default()),
            Value::Function(function) => match key {
                "name" => Ok(Value::String(Rc::clone(&function.name))),
                _ => Ok(self.function_method(key).unwrap_or_default()),
            },
            Value::String(s) if key == "length" => {
                Ok(Value::Number(s.encode_utf16().count() as f64))
            }
            _ => Ok(Value::Undefined),
        }
    }

    pub fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Result<(), Error> {
        match object {
            Value::Undefined | Value::Null => {
                Err(Error::TypeError("cannot set properties of null or undefined"))
            }
            Value::Array(array) if key == "length" => {
                let length = array_length(&value)?;
                array.borrow_mut().truncate_or_extend(length)
            }
            Value::Array(array) => match array_index(&Value::from(key)) {
                Some(index) => array.borrow_mut().set(index, value),
                None => Err(Error::TypeError("arrays only hold indexed elements")),
            },
            Value::Object(object) => {
                object.borrow_mut().set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn get_index(&self, object: &Value, index: &Value) -> Result<Value, Error> {
        match (object, array_index(index)) {
            (Value::Array(array), Some(i)) => Ok(array.borrow().get_or_undefined(i)),
            (Value::String(s), Some(i)) => Ok(s
                .chars()
                .nth(i)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or_default()),
            _ => self.get_property(object, &index.to_string()),
        }
    }

    pub fn set_index(&mut self, object: &Value, index: &Value, value: Value) -> Result<(), Error> {
        match (object, array_index(index)) {
            (Value::Array(array), Some(i)) => array.borrow_mut().set(i, value),
            _ => self.set_property(object, &index.to_string(), value),
        }
    }
}

/// A value usable as an array index: an integer in `0..2^32 - 1`.
pub(crate) fn array_index(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => *n,
        Value::String(s) => {
            let n = s.parse::<f64>().ok()?;
            // only canonical spellings name an element
            if crate::number_to_string(n) != **s {
                return None;
            }
            n
        }
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0 && n < crate::array::MAX_LENGTH as f64).then_some(n as usize)
}

/// Validates a value assigned as an array length.
pub(crate) fn array_length(value: &Value) -> Result<usize, Error> {
    let n = value.to_number();
    if n >= 0.0 && n.fract() == 0.0 && n <= crate::array::MAX_LENGTH as f64 {
        Ok(n as usize)
    } else {
        Err(Error::RangeError("invalid array length"))
    }
}
