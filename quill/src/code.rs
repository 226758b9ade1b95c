//! Lambda bytecode: register-style instructions over argument, local and
//! constant operands, plus a builder that resolves names and patches jumps.
use std::rc::Rc;

use crate::{Function, Value};

/// Where an instruction reads or writes.
///
/// `Arg(0)` is `this` (or the first bound value), call-site arguments start
/// at `Arg(1)`. Locals are initialized from the code's template on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Arg(u16),
    Local(u16),
    Const(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    StrictEqual,
    StrictNotEqual,
}

impl BinaryOp {
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Value {
        match self {
            Self::Add => match (lhs, rhs) {
                (Value::String(a), b) => Value::string(format!("{a}{b}")),
                (a, Value::String(b)) => Value::string(format!("{a}{b}")),
                (a, b) => Value::Number(a.to_number() + b.to_number()),
            },
            Self::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
            Self::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
            Self::Div => Value::Number(lhs.to_number() / rhs.to_number()),
            Self::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
            Self::Less => compare(lhs, rhs, |o| o.is_lt()),
            Self::LessEqual => compare(lhs, rhs, |o| o.is_le()),
            Self::Greater => compare(lhs, rhs, |o| o.is_gt()),
            Self::GreaterEqual => compare(lhs, rhs, |o| o.is_ge()),
            Self::StrictEqual => Value::Boolean(lhs.strict_equals(rhs)),
            Self::StrictNotEqual => Value::Boolean(!lhs.strict_equals(rhs)),
        }
    }
}

fn compare(
    lhs: &Value,
    rhs: &Value,
    test: impl Fn(std::cmp::Ordering) -> bool,
) -> Value {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    };
    Value::Boolean(ordering.is_some_and(test))
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Move { dst: Operand, src: Operand },
    Binary { op: BinaryOp, dst: Operand, lhs: Operand, rhs: Operand },
    Not { dst: Operand, src: Operand },
    Jump { target: usize },
    JumpIfTrue { cond: Operand, target: usize },
    JumpIfFalse { cond: Operand, target: usize },
    /// `dst = object[index]` for arrays, `undefined` otherwise.
    GetIndex { dst: Operand, object: Operand, index: Operand },
    SetIndex { object: Operand, index: Operand, src: Operand },
    /// Property read, including array `length` and built-in methods.
    GetProperty { dst: Operand, object: Operand, key: Rc<str> },
    SetProperty { object: Operand, key: Rc<str>, src: Operand },
    NewArray { dst: Operand, elements: Vec<Operand> },
    NewObject { dst: Operand },
    Call { dst: Operand, callee: Operand, this: Operand, args: Vec<Operand> },
    Return { src: Operand },
    Throw { src: Operand },
}

#[derive(Debug)]
pub struct Code {
    pub name: Rc<str>,
    pub instructions: Vec<Instruction>,
    pub constants: Vec<Value>,
    /// Declared parameter count; missing arguments are padded with
    /// `undefined` up to this.
    pub nargs: usize,
    /// Initial values of the local scope, copied into every new frame.
    pub locals: Vec<Value>,
}

impl Code {
    #[inline]
    pub fn local_size(&self) -> usize {
        self.locals.len()
    }
}

/// Resumption point of the dispatch loop.
#[derive(Debug, Clone, Default)]
pub enum Position {
    /// Nothing left to run; the host call is complete.
    #[default]
    Halt,
    /// Resume the continuation of the frame on top of the stack.
    Nexus,
    Code { code: Rc<Code>, pc: usize },
}

impl Position {
    pub fn advance(&self) -> Position {
        match self {
            Self::Code { code, pc } => Self::Code {
                code: Rc::clone(code),
                pc: pc + 1,
            },
            other => other.clone(),
        }
    }
}

/// Name lookup used while assembling code.
pub trait Resolve {
    fn resolve(&self, name: &str) -> Option<Operand>;
}

/// A forward jump whose target has not been bound yet.
#[derive(Debug)]
#[must_use]
pub struct Label {
    instruction: usize,
}

/// Assembles a [`Code`] object.
///
/// Parameters become `Arg(1..)`, named and temporary locals become
/// `Local(..)`, constants are interned by strict equality.
#[derive(Debug)]
pub struct CodeBuilder {
    name: Rc<str>,
    params: Vec<Rc<str>>,
    locals: Vec<(Option<Rc<str>>, Value)>,
    constants: Vec<Value>,
    instructions: Vec<Instruction>,
}

impl CodeBuilder {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            locals: Vec::new(),
            constants: Vec::new(),
            instructions: Vec::new(),
        }
    }

    #[inline]
    pub fn this(&self) -> Operand {
        Operand::Arg(0)
    }

    pub fn param(&mut self, name: impl Into<Rc<str>>) -> Operand {
        self.params.push(name.into());
        Operand::Arg(self.params.len() as u16)
    }

    pub fn local(&mut self, name: impl Into<Rc<str>>) -> Operand {
        self.local_with(name, Value::Undefined)
    }

    pub fn local_with(&mut self, name: impl Into<Rc<str>>, init: Value) -> Operand {
        self.locals.push((Some(name.into()), init));
        Operand::Local(self.locals.len() as u16 - 1)
    }

    pub fn temp(&mut self) -> Operand {
        self.locals.push((None, Value::Undefined));
        Operand::Local(self.locals.len() as u16 - 1)
    }

    pub fn constant(&mut self, value: Value) -> Operand {
        let existing = self.constants.iter().position(|c| {
            c.strict_equals(&value) && c.type_name() == value.type_name()
        });
        let index = existing.unwrap_or_else(|| {
            self.constants.push(value);
            self.constants.len() - 1
        });
        Operand::Const(index as u16)
    }

    /// Current instruction index, the target for backward jumps.
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn mov(&mut self, dst: Operand, src: Operand) {
        self.emit(Instruction::Move { dst, src });
    }

    pub fn binary(&mut self, op: BinaryOp, dst: Operand, lhs: Operand, rhs: Operand) {
        self.emit(Instruction::Binary { op, dst, lhs, rhs });
    }

    pub fn not(&mut self, dst: Operand, src: Operand) {
        self.emit(Instruction::Not { dst, src });
    }

    pub fn new_array(&mut self, dst: Operand, elements: &[Operand]) {
        self.emit(Instruction::NewArray { dst, elements: elements.to_vec() });
    }

    pub fn new_object(&mut self, dst: Operand) {
        self.emit(Instruction::NewObject { dst });
    }

    pub fn get_index(&mut self, dst: Operand, object: Operand, index: Operand) {
        self.emit(Instruction::GetIndex { dst, object, index });
    }

    pub fn set_index(&mut self, object: Operand, index: Operand, src: Operand) {
        self.emit(Instruction::SetIndex { object, index, src });
    }

    pub fn get_property(&mut self, dst: Operand, object: Operand, key: &str) {
        self.emit(Instruction::GetProperty { dst, object, key: key.into() });
    }

    pub fn set_property(&mut self, object: Operand, key: &str, src: Operand) {
        self.emit(Instruction::SetProperty { object, key: key.into(), src });
    }

    pub fn call(&mut self, dst: Operand, callee: Operand, this: Operand, args: &[Operand]) {
        self.emit(Instruction::Call { dst, callee, this, args: args.to_vec() });
    }

    pub fn ret(&mut self, src: Operand) {
        self.emit(Instruction::Return { src });
    }

    pub fn throw(&mut self, src: Operand) {
        self.emit(Instruction::Throw { src });
    }

    pub fn jump(&mut self) -> Label {
        let instruction = self.emit(Instruction::Jump { target: usize::MAX });
        Label { instruction }
    }

    pub fn jump_if_true(&mut self, cond: Operand) -> Label {
        let instruction = self.emit(Instruction::JumpIfTrue { cond, target: usize::MAX });
        Label { instruction }
    }

    pub fn jump_if_false(&mut self, cond: Operand) -> Label {
        let instruction = self.emit(Instruction::JumpIfFalse { cond, target: usize::MAX });
        Label { instruction }
    }

    pub fn jump_back(&mut self, target: usize) {
        self.emit(Instruction::Jump { target });
    }

    /// Binds a forward jump to the next emitted instruction.
    pub fn bind(&mut self, label: Label) {
        let here = self.instructions.len();
        match &mut self.instructions[label.instruction] {
            Instruction::Jump { target }
            | Instruction::JumpIfTrue { target, .. }
            | Instruction::JumpIfFalse { target, .. } => *target = here,
            _ => unreachable!("label does not point at a jump"),
        }
    }

    pub fn finish(self) -> Code {
        Code {
            name: self.name,
            instructions: self.instructions,
            constants: self.constants,
            nargs: self.params.len(),
            locals: self.locals.into_iter().map(|(_, init)| init).collect(),
        }
    }

    pub fn build(self) -> Function {
        Function::lambda(Rc::new(self.finish()))
    }
}

impl Resolve for CodeBuilder {
    fn resolve(&self, name: &str) -> Option<Operand> {
        if name == "this" {
            return Some(Operand::Arg(0));
        }
        if let Some(i) = self.params.iter().position(|p| &**p == name) {
            return Some(Operand::Arg(i as u16 + 1));
        }
        self.locals
            .iter()
            .position(|(n, _)| n.as_deref() == Some(name))
            .map(|i| Operand::Local(i as u16))
    }
}
