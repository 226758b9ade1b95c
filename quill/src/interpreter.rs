use std::rc::Rc;

use crate::{
    Code, Engine, Error, Instruction, Object, Position, Status, Trap, Value,
    coerce::{self, Coercion},
    continuation,
};

impl Engine {
    /// Dispatch loop: executes lambda code and resumes native continuations
    /// until control returns to the host.
    pub(crate) fn run(&mut self) -> Result<(), Error> {
        loop {
            match &self.current {
                Position::Halt => return Ok(()),
                Position::Nexus => self.nexus()?,
                Position::Code { code, pc } => {
                    let (code, pc) = (Rc::clone(code), *pc);
                    self.step(&code, pc)?;
                }
            }
        }
    }

    /// Resumes the continuation of the top frame.
    fn nexus(&mut self) -> Result<(), Error> {
        let frame = self.frames.top();
        let status = continuation::resume(self, frame)?;
        if matches!(status, Status::Ok | Status::Applied) {
            if let Some(f) = self.frames.get_mut(frame) {
                f.coercing = None;
            }
        }

        match status {
            Status::Ok => {
                let value = std::mem::take(&mut self.retval);
                self.complete(value)
            }
            Status::Applied => Ok(()),
            Status::Trap(trap) => self.trap(trap),
        }
    }

    /// Services a trap and leaves `current` untouched so the trapping step
    /// is retried once the fix-up is in place.
    pub(crate) fn trap(&mut self, trap: Trap) -> Result<(), Error> {
        let Trap::StringArg(location) = trap;
        let frame = self.frames.top();
        let value = self.load(location);
        log::debug!("string trap at {location:?} on {}", value.type_name());

        match coerce::string_coercion(self, &value) {
            Coercion::Ready(s) => {
                self.store(location, Value::String(s));
                Ok(())
            }
            Coercion::Invoke(function) => {
                if self.frames[frame].coercing == Some(location) {
                    return Err(Error::TypeError("cannot convert object to primitive value"));
                }
                self.frames[frame].coercing = Some(location);
                match self.apply(&function, value, &[], location, false)? {
                    Status::Ok | Status::Applied => Ok(()),
                    Status::Trap(_) => {
                        Err(Error::TypeError("cannot convert object to primitive value"))
                    }
                }
            }
        }
    }

    fn step(&mut self, code: &Rc<Code>, pc: usize) -> Result<(), Error> {
        let instruction = code
            .instructions
            .get(pc)
            .ok_or(Error::Internal("instruction pointer out of bounds"))?;
        let next = Position::Code {
            code: Rc::clone(code),
            pc: pc + 1,
        };

        match instruction {
            Instruction::Move { dst, src } => {
                let value = self.read(*src)?;
                self.write(*dst, value)?;
            }
            Instruction::Binary { op, dst, lhs, rhs } => {
                let value = op.apply(&self.read(*lhs)?, &self.read(*rhs)?);
                self.write(*dst, value)?;
            }
            Instruction::Not { dst, src } => {
                let value = Value::Boolean(!self.read(*src)?.is_true());
                self.write(*dst, value)?;
            }
            Instruction::Jump { target } => {
                self.current = Position::Code {
                    code: Rc::clone(code),
                    pc: *target,
                };
                return Ok(());
            }
            Instruction::JumpIfTrue { cond, target } | Instruction::JumpIfFalse { cond, target } => {
                let expected = matches!(instruction, Instruction::JumpIfTrue { .. });
                if self.read(*cond)?.is_true() == expected {
                    self.current = Position::Code {
                        code: Rc::clone(code),
                        pc: *target,
                    };
                    return Ok(());
                }
            }
            Instruction::GetIndex { dst, object, index } => {
                let value = self.get_index(&self.read(*object)?, &self.read(*index)?)?;
                self.write(*dst, value)?;
            }
            Instruction::SetIndex { object, index, src } => {
                let (object, index, value) =
                    (self.read(*object)?, self.read(*index)?, self.read(*src)?);
                self.set_index(&object, &index, value)?;
            }
            Instruction::GetProperty { dst, object, key } => {
                let value = self.get_property(&self.read(*object)?, key)?;
                self.write(*dst, value)?;
            }
            Instruction::SetProperty { object, key, src } => {
                let (object, value) = (self.read(*object)?, self.read(*src)?);
                self.set_property(&object, key, value)?;
            }
            Instruction::NewArray { dst, elements } => {
                let values = elements
                    .iter()
                    .map(|operand| self.read(*operand))
                    .collect::<Result<Vec<_>, _>>()?;
                self.write(*dst, Value::array(values))?;
            }
            Instruction::NewObject { dst } => {
                self.write(*dst, Value::object(Object::new()))?;
            }
            Instruction::Call {
                dst,
                callee,
                this,
                args,
            } => {
                let Value::Function(function) = self.read(*callee)? else {
                    return Err(Error::TypeError("value is not a function"));
                };
                let this = self.read(*this)?;
                let args = args
                    .iter()
                    .map(|operand| self.read(*operand))
                    .collect::<Result<Vec<_>, _>>()?;
                let retval = self.location(*dst)?;

                return match self.apply(&function, this, &args, retval, true)? {
                    Status::Ok => {
                        self.current = next;
                        Ok(())
                    }
                    Status::Applied => Ok(()),
                    Status::Trap(trap) => self.trap(trap),
                };
            }
            Instruction::Return { src } => {
                let value = self.read(*src)?;
                return self.complete(value);
            }
            Instruction::Throw { src } => {
                return Err(Error::Throw(self.read(*src)?));
            }
        }

        self.current = next;
        Ok(())
    }
}
