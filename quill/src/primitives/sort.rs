//! In-place insertion sort driven by a comparator that may run as script
//! code. The sort is stable: a pair stays in place whenever the comparator
//! reports it as `<= 0`. Holes sort after every element.
use std::{cmp::Ordering, rc::Rc};

use crate::{ArrayRef, Continuation, Error, Function, NativeContext, Status, Trap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStep {
    /// Compare elements `n - 1` and `n`.
    ComparePair,
    /// Swap them and continue with `n - 1`.
    Swap,
    /// Extend the sorted prefix by one element.
    AdvanceBoundary,
    Done,
}

enum Pair {
    Values(Value, Value),
    /// A hole followed by an element; always out of order.
    HoleFirst,
    /// In order without asking the comparator.
    Ordered,
}

#[derive(Debug)]
pub struct Sort {
    array: ArrayRef,
    comparator: Rc<Function>,
    /// End of the sorted prefix.
    current: usize,
    n: usize,
    step: SortStep,
    /// A comparator call is in flight and its result is in the deposit.
    awaiting: bool,
}

impl Sort {
    fn pair(&self) -> Pair {
        let array = self.array.borrow();
        if self.n == 0 || self.n >= array.len() {
            return Pair::Ordered;
        }
        let slots = array.slots();
        match (&slots[self.n - 1], &slots[self.n]) {
            (Some(left), Some(right)) => Pair::Values(left.clone(), right.clone()),
            (None, Some(_)) => Pair::HoleFirst,
            _ => Pair::Ordered,
        }
    }

    /// Only a result `<= 0` keeps the pair; NaN swaps it.
    fn decide(&mut self, result: &Value) {
        self.awaiting = false;
        self.step = if result.to_number() <= 0.0 {
            SortStep::AdvanceBoundary
        } else {
            SortStep::Swap
        };
    }

    pub(crate) fn resume(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let deposit = ctx.reserve(0)?;
        if self.awaiting {
            self.decide(&ctx.load(deposit));
        }

        loop {
            match self.step {
                SortStep::ComparePair => match self.pair() {
                    Pair::Values(left, right) => {
                        self.awaiting = true;
                        match ctx.apply(&self.comparator, Value::Undefined, &[left, right], deposit)? {
                            Status::Ok => self.decide(&ctx.load(deposit)),
                            status => return Ok(status),
                        }
                    }
                    Pair::HoleFirst => self.step = SortStep::Swap,
                    Pair::Ordered => self.step = SortStep::AdvanceBoundary,
                },
                SortStep::Swap => {
                    let mut array = self.array.borrow_mut();
                    if self.n < array.len() {
                        array.slots_mut().swap(self.n - 1, self.n);
                    }
                    self.n -= 1;
                    self.step = SortStep::ComparePair;
                }
                SortStep::AdvanceBoundary => {
                    self.current += 1;
                    self.n = self.current;
                    self.step = if self.current < self.array.borrow().len() {
                        SortStep::ComparePair
                    } else {
                        SortStep::Done
                    };
                }
                SortStep::Done => return ctx.ret(Value::Array(Rc::clone(&self.array))),
            }
        }
    }
}

pub fn sort(ctx: &mut NativeContext) -> Result<Status, Error> {
    let this = ctx.this();
    let Some(array) = this.as_array().cloned() else {
        return ctx.ret(this);
    };
    if array.borrow().len() <= 1 {
        return ctx.ret(this);
    }

    let comparator = match ctx.argument(1) {
        Value::Function(comparator) => comparator,
        _ => ctx.engine.string_compare(),
    };
    let mut sort = Sort {
        array,
        comparator,
        current: 0,
        n: 0,
        step: SortStep::AdvanceBoundary,
        awaiting: false,
    };
    let status = sort.resume(ctx);
    ctx.install(Continuation::Sort(sort));
    status
}

/// Default comparator: orders by string value, trapping until both
/// arguments are strings.
pub fn string_compare(ctx: &mut NativeContext) -> Result<Status, Error> {
    for n in [1, 2] {
        if !ctx.argument(n).is_string() {
            return Ok(Status::Trap(Trap::StringArg(ctx.argument_location(n)?)));
        }
    }
    let order = match (ctx.argument(1), ctx.argument(2)) {
        (Value::String(a), Value::String(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    };
    ctx.ret(Value::Number(match order {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{BinaryOp, CodeBuilder, Engine, Object, Value};

    fn numbers(values: &[f64]) -> Value {
        Value::array(values.iter().map(|&n| Value::Number(n)).collect())
    }

    /// `function (a, b) { return a - b }`
    fn ascending() -> Value {
        let mut b = CodeBuilder::new("ascending");
        let x = b.param("a");
        let y = b.param("b");
        let t = b.temp();
        b.binary(BinaryOp::Sub, t, x, y);
        b.ret(t);
        Value::function(b.build())
    }

    /// `function (a, b) { return a.k - b.k }`
    fn by_key() -> Value {
        let mut b = CodeBuilder::new("by_key");
        let x = b.param("a");
        let y = b.param("b");
        let (kx, ky) = (b.temp(), b.temp());
        b.get_property(kx, x, "k");
        b.get_property(ky, y, "k");
        b.binary(BinaryOp::Sub, kx, kx, ky);
        b.ret(kx);
        Value::function(b.build())
    }

    fn sort(engine: &mut Engine, this: &Value, args: &[Value]) -> Value {
        let method = engine.array_method("sort").unwrap_or_default();
        engine.call(&method, this.clone(), args).expect("sort")
    }

    #[test]
    fn sorts_numbers_with_script_comparator() {
        let mut engine = Engine::default();
        let array = numbers(&[3.0, 1.0, 2.0, 10.0]);
        let result = sort(&mut engine, &array, &[ascending()]);
        assert!(result.strict_equals(&array));
        assert_eq!(array.to_string(), "1,2,3,10");
    }

    #[test]
    fn default_order_compares_strings() {
        let mut engine = Engine::default();
        let array = numbers(&[3.0, 1.0, 2.0, 10.0]);
        sort(&mut engine, &array, &[]);
        assert_eq!(array.to_string(), "1,10,2,3");
        assert_eq!(engine.depth(), 1);
    }

    #[test]
    fn equal_keys_keep_their_order() {
        let mut engine = Engine::default();
        let item = |k: f64, tag: &str| {
            Value::object(Object::with_properties([
                ("k", Value::Number(k)),
                ("tag", Value::string(tag)),
            ]))
        };
        let array = Value::array(vec![item(2.0, "a"), item(1.0, "b"), item(2.0, "c"), item(1.0, "d")]);
        sort(&mut engine, &array, &[by_key()]);

        let array = array.as_array().cloned().expect("array");
        let tags: Vec<String> = array
            .borrow()
            .values()
            .map(|v| match v {
                Value::Object(o) => o.borrow().get("tag").map(|t| t.to_string()).unwrap_or_default(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(tags, ["b", "d", "a", "c"]);
    }

    #[test]
    fn nan_comparator_result_swaps_the_pair() {
        // function (a, b) { return a - undefined }
        let not_a_number = {
            let mut b = CodeBuilder::new("not_a_number");
            let x = b.param("a");
            let _ = b.param("b");
            let undefined = b.constant(Value::Undefined);
            let t = b.temp();
            b.binary(BinaryOp::Sub, t, x, undefined);
            b.ret(t);
            Value::function(b.build())
        };
        let mut engine = Engine::default();
        let array = numbers(&[1.0, 2.0]);
        sort(&mut engine, &array, &[not_a_number]);
        assert_eq!(array.to_string(), "2,1");
    }

    #[test]
    fn holes_sort_last() {
        let mut engine = Engine::default();
        let array = numbers(&[]);
        if let Value::Array(a) = &array {
            let mut a = a.borrow_mut();
            a.set(1, Value::Number(5.0)).expect("set");
            a.set(3, Value::Number(4.0)).expect("set");
        }
        sort(&mut engine, &array, &[ascending()]);
        let array = array.as_array().cloned().expect("array");
        let array = array.borrow();
        assert_eq!(array.get(0).and_then(Value::as_number), Some(4.0));
        assert_eq!(array.get(1).and_then(Value::as_number), Some(5.0));
        assert!(array.is_hole(2));
        assert!(array.is_hole(3));
    }

    #[test]
    fn short_and_non_array_receivers_return_unchanged() {
        let mut engine = Engine::default();
        let single = numbers(&[1.0]);
        assert!(sort(&mut engine, &single, &[]).strict_equals(&single));
        let result = sort(&mut engine, &Value::Number(7.0), &[]);
        assert_eq!(result.as_number(), Some(7.0));
    }
}
