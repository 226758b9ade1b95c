use quill::{
    Array, BinaryOp, CodeBuilder, Engine, EngineCreateInfo, Error, Operand, Value,
};

fn numbers(values: &[f64]) -> Value {
    Value::array(values.iter().map(|&n| Value::Number(n)).collect())
}

fn contents(value: &Value) -> Vec<f64> {
    let array = value.as_array().expect("array");
    let values = array.borrow().values().collect::<Vec<_>>();
    values.iter().map(Value::to_number).collect()
}

fn method(engine: &Engine, name: &str) -> Value {
    engine.array_method(name).expect("array method")
}

/// `function (a, b) { return a <op> b }`
fn binary(name: &str, op: BinaryOp) -> Value {
    let mut b = CodeBuilder::new(name);
    let x = b.param("a");
    let y = b.param("b");
    let t = b.temp();
    b.binary(op, t, x, y);
    b.ret(t);
    Value::function(b.build())
}

/// `function (x) { return x > limit }`
fn greater_than(limit: f64) -> Value {
    let mut b = CodeBuilder::new("greater_than");
    let x = b.param("x");
    let limit = b.constant(Value::Number(limit));
    let t = b.temp();
    b.binary(BinaryOp::Greater, t, x, limit);
    b.ret(t);
    Value::function(b.build())
}

/// `function (x, i, a) { log.push(x); a.<name>(args) }`
fn recording(log: &Value, name: &str, push_back: bool) -> Value {
    let mut b = CodeBuilder::new("recording");
    let x = b.param("x");
    let _ = b.param("i");
    let a = b.param("a");
    let log = b.local_with("log", log.clone());
    let (f, t) = (b.temp(), b.temp());
    b.get_property(f, log, "push");
    b.call(t, f, log, &[x]);
    b.get_property(f, a, name);
    let args: Vec<Operand> = if push_back { vec![x] } else { vec![] };
    b.call(t, f, a, &args);
    b.ret(t);
    Value::function(b.build())
}

#[test]
fn map_passes_element_and_index() {
    let mut engine = Engine::default();
    let scale = binary("scale", BinaryOp::Mul);
    let result = engine
        .call(&method(&engine, "map"), numbers(&[5.0, 6.0, 7.0]), &[scale])
        .expect("map");
    assert_eq!(contents(&result), vec![0.0, 6.0, 14.0]);
    assert_eq!(engine.depth(), 1);
}

#[test]
fn map_keeps_holes() {
    let mut engine = Engine::default();
    let array = Value::from_array(Array::from_slots(vec![
        Some(Value::Number(1.0)),
        None,
        Some(Value::Number(3.0)),
    ]));
    let result = engine
        .call(&method(&engine, "map"), array, &[greater_than(2.0)])
        .expect("map");
    let result = result.as_array().expect("array").borrow().clone();
    assert_eq!(result.len(), 3);
    assert!(result.is_hole(1));
    assert!(matches!(result.get(2), Some(Value::Boolean(true))));
}

#[test]
fn filter_some_and_every() {
    let mut engine = Engine::default();
    let array = numbers(&[1.0, 4.0, 2.0, 8.0]);

    let kept = engine
        .call(&method(&engine, "filter"), array.clone(), &[greater_than(2.0)])
        .expect("filter");
    assert_eq!(contents(&kept), vec![4.0, 8.0]);

    let some = engine
        .call(&method(&engine, "some"), array.clone(), &[greater_than(7.0)])
        .expect("some");
    assert!(some.is_true());

    let every = engine
        .call(&method(&engine, "every"), array.clone(), &[greater_than(0.0)])
        .expect("every");
    assert!(every.is_true());

    let every = engine
        .call(&method(&engine, "every"), array, &[greater_than(1.0)])
        .expect("every");
    assert!(!every.is_true());
    assert_eq!(engine.depth(), 1);
}

#[test]
fn reduce_in_both_directions() {
    let mut engine = Engine::default();
    let add = binary("add", BinaryOp::Add);

    let sum = engine
        .call(&method(&engine, "reduce"), numbers(&[1.0, 2.0, 3.0]), &[add.clone()])
        .expect("reduce");
    assert_eq!(sum.as_number(), Some(6.0));

    let seeded = engine
        .call(
            &method(&engine, "reduce"),
            numbers(&[1.0, 2.0]),
            &[add.clone(), Value::Number(10.0)],
        )
        .expect("reduce");
    assert_eq!(seeded.as_number(), Some(13.0));

    let letters = Value::array(vec![Value::string("a"), Value::string("b"), Value::string("c")]);
    let reversed = engine
        .call(&method(&engine, "reduceRight"), letters, &[add])
        .expect("reduceRight");
    assert_eq!(reversed.as_str(), Some("cba"));
}

#[test]
fn reduce_of_empty_array_without_seed_is_type_error() {
    let mut engine = Engine::default();
    let add = binary("add", BinaryOp::Add);
    let err = engine.call(&method(&engine, "reduce"), numbers(&[]), &[add]);
    assert!(matches!(err, Err(Error::TypeError(_))));
    assert_eq!(engine.depth(), 1);
}

#[test]
fn sort_with_script_comparator() {
    let mut engine = Engine::default();
    let descending = {
        let mut b = CodeBuilder::new("descending");
        let x = b.param("a");
        let y = b.param("b");
        let t = b.temp();
        b.binary(BinaryOp::Sub, t, y, x);
        b.ret(t);
        Value::function(b.build())
    };
    let array = numbers(&[3.0, 1.0, 4.0, 1.0, 5.0]);
    let result = engine
        .call(&method(&engine, "sort"), array.clone(), &[descending])
        .expect("sort");
    assert_eq!(contents(&array), vec![5.0, 4.0, 3.0, 1.0, 1.0]);
    assert!(result.strict_equals(&array));
}

#[test]
fn default_sort_compares_strings_and_moves_holes_last() {
    let mut engine = Engine::default();
    let array = Value::from_array(Array::from_slots(vec![
        Some(Value::Number(100.0)),
        None,
        Some(Value::Number(20.0)),
        Some(Value::Number(3.0)),
    ]));
    engine.call(&method(&engine, "sort"), array.clone(), &[]).expect("sort");
    let sorted = array.as_array().expect("array").borrow().clone();
    assert_eq!(sorted.get(0).and_then(Value::as_number), Some(100.0));
    assert_eq!(sorted.get(1).and_then(Value::as_number), Some(20.0));
    assert_eq!(sorted.get(2).and_then(Value::as_number), Some(3.0));
    assert!(sorted.is_hole(3));
}

#[test]
fn default_sort_converts_nested_arrays() {
    let mut engine = Engine::default();
    let array = Value::array(vec![numbers(&[2.0]), numbers(&[1.0, 5.0])]);
    engine.call(&method(&engine, "sort"), array.clone(), &[]).expect("sort");
    assert_eq!(array.to_string(), "1,5,2");
    assert_eq!(engine.depth(), 1);
}

#[test]
fn join_renders_nested_arrays() {
    let mut engine = Engine::default();
    let array = Value::array(vec![
        Value::Number(1.0),
        Value::array(vec![Value::Number(2.0), numbers(&[3.0, 4.0])]),
        Value::Null,
    ]);
    let result = engine
        .call(&method(&engine, "join"), array, &[Value::string("-")])
        .expect("join");
    assert_eq!(result.as_str(), Some("1-2,3,4-"));
}

#[test]
fn call_apply_and_bind() {
    let mut engine = Engine::default();
    // function (a, b) { return this + a + b }
    let combine = {
        let mut b = CodeBuilder::new("combine");
        let x = b.param("a");
        let y = b.param("b");
        let t = b.temp();
        b.binary(BinaryOp::Add, t, b.this(), x);
        b.binary(BinaryOp::Add, t, t, y);
        b.ret(t);
        Value::function(b.build())
    };
    let call = engine.function_method("call").expect("call");
    let apply = engine.function_method("apply").expect("apply");
    let bind = engine.function_method("bind").expect("bind");

    let called = engine
        .call(&call, combine.clone(), &[1.0.into(), 2.0.into(), 3.0.into()])
        .expect("call");
    assert_eq!(called.as_number(), Some(6.0));

    let applied = engine
        .call(&apply, combine.clone(), &[1.0.into(), numbers(&[2.0, 3.0])])
        .expect("apply");
    assert_eq!(applied.as_number(), Some(6.0));

    let bound = engine
        .call(&bind, combine, &[10.0.into(), 1.0.into()])
        .expect("bind");
    let result = engine.call(&bound, Value::Null, &[2.0.into()]).expect("bound");
    assert_eq!(result.as_number(), Some(13.0));

    let twice = engine
        .call(&bind, bound, &[Value::Null, 5.0.into()])
        .expect("bind");
    let result = engine.call(&twice, Value::Undefined, &[]).expect("bound twice");
    assert_eq!(result.as_number(), Some(16.0));
    assert_eq!(engine.depth(), 1);
}

#[test]
fn elements_pushed_by_a_callback_are_not_visited() {
    let mut engine = Engine::default();
    let log = Value::array(vec![]);
    let array = numbers(&[1.0, 2.0, 3.0]);
    engine
        .call(&method(&engine, "forEach"), array.clone(), &[recording(&log, "push", true)])
        .expect("forEach");
    assert_eq!(contents(&log), vec![1.0, 2.0, 3.0]);
    assert_eq!(contents(&array), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
}

#[test]
fn shifting_during_iteration_skips_elements() {
    let mut engine = Engine::default();
    let log = Value::array(vec![]);
    let array = numbers(&[1.0, 2.0, 3.0, 4.0]);
    engine
        .call(&method(&engine, "forEach"), array.clone(), &[recording(&log, "shift", false)])
        .expect("forEach");
    assert_eq!(contents(&log), vec![1.0, 3.0]);
    assert_eq!(contents(&array), vec![3.0, 4.0]);
}

#[test]
fn runaway_recursion_overflows_and_unwinds() {
    let mut engine = Engine::new(EngineCreateInfo {
        max_frames: Some(64),
        ..Default::default()
    });
    // function (f) { return f(f) }
    let recurse = {
        let mut b = CodeBuilder::new("recurse");
        let f = b.param("f");
        let t = b.temp();
        b.call(t, f, b.this(), &[f]);
        b.ret(t);
        Value::function(b.build())
    };
    let err = engine.call(&recurse, Value::Undefined, &[recurse.clone()]);
    assert!(matches!(err, Err(Error::StackOverflow)));
    assert_eq!(engine.depth(), 1);

    let add = binary("add", BinaryOp::Add);
    let result = engine
        .call(&add, Value::Undefined, &[1.0.into(), 2.0.into()])
        .expect("engine is usable after unwinding");
    assert_eq!(result.as_number(), Some(3.0));
}

#[test]
fn frame_blocks_are_released_after_each_call() {
    let mut engine = Engine::new(EngineCreateInfo {
        frame_spare_slots: Some(4),
        ..Default::default()
    });
    let reserved = engine.reserved_slots();
    let add = binary("add", BinaryOp::Add);
    for n in 0..8 {
        let result = engine
            .call(&add, Value::Undefined, &[Value::Number(n as f64), 1.0.into()])
            .expect("add");
        assert_eq!(result.as_number(), Some(n as f64 + 1.0));
        assert_eq!(engine.reserved_slots(), reserved);
        assert_eq!(engine.depth(), 1);
    }
}

#[test]
fn thrown_values_reach_the_host() {
    let mut engine = Engine::default();
    let thrower = {
        let mut b = CodeBuilder::new("thrower");
        let x = b.param("x");
        b.throw(x);
        Value::function(b.build())
    };
    let err = engine.call(
        &method(&engine, "map"),
        numbers(&[1.0]),
        &[thrower],
    );
    match err {
        Err(Error::Throw(value)) => assert_eq!(value.as_number(), Some(1.0)),
        other => panic!("expected a thrown value, got {other:?}"),
    }
    assert_eq!(engine.depth(), 1);
}

#[test]
fn for_each_skips_holes() {
    let mut engine = Engine::default();
    let log = Value::array(vec![]);
    // records the index instead of the element
    let record_index = {
        let mut b = CodeBuilder::new("record_index");
        let _ = b.param("x");
        let i = b.param("i");
        let log = b.local_with("log", log.clone());
        let (f, t) = (b.temp(), b.temp());
        b.get_property(f, log, "push");
        b.call(t, f, log, &[i]);
        b.ret(t);
        Value::function(b.build())
    };
    let array = Value::from_array(Array::from_slots(vec![
        Some(Value::Number(1.0)),
        None,
        Some(Value::Number(3.0)),
    ]));
    let result = engine
        .call(&method(&engine, "forEach"), array, &[record_index])
        .expect("forEach");
    assert!(matches!(result, Value::Undefined));
    assert_eq!(contents(&log), vec![0.0, 2.0]);
}

#[test]
fn reduce_of_single_element_skips_the_callback() {
    let mut engine = Engine::default();
    let thrower = {
        let mut b = CodeBuilder::new("thrower");
        let acc = b.param("acc");
        b.throw(acc);
        Value::function(b.build())
    };
    let result = engine
        .call(&method(&engine, "reduce"), numbers(&[42.0]), &[thrower])
        .expect("reduce");
    assert_eq!(result.as_number(), Some(42.0));
}

#[test]
fn constructed_holes_join_as_empty_segments() {
    let mut engine = Engine::default();
    let array = engine
        .call(&engine.array_constructor(), Value::Undefined, &[Value::Number(5.0)])
        .expect("Array(5)");
    let result = engine
        .call(&method(&engine, "join"), array, &[Value::string(",")])
        .expect("join");
    assert_eq!(result.as_str(), Some(",,,,"));

    let err = engine.call(&engine.array_constructor(), Value::Undefined, &[Value::Number(1.5)]);
    assert!(matches!(err, Err(Error::RangeError(_))));
}

#[test]
fn default_sort_of_small_numbers() {
    let mut engine = Engine::default();
    let array = numbers(&[3.0, 1.0, 2.0]);
    engine.call(&method(&engine, "sort"), array.clone(), &[]).expect("sort");
    assert_eq!(contents(&array), vec![1.0, 2.0, 3.0]);
}

#[test]
fn concatenating_a_self_containing_array() {
    let mut engine = Engine::default();
    // function (a) { return "" + a }
    let stringify = {
        let mut b = CodeBuilder::new("stringify");
        let a = b.param("a");
        let empty = b.constant(Value::string(""));
        let t = b.temp();
        b.binary(BinaryOp::Add, t, empty, a);
        b.ret(t);
        Value::function(b.build())
    };
    let array = numbers(&[1.0]);
    if let Value::Array(a) = &array {
        a.borrow_mut().push(&[array.clone()]).expect("push");
    }
    let result = engine
        .call(&stringify, Value::Undefined, &[array.clone()])
        .expect("concatenation");
    assert_eq!(result.as_str(), Some("1,"));

    if let Value::Array(a) = &array {
        a.borrow_mut().truncate_or_extend(0).expect("truncate");
    }
}

#[test]
fn filter_output_never_contains_holes() {
    let mut engine = Engine::default();
    let array = Value::from_array(Array::from_slots(vec![
        Some(Value::Number(1.0)),
        None,
        Some(Value::Number(5.0)),
        None,
        Some(Value::Number(7.0)),
    ]));

    for (limit, expected) in [(2.0, vec![5.0, 7.0]), (0.0, vec![1.0, 5.0, 7.0])] {
        let kept = engine
            .call(&method(&engine, "filter"), array.clone(), &[greater_than(limit)])
            .expect("filter");
        let kept_array = kept.as_array().expect("array").borrow().clone();
        assert_eq!(kept_array.len(), expected.len());
        assert!((0..kept_array.len()).all(|i| !kept_array.is_hole(i)));
        assert_eq!(contents(&kept), expected);
    }
}
