use std::process;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use quill::{BinaryOp, CodeBuilder, Engine, EngineCreateInfo, Error, Object, Operand, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Demo {
    Map,
    Sort,
    Reduce,
    Join,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Demonstration program to run
    #[arg(long, value_enum, default_value_t = Demo::All)]
    demo: Demo,

    /// Spare slots added to every new frame block
    #[arg(long, help = "Frame block spare slots")]
    frame_spare: Option<usize>,

    /// Limit on slots held by frame blocks
    #[arg(long, help = "Maximum frame stack slots")]
    max_stack_slots: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn numbers(b: &mut CodeBuilder, values: &[f64]) -> Vec<Operand> {
    values.iter().map(|&n| b.constant(Value::Number(n))).collect()
}

/// `function (x) { return x * x }`
fn square() -> Value {
    let mut b = CodeBuilder::new("square");
    let x = b.param("x");
    let t = b.temp();
    b.binary(BinaryOp::Mul, t, x, x);
    b.ret(t);
    Value::function(b.build())
}

/// `function (a, b) { return b - a }`
fn descending() -> Value {
    let mut b = CodeBuilder::new("descending");
    let x = b.param("a");
    let y = b.param("b");
    let t = b.temp();
    b.binary(BinaryOp::Sub, t, y, x);
    b.ret(t);
    Value::function(b.build())
}

/// `function (acc, x) { return x > 2 ? acc + x : acc }`
fn sum_above_two() -> Value {
    let mut b = CodeBuilder::new("sum_above_two");
    let acc = b.param("acc");
    let x = b.param("x");
    let two = b.constant(Value::Number(2.0));
    let t = b.temp();
    b.binary(BinaryOp::Greater, t, x, two);
    let skip = b.jump_if_false(t);
    b.binary(BinaryOp::Add, t, acc, x);
    b.ret(t);
    b.bind(skip);
    b.ret(acc);
    Value::function(b.build())
}

/// `function () { return [1, 2, 3, 4, 5].map(square) }`
fn map_program() -> Value {
    let mut b = CodeBuilder::new("map_demo");
    let array = b.local("array");
    let f = b.local_with("square", square());
    let (method, result) = (b.temp(), b.temp());
    let elements = numbers(&mut b, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    b.new_array(array, &elements);
    b.get_property(method, array, "map");
    b.call(result, method, array, &[f]);
    b.ret(result);
    Value::function(b.build())
}

/// `function () { return [[3, 20, 100].sort(), [3, 20, 100].sort(descending)] }`
fn sort_program() -> Value {
    let mut b = CodeBuilder::new("sort_demo");
    let (left, right) = (b.local("left"), b.local("right"));
    let cmp = b.local_with("descending", descending());
    let (method, result) = (b.temp(), b.temp());
    let elements = numbers(&mut b, &[3.0, 20.0, 100.0]);
    b.new_array(left, &elements);
    b.new_array(right, &elements);
    b.get_property(method, left, "sort");
    b.call(left, method, left, &[]);
    b.call(right, method, right, &[cmp]);
    b.new_array(result, &[left, right]);
    b.ret(result);
    Value::function(b.build())
}

/// `function () { return [1, 2, 3, 4].reduce(sum_above_two, 0) }`
fn reduce_program() -> Value {
    let mut b = CodeBuilder::new("reduce_demo");
    let array = b.local("array");
    let f = b.local_with("sum_above_two", sum_above_two());
    let (method, result) = (b.temp(), b.temp());
    let zero = b.constant(Value::Number(0.0));
    let elements = numbers(&mut b, &[1.0, 2.0, 3.0, 4.0]);
    b.new_array(array, &elements);
    b.get_property(method, array, "reduce");
    b.call(result, method, array, &[f, zero]);
    b.ret(result);
    Value::function(b.build())
}

/// `function () { return [1, [2, 3], {toString}, null].join(" | ") }`
fn join_program() -> Value {
    let mut label = CodeBuilder::new("label");
    let text = label.constant(Value::string("object"));
    label.ret(text);
    let label = Value::function(label.build());

    let mut b = CodeBuilder::new("join_demo");
    let (array, inner, object) = (b.local("array"), b.local("inner"), b.local("object"));
    let to_string = b.local_with("label", label);
    let (method, result) = (b.temp(), b.temp());
    let separator = b.constant(Value::string(" | "));
    let null = b.constant(Value::Null);
    let one = b.constant(Value::Number(1.0));
    let elements = numbers(&mut b, &[2.0, 3.0]);
    b.new_array(inner, &elements);
    b.new_object(object);
    b.set_property(object, "toString", to_string);
    b.new_array(array, &[one, inner, object, null]);
    b.get_property(method, array, "join");
    b.call(result, method, array, &[separator]);
    b.ret(result);
    Value::function(b.build())
}

fn run(engine: &mut Engine, name: &str, program: Value) -> Result<(), Error> {
    let result = engine.call(&program, Value::object(Object::new()), &[])?;
    println!("{name}: {result}");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut engine = Engine::new(EngineCreateInfo {
        frame_spare_slots: cli.frame_spare,
        max_stack_slots: cli.max_stack_slots,
        ..Default::default()
    });

    let demos: &[(Demo, &str, fn() -> Value)] = &[
        (Demo::Map, "map", map_program),
        (Demo::Sort, "sort", sort_program),
        (Demo::Reduce, "reduce", reduce_program),
        (Demo::Join, "join", join_program),
    ];

    for &(demo, name, program) in demos {
        if cli.demo != Demo::All && cli.demo != demo {
            continue;
        }
        if let Err(err) = run(&mut engine, name, program()) {
            if err.is_fatal() {
                eprintln!("{name}: engine failure: {err}");
                process::exit(2);
            }
            eprintln!("{name} failed: {err}");
            process::exit(1);
        }
    }
}
