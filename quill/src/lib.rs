mod array;
mod code;
mod coerce;
mod continuation;
mod engine;
mod error;
mod frame;
mod function;
mod interpreter;
mod object;
mod primitives;
mod value;

pub use array::{ARRAY_SPARE, Array, MAX_LENGTH};
pub use code::*;
pub use coerce::{Coercion, string_coercion};
pub use continuation::{Continuation, Status, Trap};
pub use engine::{Engine, EngineCreateInfo, EngineSettings};
pub use error::Error;
pub use frame::*;
pub use function::*;
pub use object::Object;
pub use primitives::{
    ARRAY_CONSTRUCTOR, ARRAY_PROTOTYPE, FUNCTION_PROTOTYPE, IS_ARRAY, NativeContext, NativeMethod,
    STRING_COMPARE,
};
pub use value::*;
