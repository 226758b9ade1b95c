use std::{collections::HashMap, rc::Rc};

use crate::Value;

/// Plain property table. Lookup is by key only; there is no prototype chain.
#[derive(Debug, Clone, Default)]
pub struct Object {
    properties: HashMap<Rc<str>, Value>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Rc<str>>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<Rc<str>>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
