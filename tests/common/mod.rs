#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Once;
use uliquid::{Template, ToValue, Value};

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .is_test(true)
            .try_init();
    });
}

/// Builds render data from key/value pairs.
pub fn data(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub fn dict(pairs: Vec<(&str, Value)>) -> Value {
    Value::Dictionary(data(pairs))
}

pub fn v<T: ToValue + ?Sized>(value: &T) -> Value {
    value.to_value()
}

pub fn render(source: &str, values: HashMap<String, Value>) -> String {
    init_logger();
    Template::parse(source)
        .unwrap_or_else(|e| panic!("failed to parse {source:?}: {e}"))
        .render(values)
        .unwrap_or_else(|e| panic!("failed to render {source:?}: {e}"))
}

#[track_caller]
pub fn assert_template(source: &str, expected: &str, values: HashMap<String, Value>) {
    assert_eq!(render(source, values), expected, "template: {source}");
}
