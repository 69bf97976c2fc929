mod common;

use common::{data, init_logger, v};
use std::collections::HashMap;
use uliquid::{Template, Value};

fn parse(source: &str) -> Template {
    init_logger();
    Template::parse(source).unwrap()
}

#[test]
fn test_increment() {
    let template = parse("{% increment port %} {% increment port %} {% increment port %}");
    assert_eq!(template.render(HashMap::new()).unwrap(), "0 1 2");
}

#[test]
fn test_decrement_shows_next_value() {
    let template = parse("{% decrement port %} {% decrement port %}");
    assert_eq!(template.render(HashMap::new()).unwrap(), "-1 -2");
}

#[test]
fn test_counters_are_independent_of_assigned_variables() {
    let template = parse("{% assign var = 10 %}{% increment var %}{% increment var %}{{ var }}");
    assert_eq!(template.render(HashMap::new()).unwrap(), "0110");

    let template = parse("{% increment count %}{{ count }}");
    assert_eq!(template.render(data(vec![("count", v("shadow"))])).unwrap(), "0shadow");
}

#[test]
fn test_counters_persist_across_renders() {
    let template = parse("{% increment a %}{% decrement b %}");
    assert_eq!(template.render(HashMap::new()).unwrap(), "0-1");
    assert_eq!(template.render(HashMap::new()).unwrap(), "1-2");
    assert_eq!(template.environment("a"), Some(Value::Int(2)));
    assert_eq!(template.environment("b"), Some(Value::Int(-2)));
}

#[test]
fn test_seeded_environment() {
    let template = parse("{% increment a %}{% decrement a %}{% decrement a %}");
    template.set_environment("a", Value::Int(5));
    assert_eq!(template.render(HashMap::new()).unwrap(), "554");

    template.clear_environment();
    assert_eq!(template.environment("a"), None);
    assert_eq!(template.render(HashMap::new()).unwrap(), "00-1");
}

#[test]
fn test_environment_shared_with_includes() {
    init_logger();
    let partials = uliquid::MemoryFileSystem::new().with("tick", "{% increment n %}");
    let template = Template::builder("{% include 'tick' %}{% include 'tick' %}{% increment n %}")
        .file_system(partials)
        .build()
        .unwrap();
    assert_eq!(template.render(HashMap::new()).unwrap(), "012");
}

#[test]
fn test_concurrent_renders_share_counters() {
    let template = parse("{% increment n %}{% decrement d %}{% for i in (1..200) %}{{ i }}{% endfor %}");
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..200 {
                    template.render(HashMap::new()).unwrap();
                }
            });
        }
    });
    assert_eq!(template.environment("n"), Some(Value::Int(1600)));
    assert_eq!(template.environment("d"), Some(Value::Int(-1600)));
}
