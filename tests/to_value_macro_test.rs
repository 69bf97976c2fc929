mod common;

use common::init_logger;
use uliquid::{Template, ToValue, Value};

#[derive(uliquid::ToValue)]
struct Variant {
    title: String,
    price: i64,
}

#[derive(uliquid::ToValue)]
struct Product {
    title: String,
    #[value(rename = "handle")]
    slug: String,
    #[value(ignore)]
    #[allow(dead_code)]
    internal_notes: String,
    variants: Vec<Variant>,
    vendor: Option<String>,
    available: bool,
}

fn product() -> Product {
    Product {
        title: "Draft 151cm".into(),
        slug: "draft-151".into(),
        internal_notes: "do not show".into(),
        variants: vec![
            Variant {
                title: "Red".into(),
                price: 100,
            },
            Variant {
                title: "Blue".into(),
                price: 120,
            },
        ],
        vendor: None,
        available: true,
    }
}

#[test]
fn test_derived_fields() {
    let value = product().to_value();
    let Value::Dictionary(map) = &value else {
        panic!("Expected dictionary, got {value:?}");
    };
    assert_eq!(map.get("title"), Some(&Value::String("Draft 151cm".into())));
    assert_eq!(map.get("handle"), Some(&Value::String("draft-151".into())));
    assert!(!map.contains_key("slug"));
    assert!(!map.contains_key("internal_notes"));
    assert_eq!(map.get("vendor"), Some(&Value::Nil));
    assert_eq!(map.get("available"), Some(&Value::Bool(true)));
    assert_eq!(map.get("variants").map(Value::size), Some(2));
}

#[test]
fn test_render_value() {
    init_logger();
    let template = Template::parse(
        "{{ title }} ({{ handle }}){% for v in variants %} {{ v.title }}:{{ v.price }}{% endfor %}\
         {% if vendor %} by {{ vendor }}{% endif %}[{{ internal_notes }}]",
    )
    .unwrap();
    assert_eq!(
        template.render_value(&product()).unwrap(),
        "Draft 151cm (draft-151) Red:100 Blue:120[]"
    );
}

#[test]
fn test_render_value_requires_dictionary() {
    let template = Template::parse("{{ x }}").unwrap();
    assert!(matches!(
        template.render_value(&vec![1, 2]),
        Err(uliquid::Error::Conversion(_))
    ));
    assert_eq!(template.render_value(&Value::Nil).unwrap(), "");
}
