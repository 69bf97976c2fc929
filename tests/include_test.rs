mod common;

use common::{data, dict, init_logger, v};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uliquid::{Error, FileSystem, MemoryFileSystem, RuntimeError, Template, Value};

struct TestFileSystem;

impl FileSystem for TestFileSystem {
    fn read(&self, path: &str) -> uliquid::Result<String> {
        let source = match path {
            "product" => "Product: {{ product.title }} ",
            "locale_variables" => "Locale: {{echo1}} {{echo2}}",
            "variant" => "Variant: {{ variant.title }}",
            "nested_template" => "{% include 'header' %} {% include 'body' %} {% include 'footer' %}",
            "body" => "body {% include 'body_detail' %}",
            "nested_product_template" => {
                "Product: {{ nested_product_template.title }} {%include 'details'%} "
            }
            "recursively_nested_template" => "-{% include 'recursively_nested_template' %}",
            "pick_a_source" => "from TestFileSystem",
            "assignments" => "{% assign foo = 'bar' %}",
            "break" => "{% break %}",
            other => other,
        };
        Ok(source.to_string())
    }
}

#[derive(Default)]
struct CountingFileSystem {
    count: AtomicUsize,
}

impl FileSystem for CountingFileSystem {
    fn read(&self, _path: &str) -> uliquid::Result<String> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok("from CountingFileSystem".to_string())
    }
}

fn render(source: &str, values: HashMap<String, Value>) -> uliquid::Result<String> {
    init_logger();
    Template::builder(source)
        .file_system(TestFileSystem)
        .build()?
        .render(values)
}

#[track_caller]
fn assert_include(source: &str, expected: &str, values: HashMap<String, Value>) {
    assert_eq!(render(source, values).unwrap(), expected, "template: {source}");
}

fn product(title: &str) -> Value {
    dict(vec![("title", v(title))])
}

fn products() -> Value {
    Value::Array(vec![product("Draft 151cm"), product("Element 155cm")])
}

#[test]
fn test_include_with() {
    assert_include(
        "{% include 'product' with products[0] %}",
        "Product: Draft 151cm ",
        data(vec![("products", products())]),
    );
}

#[test]
fn test_include_with_default_name() {
    assert_include(
        "{% include 'product' %}",
        "Product: Draft 151cm ",
        data(vec![("product", product("Draft 151cm"))]),
    );
}

#[test]
fn test_include_for() {
    assert_include(
        "{% include 'product' for products %}",
        "Product: Draft 151cm Product: Element 155cm ",
        data(vec![("products", products())]),
    );
}

#[test]
fn test_include_with_local_variables() {
    assert_include(
        "{% include 'locale_variables' echo1: 'test123' %}",
        "Locale: test123 ",
        HashMap::new(),
    );
    assert_include(
        "{% include 'locale_variables' echo1: 'test123', echo2: 'test321' %}",
        "Locale: test123 test321",
        HashMap::new(),
    );
    assert_include(
        "{% include 'locale_variables' echo1: echo1, echo2: more_echos.echo2 %}",
        "Locale: test123 test321",
        data(vec![
            ("echo1", v("test123")),
            ("more_echos", dict(vec![("echo2", v("test321"))])),
        ]),
    );
}

#[test]
fn test_locals_do_not_leak() {
    assert_include(
        "{% include 'locale_variables' echo1: 'x' %}[{{ echo1 }}]",
        "Locale: x [test]",
        data(vec![("echo1", v("test"))]),
    );
}

#[test]
fn test_included_templates_assign_variables() {
    assert_include("{% include 'assignments' %}{{ foo }}", "bar", HashMap::new());
}

#[test]
fn test_nested_includes() {
    assert_include("{% include 'body' %}", "body body_detail", HashMap::new());
    assert_include(
        "{% include 'nested_template' %}",
        "header body body_detail footer",
        HashMap::new(),
    );
    assert_include(
        "{% include 'nested_product_template' with product %}",
        "Product: Draft 151cm details ",
        data(vec![("product", product("Draft 151cm"))]),
    );
    assert_include(
        "{% include 'nested_product_template' for products %}",
        "Product: Draft 151cm details Product: Element 155cm details ",
        data(vec![("products", products())]),
    );
}

#[test]
fn test_dynamic_template_names() {
    assert_include("{% include template %}", "Test123", data(vec![("template", v("Test123"))]));
    assert_include(
        "{% include template for product %}",
        "Product: Draft 151cm ",
        data(vec![("template", v("product")), ("product", product("Draft 151cm"))]),
    );
    assert_include(
        "{% assign page = 'pick_a_source' %}{% include page %}",
        "from TestFileSystem",
        HashMap::new(),
    );
    assert_include(
        "{% assign page = 'product' %}{% include page for foo %}",
        "Product: Draft 151cm ",
        data(vec![("foo", product("Draft 151cm"))]),
    );
}

#[test]
fn test_include_inside_if() {
    assert_include(
        "{% if true %}{% include 'foo_if_true' %}{% endif %}",
        "foo_if_true",
        HashMap::new(),
    );
}

#[test]
fn test_missing_template_name_fails_at_render() {
    for source in ["{% include undefined_variable %}", "{% include nil %}"] {
        let template = Template::builder(source)
            .file_system(TestFileSystem)
            .build()
            .unwrap();
        assert!(matches!(
            template.render(HashMap::new()),
            Err(Error::Runtime(RuntimeError::FileSystem(_)))
        ));
    }
}

#[test]
fn test_partials_cached_within_one_render() {
    init_logger();
    let file_system = Arc::new(CountingFileSystem::default());
    let template = Template::builder("{% include 'pick_a_source' %}{% include 'pick_a_source' %}")
        .shared_file_system(file_system.clone())
        .build()
        .unwrap();

    assert_eq!(
        template.render(HashMap::new()).unwrap(),
        "from CountingFileSystemfrom CountingFileSystem"
    );
    assert_eq!(file_system.count.load(Ordering::SeqCst), 1);

    template.render(HashMap::new()).unwrap();
    assert_eq!(file_system.count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_break_through_include() {
    assert_include("{% for i in (1..3) %}{{ i }}{% break %}{{ i }}{% endfor %}", "1", HashMap::new());
    assert_include(
        "{% for i in (1..3) %}{{ i }}{% include 'break' %}{{ i }}{% endfor %}",
        "1",
        HashMap::new(),
    );
}

#[test]
fn test_recursive_include_is_bounded() {
    let template = Template::builder("{% include 'recursively_nested_template' %}")
        .file_system(TestFileSystem)
        .max_include_depth(5)
        .build()
        .unwrap();
    match template.render(HashMap::new()) {
        Err(Error::Runtime(RuntimeError::IncludeDepthExceeded(path))) => {
            assert_eq!(path, "recursively_nested_template")
        }
        other => panic!("Expected IncludeDepthExceeded, got {other:?}"),
    }
}

#[test]
fn test_memory_file_system() {
    init_logger();
    let partials = MemoryFileSystem::new()
        .with("header", "<h1>{{ title }}</h1>")
        .with("shop/price", "{{ price | times: 2 }}");
    let template = Template::builder("{% include 'header' %}{% include 'shop/price' %}")
        .file_system(partials)
        .build()
        .unwrap();
    let out = template
        .render(data(vec![("title", v("Shop")), ("price", v(&21))]))
        .unwrap();
    assert_eq!(out, "<h1>Shop</h1>42");
}

#[test]
fn test_nested_path_binds_last_component() {
    let partials = MemoryFileSystem::new().with("shop/item", "[{{ item }}]");
    let template = Template::builder("{% include 'shop/item' for items %}")
        .file_system(partials)
        .build()
        .unwrap();
    let out = template
        .render(data(vec![("items", v(&vec!["a", "b"]))]))
        .unwrap();
    assert_eq!(out, "[a][b]");
}
