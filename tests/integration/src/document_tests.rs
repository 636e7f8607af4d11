//! Document ingestion tests: JSON and TOML files flattened into the store
//! and read back through bound configuration objects.

use conf_model::{ConfigurationObject, PropertyDescriptor, ScalarKind, Schema, Value};
use conf_store::{ConfigPath, ConfigurationSource, MemoryStore};
use pretty_assertions::assert_eq;
use std::fs;
use std::rc::Rc;
use std::sync::Arc;

fn server_schema() -> Arc<Schema> {
    let listener = Schema::builder("Listener")
        .property(PropertyDescriptor::scalar("Port", ScalarKind::Integer))
        .build()
        .unwrap();
    Schema::builder("Server")
        .property(PropertyDescriptor::scalar("Host", ScalarKind::String).nullable())
        .property(
            PropertyDescriptor::scalar("Verbose", ScalarKind::Boolean)
                .with_default(Value::Boolean(false)),
        )
        .property(PropertyDescriptor::list("Listeners", listener))
        .build()
        .unwrap()
}

#[test]
fn json_file_binds_into_a_typed_object() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("server.json");
    fs::write(
        &file,
        r#"{
            "Host": "0.0.0.0",
            "Verbose": true,
            "Listeners": [ { "Port": 8080 }, { "Port": 8443 } ]
        }"#,
    )
    .unwrap();

    let store = Rc::new(MemoryStore::from_file(&file).unwrap());
    let server = ConfigurationObject::bind(&server_schema(), store).unwrap();

    assert_eq!(server.get_str("Host").unwrap(), Some("0.0.0.0".to_string()));
    assert_eq!(server.get_bool("Verbose").unwrap(), Some(true));

    let listeners = server.get_list("Listeners").unwrap();
    assert_eq!(listeners.len(), 2);
    assert_eq!(listeners.get(0).unwrap().get_i64("Port").unwrap(), Some(8080));
    assert_eq!(listeners.get(1).unwrap().get_i64("Port").unwrap(), Some(8443));
}

#[test]
fn toml_file_binds_into_a_typed_object() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("server.toml");
    fs::write(
        &file,
        r#"
Host = "localhost"

[[Listeners]]
Port = 9000
"#,
    )
    .unwrap();

    let store = Rc::new(MemoryStore::from_file(&file).unwrap());
    let server = ConfigurationObject::bind(&server_schema(), store).unwrap();

    assert_eq!(server.get_str("Host").unwrap(), Some("localhost".to_string()));
    // Not present in the document; the declared default applies.
    assert_eq!(server.get_bool("Verbose").unwrap(), Some(false));
    let listeners = server.get_list("Listeners").unwrap();
    assert_eq!(listeners.get(0).unwrap().get_i64("Port").unwrap(), Some(9000));
}

#[test]
fn document_edits_write_back_as_plain_entries() {
    let store = Rc::new(
        MemoryStore::from_json_str(r#"{ "Host": "a", "Listeners": [] }"#).unwrap(),
    );
    let server = ConfigurationObject::bind(&server_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();
    server.set_str("Host", "b").unwrap();
    server.save().unwrap();

    assert_eq!(store.get(&ConfigPath::new("Host")), Some("b".to_string()));
}

#[test]
fn malformed_documents_are_rejected_with_the_format_named() {
    let err = MemoryStore::from_json_str("{ not json").unwrap_err();
    assert!(err.to_string().contains("JSON"));

    let err = MemoryStore::from_toml_str("= broken").unwrap_err();
    assert!(err.to_string().contains("TOML"));
}
