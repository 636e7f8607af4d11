//! End-to-end tests for the configuration object model
//!
//! These exercise the complete flow: store population -> schema binding ->
//! typed access -> edit -> save -> rebind, including collections,
//! dictionaries, external-change reloads and batch-update scopes.

use conf_model::{
    ChangeEvent, ConfigurationObject, Error, PropertyDescriptor, ScalarKind, Schema, Value,
};
use conf_store::{ConfigPath, ConfigurationSource, MemoryStore, WatchGuard};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// The application shape used throughout: scalars, a nested section, an
/// ordered collection and a keyed dictionary.
fn app_schema() -> Arc<Schema> {
    let endpoint = Schema::builder("Endpoint")
        .property(PropertyDescriptor::scalar("Url", ScalarKind::String).nullable())
        .property(
            PropertyDescriptor::scalar("TimeoutMs", ScalarKind::Integer)
                .with_default(Value::Integer(1000)),
        )
        .build()
        .unwrap();

    let feature = Schema::builder("Feature")
        .property(
            PropertyDescriptor::scalar("Enabled", ScalarKind::Boolean)
                .with_default(Value::Boolean(false)),
        )
        .build()
        .unwrap();

    let logging = Schema::builder("Logging")
        .property(
            PropertyDescriptor::scalar("Level", ScalarKind::String)
                .with_default(Value::String("info".into())),
        )
        .build()
        .unwrap();

    Schema::builder("App")
        .property(PropertyDescriptor::scalar("Name", ScalarKind::String).nullable())
        .property(
            PropertyDescriptor::scalar("Workers", ScalarKind::Integer)
                .with_default(Value::Integer(4)),
        )
        .property(PropertyDescriptor::nested("Logging", logging))
        .property(PropertyDescriptor::list("Endpoints", endpoint))
        .property(PropertyDescriptor::map("Features", feature))
        .build()
        .unwrap()
}

fn populated_store() -> Rc<MemoryStore> {
    Rc::new(
        MemoryStore::from_json_str(
            r#"{
                "Name": "demo",
                "Workers": 8,
                "Logging": { "Level": "debug" },
                "Endpoints": [
                    { "Url": "https://a.example", "TimeoutMs": 250 },
                    { "Url": "https://b.example" }
                ],
                "Features": {
                    "fast-path": { "Enabled": true },
                    "beta:ui": { "Enabled": false }
                }
            }"#,
        )
        .unwrap(),
    )
}

#[test]
fn bind_reads_a_whole_document_into_typed_values() {
    let store = populated_store();
    let app = ConfigurationObject::bind(&app_schema(), store).unwrap();

    assert_eq!(app.get_str("Name").unwrap(), Some("demo".to_string()));
    assert_eq!(app.get_i64("Workers").unwrap(), Some(8));

    let logging = app.get_object("Logging").unwrap();
    assert_eq!(logging.get_str("Level").unwrap(), Some("debug".to_string()));

    let endpoints = app.get_list("Endpoints").unwrap();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(
        endpoints.get(0).unwrap().get_i64("TimeoutMs").unwrap(),
        Some(250)
    );
    // Second endpoint has no stored timeout; the declared default applies.
    assert_eq!(
        endpoints.get(1).unwrap().get_i64("TimeoutMs").unwrap(),
        Some(1000)
    );

    let features = app.get_map("Features").unwrap();
    assert_eq!(
        features.keys(),
        vec!["beta:ui".to_string(), "fast-path".to_string()]
    );
    assert_eq!(
        features.get("fast-path").unwrap().get_bool("Enabled").unwrap(),
        Some(true)
    );
    assert!(!app.is_dirty());
}

#[test]
fn edits_survive_a_save_and_rebind_round_trip() {
    let store = populated_store();
    {
        let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();
        app.set_i64("Workers", 16).unwrap();
        app.get_object("Logging")
            .unwrap()
            .set_str("Level", "trace")
            .unwrap();

        let endpoints = app.get_list("Endpoints").unwrap();
        endpoints
            .add()
            .unwrap()
            .set_str("Url", "https://c.example")
            .unwrap();

        let features = app.get_map("Features").unwrap();
        features
            .add("canary")
            .unwrap()
            .set_bool("Enabled", true)
            .unwrap();

        assert!(app.is_dirty());
        app.save().unwrap();
        assert!(!app.is_dirty());
    }

    let again = ConfigurationObject::bind(&app_schema(), store).unwrap();
    assert_eq!(again.get_i64("Workers").unwrap(), Some(16));
    assert_eq!(
        again.get_object("Logging").unwrap().get_str("Level").unwrap(),
        Some("trace".to_string())
    );
    let endpoints = again.get_list("Endpoints").unwrap();
    assert_eq!(endpoints.len(), 3);
    assert_eq!(
        endpoints.get(2).unwrap().get_str("Url").unwrap(),
        Some("https://c.example".to_string())
    );
    let features = again.get_map("Features").unwrap();
    assert_eq!(
        features.get("canary").unwrap().get_bool("Enabled").unwrap(),
        Some(true)
    );
}

#[test]
fn collection_removal_compacts_and_round_trips() {
    let store = populated_store();
    {
        let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();
        let endpoints = app.get_list("Endpoints").unwrap();
        endpoints.remove(0).unwrap();
        app.save().unwrap();
    }

    let again = ConfigurationObject::bind(&app_schema(), store).unwrap();
    let endpoints = again.get_list("Endpoints").unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(
        endpoints.get(0).unwrap().get_str("Url").unwrap(),
        Some("https://b.example".to_string())
    );
    assert_eq!(
        endpoints.get(0).unwrap().calculate_path().unwrap().as_str(),
        "Endpoints:0"
    );
    assert!(!endpoints.is_dirty());
}

#[test]
fn dictionary_keys_with_separators_round_trip() {
    let store = populated_store();
    {
        let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();
        let features = app.get_map("Features").unwrap();
        features
            .get("beta:ui")
            .unwrap()
            .set_bool("Enabled", true)
            .unwrap();
        app.save().unwrap();
    }
    // The escaped key is what actually lives in the store.
    assert_eq!(
        store.get(&ConfigPath::new("Features:beta%3Aui:Enabled")),
        Some("true".to_string())
    );

    let again = ConfigurationObject::bind(&app_schema(), store).unwrap();
    let features = again.get_map("Features").unwrap();
    assert_eq!(
        features.get("beta:ui").unwrap().get_bool("Enabled").unwrap(),
        Some(true)
    );
}

#[test]
fn external_change_reloads_clean_instances_only() {
    let store = populated_store();
    let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();

    store.apply([(ConfigPath::new("Workers"), Some("32".to_string()))]);
    assert_eq!(app.get_i64("Workers").unwrap(), Some(32));

    app.set_i64("Workers", 2).unwrap();
    store.apply([(ConfigPath::new("Workers"), Some("64".to_string()))]);
    // Unsaved local changes win over the external value.
    assert_eq!(app.get_i64("Workers").unwrap(), Some(2));
}

#[test]
fn batch_scope_suppresses_intermediate_events_across_the_tree() {
    let store = populated_store();
    let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();

    let root_events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&root_events);
    app.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    let logging = app.get_object("Logging").unwrap();
    let logging_events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&logging_events);
    logging.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    {
        let _scope = app.begin_update();
        app.set_i64("Workers", 16).unwrap();
        logging.set_str("Level", "warn").unwrap();
        assert!(root_events.borrow().is_empty());
        assert!(logging_events.borrow().is_empty());
    }

    let root_events = root_events.borrow();
    assert_eq!(root_events.len(), 1);
    assert!(matches!(root_events[0], ChangeEvent::Batch { .. }));

    let logging_events = logging_events.borrow();
    assert_eq!(logging_events.len(), 1);
    assert!(matches!(logging_events[0], ChangeEvent::Batch { .. }));
}

#[test]
fn bind_at_prefixes_every_path() {
    let store = Rc::new(MemoryStore::with_entries([(
        ConfigPath::new("Apps:Main:Workers"),
        "3".to_string(),
    )]));
    let app = ConfigurationObject::bind_at(
        &app_schema(),
        Rc::clone(&store) as Rc<dyn ConfigurationSource>,
        ConfigPath::new("Apps:Main"),
    )
    .unwrap();

    assert_eq!(app.get_i64("Workers").unwrap(), Some(3));
    app.set_str("Name", "main").unwrap();
    app.save().unwrap();
    assert_eq!(
        store.get(&ConfigPath::new("Apps:Main:Name")),
        Some("main".to_string())
    );
}

#[test]
fn delete_clears_the_subtree_and_disposes_the_whole_tree() {
    let store = populated_store();
    let app = ConfigurationObject::bind(&app_schema(), Rc::clone(&store) as Rc<dyn ConfigurationSource>).unwrap();
    let logging = app.get_object("Logging").unwrap();
    let endpoints = app.get_list("Endpoints").unwrap();

    app.delete().unwrap();

    assert!(store.is_empty());
    assert!(app.is_disposed());
    assert!(logging.is_disposed());
    assert!(endpoints.is_disposed());
    assert!(matches!(app.get("Name"), Err(Error::ObjectDisposed)));
}

/// Store wrapper that rejects writes to one configured path while armed,
/// for probing Save failure behavior.
struct RejectingStore {
    inner: MemoryStore,
    reject: ConfigPath,
    armed: std::cell::Cell<bool>,
}

impl ConfigurationSource for RejectingStore {
    fn get(&self, path: &ConfigPath) -> Option<String> {
        self.inner.get(path)
    }

    fn set(&self, path: &ConfigPath, value: &str) -> conf_store::Result<()> {
        if self.armed.get() && path == &self.reject {
            return Err(conf_store::Error::WriteRejected {
                path: path.as_str().to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.set(path, value)
    }

    fn remove(&self, path: &ConfigPath) -> conf_store::Result<()> {
        self.inner.remove(path)
    }

    fn child_keys(&self, path: &ConfigPath) -> Vec<String> {
        self.inner.child_keys(path)
    }

    fn subscribe(&self, observer: Rc<dyn Fn()>) -> WatchGuard {
        self.inner.subscribe(observer)
    }
}

#[test]
fn save_failure_keeps_earlier_writes_and_remaining_dirt() {
    let schema = Schema::builder("Pair")
        .property(PropertyDescriptor::scalar("Good", ScalarKind::String).nullable())
        .property(PropertyDescriptor::scalar("Bad", ScalarKind::String).nullable())
        .build()
        .unwrap();
    let store = Rc::new(RejectingStore {
        inner: MemoryStore::new(),
        reject: ConfigPath::new("Bad"),
        armed: std::cell::Cell::new(true),
    });

    let source: Rc<dyn ConfigurationSource> = Rc::clone(&store) as Rc<dyn ConfigurationSource>;
    let pair = ConfigurationObject::bind(&schema, source).unwrap();
    pair.set_str("Good", "written").unwrap();
    pair.set_str("Bad", "refused").unwrap();

    let err = pair.save().unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    // Properties saved before the failure stay written; nothing rolls back.
    assert_eq!(
        store.get(&ConfigPath::new("Good")),
        Some("written".to_string())
    );
    // The instance stays dirty so a retry can complete the Save.
    assert!(pair.is_dirty());

    store.armed.set(false);
    pair.save().unwrap();
    assert_eq!(
        store.get(&ConfigPath::new("Bad")),
        Some("refused".to_string())
    );
    assert!(!pair.is_dirty());
}
