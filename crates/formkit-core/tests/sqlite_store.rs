use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use formkit_core::storage::{collections, Batch, RecordFilter, RecordStore, SqliteStore};
use formkit_core::{
    ConditionType, DependencyAction, DependencyRules, FieldRegistry, FieldType, FormEngine,
    FormError, ModuleCatalog, NewFieldDefinition, NewFieldDependency, NewFormTemplate,
    TemplateLibrary, TemplateSelection,
};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_create_then_open_round_trip() {
    let dir = TempDir::new().expect("tempdir should be created");
    let path = dir.path().join("nested").join("formkit.db");

    {
        let store = SqliteStore::create(&path).expect("create should succeed");
        store
            .write("things", "a", &json!({"n": 1}))
            .expect("write should succeed");
    }
    assert!(path.exists());

    let store = SqliteStore::open(&path).expect("open should succeed");
    assert_eq!(
        store.read("things", "a").expect("read should succeed"),
        Some(json!({"n": 1}))
    );
    store.check_integrity().expect("store should be intact");
    assert_eq!(store.metadata().expect("metadata").format_version, "0.1");
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = TempDir::new().expect("tempdir should be created");
    let path = dir.path().join("formkit.db");
    SqliteStore::create(&path).expect("create should succeed");

    assert!(SqliteStore::create(&path).is_err());
}

#[test]
fn test_open_missing_file_fails() {
    let dir = TempDir::new().expect("tempdir should be created");
    let result = SqliteStore::open(&dir.path().join("missing.db"));
    assert!(matches!(result, Err(FormError::NotFound(_))));
}

#[test]
fn test_open_foreign_sqlite_file_fails() {
    let dir = TempDir::new().expect("tempdir should be created");
    let path = dir.path().join("other.db");
    let conn = rusqlite::Connection::open(&path).expect("sqlite should open");
    conn.execute_batch("CREATE TABLE notes (body TEXT);")
        .expect("table should be created");
    drop(conn);

    assert!(matches!(SqliteStore::open(&path), Err(FormError::Storage(_))));
}

#[test]
fn test_failed_batch_leaves_no_trace() {
    let dir = TempDir::new().expect("tempdir should be created");
    let path = dir.path().join("formkit.db");
    {
        let store = SqliteStore::create(&path).expect("create should succeed");
        store
            .write("things", "keep", &json!({"n": 1}))
            .expect("write should succeed");
    }
    {
        let conn = rusqlite::Connection::open(&path).expect("sqlite should open");
        conn.execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON records
             WHEN NEW.key = 'poison'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .expect("trigger should be created");
    }

    let store = SqliteStore::open(&path).expect("open should succeed");
    let mut batch = Batch::new();
    batch.put("things", "new", json!({"n": 2}));
    batch.delete("things", "keep");
    batch.put("things", "poison", json!({"n": 3}));

    assert!(store.apply(&batch).is_err());
    let keys: Vec<String> = store
        .query("things", &RecordFilter::new())
        .expect("query should succeed")
        .into_iter()
        .map(|record| record.key)
        .collect();
    assert_eq!(keys, vec!["keep"]);
}

#[test]
fn test_engine_state_survives_reopen() {
    let dir = TempDir::new().expect("tempdir should be created");
    let path = dir.path().join("formkit.db");

    let template_id = {
        let engine = FormEngine::new(
            SqliteStore::create(&path).expect("create should succeed"),
            ModuleCatalog::retail(),
        );
        engine
            .registry()
            .create(NewFieldDefinition::new("warranty", "products", "Warranty", FieldType::Number))
            .expect("field should be created");
        let template = engine
            .templates()
            .create(NewFormTemplate::new("Electronics", "products").custom_fields(&["warranty"]))
            .expect("template should be created");

        let mut values = BTreeMap::new();
        values.insert("warranty".to_string(), json!(12));
        engine
            .values()
            .set_values("products", "tv-1", &values)
            .expect("values should be stored");
        template.id
    };

    let engine = FormEngine::new(
        SqliteStore::open(&path).expect("open should succeed"),
        ModuleCatalog::retail(),
    );
    let fields = engine
        .composer()
        .resolve_fields("products", TemplateSelection::Template(template_id), None)
        .expect("fields should resolve");
    assert_eq!(fields.last().map(|f| f.key.as_str()), Some("warranty"));
    assert_eq!(
        engine
            .values()
            .get_value("products", "tv-1", "warranty")
            .expect("read should succeed"),
        Some(json!(12))
    );
    assert_eq!(
        engine
            .store()
            .query(collections::CUSTOM_FIELD_VALUES, &RecordFilter::new())
            .expect("query should succeed")
            .len(),
        1
    );
}

#[test]
fn test_shared_store_keeps_concurrent_writes() {
    let dir = TempDir::new().expect("tempdir should be created");
    let store = Arc::new(
        SqliteStore::create(&dir.path().join("formkit.db")).expect("create should succeed"),
    );
    let size = FieldRegistry::new(&*store)
        .create(NewFieldDefinition::new("size", "products", "Size", FieldType::Text))
        .expect("field should be created")
        .id;

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let rules = DependencyRules::new(&*store);
                for i in 0..20 {
                    rules
                        .add(NewFieldDependency::new(
                            size,
                            "category",
                            ConditionType::Equals,
                            json!(format!("{}-{}", worker, i)),
                            DependencyAction::Show,
                        ))
                        .expect("rule should be added");
                }
                TemplateLibrary::new(&*store)
                    .create(
                        NewFormTemplate::new(format!("Worker {}", worker), "products")
                            .owned_by(42)
                            .as_default(),
                    )
                    .expect("template should be created");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker should finish");
    }

    let ids: Vec<u64> = DependencyRules::new(&*store)
        .list()
        .expect("rules should list")
        .iter()
        .map(|rule| rule.id)
        .collect();
    assert_eq!(ids, (1..=80).collect::<Vec<u64>>());

    let templates = TemplateLibrary::new(&*store)
        .list("products", Some(42))
        .expect("templates should list");
    assert_eq!(templates.len(), 4);
    assert_eq!(templates.iter().filter(|t| t.is_default).count(), 1);
}
