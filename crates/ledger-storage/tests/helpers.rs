#![allow(dead_code)]

use std::fs;

use ledger_core::Data;
use ledger_storage::SledStore;
use serde_json::json;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, std::path::PathBuf) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, SledStore) {
    let (temp_dir, db_path) = create_temp_dir();
    let store = SledStore::open(&db_path).expect("Failed to open SledStore");
    (temp_dir, store)
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}

pub fn prediction(patient: &str, label: u8, probability: f64) -> Data {
    let mut data = Data::new();
    data.insert("patient_id".into(), json!(patient));
    data.insert("label".into(), json!(label));
    data.insert("probability".into(), json!(probability));
    data
}
