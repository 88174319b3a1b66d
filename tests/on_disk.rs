//! Dispatcher over a file-backed database built from a config file.

use std::io::Write;

use mdb::config;
use mdb::dispatch::Dispatcher;
use mdb::lineage::LineageTracker;
use mdb_common::OperationType;
use mdb_db::pool::get_conn;
use serde_json::json;
use tempfile::tempdir;

fn sha(n: u32) -> String {
    format!("{:040x}", n)
}

#[test]
fn test_operations_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("archive.sqlite");
    let config_path = dir.path().join("mdb.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        "[database]\npath = \"{}\"\npool_size = 2\n\n[events]\nsink = \"broadcast\"\n",
        db_path.display()
    )
    .unwrap();

    let cfg = config::load_config(&config_path).unwrap();
    {
        let dispatcher = Dispatcher::from_config(&cfg).unwrap();
        dispatcher
            .process_raw("capture_stop", json!({"file_name": "c.mp4", "sha1": sha(1)}))
            .unwrap();
        dispatcher
            .process(
                OperationType::Demux,
                json!({
                    "sha1": sha(1),
                    "original": {"file_name": "o.mp4", "sha1": sha(2)},
                    "proxy": {"file_name": "p.mp4", "sha1": sha(3)}
                }),
            )
            .unwrap();
    }
    assert!(db_path.exists());

    let dispatcher = Dispatcher::from_config(&cfg).unwrap();
    let conn = get_conn(dispatcher.pool()).unwrap();
    let lineage = LineageTracker::new(&conn, dispatcher.registry());
    let proxy = lineage.find_by_sha1(&sha(3)).unwrap();
    let ancestors = lineage.ancestors(proxy.id).unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].sha1.as_deref(), Some(sha(1).as_str()));
}
