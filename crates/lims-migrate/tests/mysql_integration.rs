//! Integration tests against a live MySQL server.
//!
//! Run with:
//!
//! ```text
//! LIMS_MIGRATE_TEST_MYSQL=root:secret@127.0.0.1:3306 cargo test -- --ignored
//! ```
//!
//! The tests create `lims_migrate_it_old` and `lims_migrate_it_new` and use a
//! separate set of tables per test. Tests on the fixed `lims_*` tables hold
//! [`LIMS_TABLES`] while they run.

use lims_migrate::db::list_columns;
use lims_migrate::error::{EXIT_CONSTRAINT_ERROR, EXIT_SCHEMA_MISMATCH};
use lims_migrate::jobs::{enrich_orders, remap_flow_id, reset_tables, MysqlOrderStore};
use lims_migrate::transfer::rows_per_statement;
use lims_migrate::{
    copy_table, Config, CopyOptions, DatabaseConfig, DbConfig, DbPool, MigrationConfig,
    Orchestrator,
};
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Pool};
use tokio::sync::Mutex;

const OLD_DB: &str = "lims_migrate_it_old";
const NEW_DB: &str = "lims_migrate_it_new";

static LIMS_TABLES: Mutex<()> = Mutex::const_new(());

struct Server {
    host: String,
    port: u16,
    username: String,
    password: String,
}

fn server() -> Server {
    let url = std::env::var("LIMS_MIGRATE_TEST_MYSQL")
        .expect("LIMS_MIGRATE_TEST_MYSQL must be set to user:password@host:port");
    let (creds, addr) = url.rsplit_once('@').expect("missing @");
    let (username, password) = creds.split_once(':').unwrap_or((creds, ""));
    let (host, port) = addr.rsplit_once(':').unwrap_or((addr, "3306"));
    Server {
        host: host.to_string(),
        port: port.parse().expect("bad port"),
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn db_config(server: &Server, db: &str) -> DbConfig {
    DbConfig {
        host: server.host.clone(),
        port: server.port,
        db: db.to_string(),
        username: server.username.clone(),
        password: server.password.clone(),
        charset: "utf8mb4".to_string(),
    }
}

/// Create both databases, then run `setup` statements on each side.
async fn prepare(old_setup: &[&str], new_setup: &[&str]) -> (DbPool, DbPool) {
    let server = server();
    let opts: Opts = OptsBuilder::default()
        .ip_or_hostname(server.host.as_str())
        .tcp_port(server.port)
        .user(Some(server.username.as_str()))
        .pass(Some(server.password.as_str()))
        .into();
    let admin = Pool::new(opts);
    let mut conn = admin.get_conn().await.unwrap();
    for db in [OLD_DB, NEW_DB] {
        conn.query_drop(format!("CREATE DATABASE IF NOT EXISTS `{}`", db))
            .await
            .unwrap();
    }
    for sql in old_setup {
        conn.query_drop(format!("USE `{}`", OLD_DB)).await.unwrap();
        conn.query_drop(*sql).await.unwrap();
    }
    for sql in new_setup {
        conn.query_drop(format!("USE `{}`", NEW_DB)).await.unwrap();
        conn.query_drop(*sql).await.unwrap();
    }
    drop(conn);
    admin.disconnect().await.unwrap();

    let old = DbPool::connect(&db_config(&server, OLD_DB), "old")
        .await
        .unwrap();
    let new = DbPool::connect(&db_config(&server, NEW_DB), "new")
        .await
        .unwrap();
    (old, new)
}

async fn count(pool: &DbPool, table: &str) -> u64 {
    let mut conn = pool.conn().await.unwrap();
    let rows: Option<u64> = conn
        .query_first(format!("SELECT COUNT(*) FROM `{}`", table))
        .await
        .unwrap();
    rows.unwrap()
}

#[tokio::test]
#[ignore]
async fn test_copy_preserves_rows_and_nulls() {
    let (old, new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_copy_user",
            "CREATE TABLE it_copy_user (id INT PRIMARY KEY, realname VARCHAR(64), \
             class_name VARCHAR(64) NULL, created DATETIME NULL)",
            "INSERT INTO it_copy_user VALUES (1, '张三', NULL, '2019-03-01 08:00:00'), \
             (2, '', 'A1', NULL), (3, 'li', 'B2', '2020-01-01 00:00:00')",
        ],
        &[
            "DROP TABLE IF EXISTS it_copy_user",
            "CREATE TABLE it_copy_user (id INT, realname VARCHAR(64), \
             class_name VARCHAR(64) NULL, created DATETIME NULL)",
        ],
    )
    .await;

    let report = copy_table(
        &old,
        "it_copy_user",
        &new,
        "it_copy_user",
        &CopyOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.columns, 4);
    assert_eq!(count(&new, "it_copy_user").await, 3);

    let mut conn = new.conn().await.unwrap();
    let nulls: Option<u64> = conn
        .query_first("SELECT COUNT(*) FROM it_copy_user WHERE class_name IS NULL")
        .await
        .unwrap();
    assert_eq!(nulls, Some(1));
    let empty: Option<u64> = conn
        .query_first("SELECT COUNT(*) FROM it_copy_user WHERE realname = ''")
        .await
        .unwrap();
    assert_eq!(empty, Some(1));
    let name: Option<String> = conn
        .query_first("SELECT realname FROM it_copy_user WHERE id = 1")
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("张三"));
    drop(conn);

    // No dedupe: a second copy appends the same rows again
    copy_table(
        &old,
        "it_copy_user",
        &new,
        "it_copy_user",
        &CopyOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(count(&new, "it_copy_user").await, 6);
}

#[tokio::test]
#[ignore]
async fn test_copy_empty_table() {
    let (old, new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_empty",
            "CREATE TABLE it_empty (id INT, name VARCHAR(10))",
        ],
        &[
            "DROP TABLE IF EXISTS it_empty",
            "CREATE TABLE it_empty (id INT, name VARCHAR(10))",
        ],
    )
    .await;

    let report = copy_table(&old, "it_empty", &new, "it_empty", &CopyOptions::default())
        .await
        .unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(count(&new, "it_empty").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_copy_column_count_mismatch() {
    let (old, new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_mismatch",
            "CREATE TABLE it_mismatch (id INT, name VARCHAR(10), code VARCHAR(10))",
            "INSERT INTO it_mismatch VALUES (1, 'a', 'b')",
        ],
        &[
            "DROP TABLE IF EXISTS it_mismatch",
            "CREATE TABLE it_mismatch (id INT, name VARCHAR(10))",
        ],
    )
    .await;

    let err = copy_table(
        &old,
        "it_mismatch",
        &new,
        "it_mismatch",
        &CopyOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_SCHEMA_MISMATCH);
    assert_eq!(count(&new, "it_mismatch").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_copy_failure_rolls_back_whole_table() {
    let (old, new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_dupes",
            "CREATE TABLE it_dupes (id INT)",
            "INSERT INTO it_dupes VALUES (1), (2), (2)",
        ],
        &[
            "DROP TABLE IF EXISTS it_dupes",
            "CREATE TABLE it_dupes (id INT PRIMARY KEY) ENGINE=InnoDB",
        ],
    )
    .await;

    let err = copy_table(&old, "it_dupes", &new, "it_dupes", &CopyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_CONSTRAINT_ERROR);
    assert_eq!(count(&new, "it_dupes").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_list_columns_in_ordinal_order() {
    let (old, _new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_columns",
            "CREATE TABLE it_columns (id INT, zeta INT, alpha INT, `order` INT)",
        ],
        &[],
    )
    .await;

    let columns = list_columns(&old, OLD_DB, "it_columns").await.unwrap();
    assert_eq!(columns, vec!["id", "zeta", "alpha", "order"]);

    let missing = list_columns(&old, OLD_DB, "it_no_such_table").await.unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_remap_and_reset() {
    let _lock = LIMS_TABLES.lock().await;
    let (_old, new) = prepare(
        &[],
        &[
            "DROP TABLE IF EXISTS lims_flow_bind_data",
            "DROP TABLE IF EXISTS lims_order",
            "CREATE TABLE lims_flow_bind_data (id INT, flowid INT)",
            "CREATE TABLE lims_order (id INT, flow_id INT)",
            "INSERT INTO lims_flow_bind_data VALUES (1, 54), (2, 55), (3, 56)",
            "INSERT INTO lims_order VALUES (1, 54), (2, 54), (3, 55), (4, 56)",
        ],
    )
    .await;

    let report = remap_flow_id(&new, 1, &[54, 55]).await.unwrap();
    assert_eq!(report.flow_bind_data_rows, 2);
    assert_eq!(report.order_rows, 3);

    let mut conn = new.conn().await.unwrap();
    let untouched: Option<u64> = conn
        .query_first("SELECT COUNT(*) FROM lims_order WHERE flow_id = 56")
        .await
        .unwrap();
    assert_eq!(untouched, Some(1));
    drop(conn);

    let tables = vec![
        "lims_order".to_string(),
        "lims_flow_bind_data".to_string(),
        "lims_it_does_not_exist".to_string(),
    ];
    let report = reset_tables(&new, &tables).await.unwrap();
    assert_eq!(report.cleared, vec!["lims_order", "lims_flow_bind_data"]);
    assert_eq!(report.rows_deleted, 7);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].table, "lims_it_does_not_exist");
    assert_eq!(count(&new, "lims_order").await, 0);
}

/// `CREATE TABLE` with an id column followed by `width - 1` INT columns
/// defaulting to 7.
fn wide_table(name: &str, width: usize, primary_key: bool) -> String {
    let id = if primary_key { "id INT PRIMARY KEY" } else { "id INT" };
    let rest: Vec<String> = (1..width)
        .map(|i| format!("c{} INT NOT NULL DEFAULT 7", i))
        .collect();
    format!("CREATE TABLE {} ({}, {})", name, id, rest.join(", "))
}

#[tokio::test]
#[ignore]
async fn test_copy_spanning_several_statements() {
    const WIDTH: usize = 500;
    const ROWS: u64 = 400;
    let per_statement = rows_per_statement(WIDTH) as u64;
    assert!(ROWS > 2 * per_statement);

    let old_setup = [
        "DROP TABLE IF EXISTS it_chunks".to_string(),
        "DROP TABLE IF EXISTS it_chunks_dup".to_string(),
        wide_table("it_chunks", WIDTH, false),
        wide_table("it_chunks_dup", WIDTH, false),
        format!(
            "INSERT INTO it_chunks (id) WITH RECURSIVE seq (n) AS \
             (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {}) SELECT n FROM seq",
            ROWS
        ),
        "INSERT INTO it_chunks_dup SELECT * FROM it_chunks".to_string(),
        // Duplicate of the first row, lands in the last statement
        "INSERT INTO it_chunks_dup (id) VALUES (1)".to_string(),
    ];
    let new_setup = [
        "DROP TABLE IF EXISTS it_chunks".to_string(),
        "DROP TABLE IF EXISTS it_chunks_dup".to_string(),
        wide_table("it_chunks", WIDTH, true),
        wide_table("it_chunks_dup", WIDTH, true),
    ];
    let old_setup: Vec<&str> = old_setup.iter().map(String::as_str).collect();
    let new_setup: Vec<&str> = new_setup.iter().map(String::as_str).collect();
    let (old, new) = prepare(&old_setup, &new_setup).await;

    let report = copy_table(&old, "it_chunks", &new, "it_chunks", &CopyOptions::default())
        .await
        .unwrap();
    assert_eq!(report.rows, ROWS);
    assert_eq!(report.columns, WIDTH);
    assert_eq!(count(&new, "it_chunks").await, ROWS);

    let mut conn = new.conn().await.unwrap();
    let sum: Option<u64> = conn
        .query_first(format!("SELECT SUM(c{}) FROM it_chunks", WIDTH - 1))
        .await
        .unwrap();
    assert_eq!(sum, Some(ROWS * 7));
    drop(conn);

    // Earlier statements already ran inside the transaction; all of them roll back
    let err = copy_table(
        &old,
        "it_chunks_dup",
        &new,
        "it_chunks_dup",
        &CopyOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_CONSTRAINT_ERROR);
    assert_eq!(count(&new, "it_chunks_dup").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_migrate_tables_stops_at_failing_table() {
    let (old, new) = prepare(
        &[
            "DROP TABLE IF EXISTS it_batch_first",
            "DROP TABLE IF EXISTS it_batch_second",
            "DROP TABLE IF EXISTS it_batch_third",
            "CREATE TABLE it_batch_first (id INT, name VARCHAR(10))",
            "CREATE TABLE it_batch_second (id INT, name VARCHAR(10), code VARCHAR(10))",
            "CREATE TABLE it_batch_third (id INT, name VARCHAR(10))",
            "INSERT INTO it_batch_first VALUES (1, 'a'), (2, 'b')",
            "INSERT INTO it_batch_second VALUES (1, 'a', 'x')",
            "INSERT INTO it_batch_third VALUES (1, 'a')",
        ],
        &[
            "DROP TABLE IF EXISTS it_batch_first",
            "DROP TABLE IF EXISTS it_batch_second",
            "DROP TABLE IF EXISTS it_batch_third",
            "CREATE TABLE it_batch_first (id INT, name VARCHAR(10))",
            "CREATE TABLE it_batch_second (id INT, name VARCHAR(10))",
            "CREATE TABLE it_batch_third (id INT, name VARCHAR(10))",
        ],
    )
    .await;

    let server = server();
    let config = Config {
        database: DatabaseConfig {
            old: db_config(&server, OLD_DB),
            new: db_config(&server, NEW_DB),
        },
        migration: MigrationConfig {
            table_prefix: "it_batch_".to_string(),
            tables: vec!["first".into(), "second".into(), "third".into()],
            ..MigrationConfig::default()
        },
    };
    let orchestrator = Orchestrator::new(config).await.unwrap();

    let err = orchestrator.migrate_tables().await.unwrap_err();
    assert_eq!(err.exit_code(), EXIT_SCHEMA_MISMATCH);

    assert_eq!(count(&new, "it_batch_first").await, 2);
    assert_eq!(count(&new, "it_batch_second").await, 0);
    assert_eq!(count(&new, "it_batch_third").await, 0);
    // Source untouched
    assert_eq!(count(&old, "it_batch_third").await, 1);

    orchestrator.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_enrich_orders_against_server() {
    let _lock = LIMS_TABLES.lock().await;
    let (_old, new) = prepare(
        &[],
        &[
            "DROP TABLE IF EXISTS lims_order",
            "DROP TABLE IF EXISTS lims_user",
            "DROP TABLE IF EXISTS lims_flow_bind",
            "DROP TABLE IF EXISTS lims_lab",
            "DROP TABLE IF EXISTS lims_equipments",
            "CREATE TABLE lims_order (id INT NULL, userid VARCHAR(16) NULL, borrow_id INT NULL, \
             type VARCHAR(16) NULL, flow_id INT NULL, borrow_realname VARCHAR(64), \
             class_name VARCHAR(64), lab_name VARCHAR(64), lab_code VARCHAR(64), \
             equip_name VARCHAR(64), equip_model VARCHAR(64))",
            "CREATE TABLE lims_user (id INT, realname VARCHAR(64), className VARCHAR(64))",
            "CREATE TABLE lims_flow_bind (id INT, bindid INT, type VARCHAR(16))",
            "CREATE TABLE lims_lab (id INT, name VARCHAR(64), code VARCHAR(64))",
            "CREATE TABLE lims_equipments (id INT, name VARCHAR(64), modelname VARCHAR(64), \
             lab_id INT)",
            "INSERT INTO lims_order VALUES \
             (1, '1', 10, 'lab', 0, '', '', '', '', '', ''), \
             (2, '2', 20, 'equipments', 0, '', '', '', '', '', ''), \
             (3, '99', 30, 'lab', 0, 'stale', 'stale', '', '', '', ''), \
             (4, 'abc', 10, 'lab', 0, 'keep', '', '', '', '', ''), \
             (NULL, '1', 10, 'lab', 0, 'keep', '', '', '', '', '')",
            "INSERT INTO lims_user VALUES (1, 'Li Lei', 'CS-1'), (2, 'Han Meimei', 'EE-2')",
            "INSERT INTO lims_flow_bind VALUES (10, 100, 'lab'), (20, 200, 'equipments'), \
             (30, 100, 'lab')",
            "INSERT INTO lims_lab VALUES (100, 'Optics', 'L-01')",
            "INSERT INTO lims_equipments VALUES (200, 'Spectrometer', 'SP-9', 100)",
        ],
    )
    .await;

    let store = MysqlOrderStore::new(new.clone());
    let report = enrich_orders(&store).await.unwrap();
    assert_eq!(report.orders, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.updated, 3);
    // user 99 does not exist
    assert_eq!(report.lookup_failures, 1);

    type Fields = (String, String, String, String, String, String);
    let mut conn = new.conn().await.unwrap();
    let select = "SELECT borrow_realname, class_name, lab_name, lab_code, equip_name, \
                  equip_model FROM lims_order WHERE id = ?";

    let lab: Option<Fields> = conn.exec_first(select, (1,)).await.unwrap();
    assert_eq!(
        lab.unwrap(),
        (
            "Li Lei".into(),
            "CS-1".into(),
            "Optics".into(),
            "L-01".into(),
            String::new(),
            String::new()
        )
    );

    let equipment: Option<Fields> = conn.exec_first(select, (2,)).await.unwrap();
    assert_eq!(
        equipment.unwrap(),
        (
            "Han Meimei".into(),
            "EE-2".into(),
            "Optics".into(),
            "L-01".into(),
            "Spectrometer".into(),
            "SP-9".into()
        )
    );

    // Missed user lookup overwrites the old values with empty strings
    let missing_user: Option<Fields> = conn.exec_first(select, (3,)).await.unwrap();
    assert_eq!(
        missing_user.unwrap(),
        (
            String::new(),
            String::new(),
            "Optics".into(),
            "L-01".into(),
            String::new(),
            String::new()
        )
    );

    let kept: Option<u64> = conn
        .query_first("SELECT COUNT(*) FROM lims_order WHERE borrow_realname = 'keep'")
        .await
        .unwrap();
    assert_eq!(kept, Some(2));
}
