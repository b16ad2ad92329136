//! End-to-end runs against a real PostgreSQL server
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use stratum_migrator::{EmbeddedScripts, FnMigration, MigrationError, Migrator};
use stratum_testing::{test_table_name, TestDatabase, TestDirectory};

async fn setup(label: &str) -> (TestDatabase, TestDirectory, String) {
    let db = TestDatabase::new().await.unwrap();
    let dir = TestDirectory::new().unwrap();
    (db, dir, test_table_name(label))
}

fn migrator(db: &TestDatabase, dir: &TestDirectory, table: &str) -> Migrator {
    Migrator::new(Arc::new(db.pool().clone()))
        .table(table)
        .directory(dir.path())
}

#[tokio::test]
#[ignore] // Requires a PostgreSQL server at TEST_DATABASE_URL
async fn test_creates_bookkeeping_and_user_tables() {
    let (db, dir, table) = setup("create").await;
    let user_table = test_table_name("foo");
    let path = dir
        .add_file(
            "001.sql",
            &format!("create table {} (id integer primary key);", user_table),
        )
        .unwrap();

    let migrator = migrator(&db, &dir, &table);
    assert_eq!(migrator.apply().await.unwrap(), vec![path.clone()]);

    assert!(db.has_table(&table).await.unwrap());
    assert!(db.has_table(&user_table).await.unwrap());
    assert_eq!(migrator.migrated().await.unwrap(), vec![path]);

    let records = migrator.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "001.sql");

    db.drop_table(&user_table).await.unwrap();
    db.drop_table(&table).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a PostgreSQL server at TEST_DATABASE_URL
async fn test_failing_migration_is_rolled_back() {
    let (db, dir, table) = setup("halt").await;
    let kept = test_table_name("kept");
    let discarded = test_table_name("discarded");
    let never = test_table_name("never");

    let first = dir
        .add_file("001.sql", &format!("create table {} (id integer);", kept))
        .unwrap();
    dir.add_file(
        "002.sql",
        &format!("create table {} (id integer);\nselect 1/0;", discarded),
    )
    .unwrap();
    dir.add_file("003.sql", &format!("create table {} (id integer);", never))
        .unwrap();

    let migrator = migrator(&db, &dir, &table);
    let err = migrator.apply().await.unwrap_err();

    assert!(err.to_string().contains("division by zero"));
    assert_eq!(err.sqlstate().as_deref(), Some("22012"));
    assert_eq!(migrator.all().await.unwrap(), vec![first]);
    assert!(db.has_table(&kept).await.unwrap());
    assert!(!db.has_table(&discarded).await.unwrap());
    assert!(!db.has_table(&never).await.unwrap());

    db.drop_table(&kept).await.unwrap();
    db.drop_table(&table).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a PostgreSQL server at TEST_DATABASE_URL
async fn test_script_migration_runs_in_transaction() {
    let (db, dir, table) = setup("script").await;
    let path = dir.add_file("001.mjs", "").unwrap();

    let scripts = EmbeddedScripts::new().register(
        "001.mjs",
        FnMigration::new(|tx| {
            Box::pin(async move {
                let rows = tx.fetch_all("select 1 as one", &[]).await?;
                if rows.len() == 1 {
                    Ok(())
                } else {
                    Err(MigrationError::Query("expected one row".into()))
                }
            })
        }),
    );

    let migrator = migrator(&db, &dir, &table).script_loader(Arc::new(scripts));
    assert_eq!(migrator.apply().await.unwrap(), vec![path]);
    assert!(migrator.has("001.mjs").await.unwrap());

    db.drop_table(&table).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a PostgreSQL server at TEST_DATABASE_URL
async fn test_second_run_is_a_no_op() {
    let (db, dir, table) = setup("idempotent").await;
    dir.add_file("001.sql", "select 1;").unwrap();

    let migrator = migrator(&db, &dir, &table);
    assert!(!migrator.has("001.sql").await.unwrap());
    assert_eq!(migrator.apply().await.unwrap().len(), 1);
    assert!(migrator.apply().await.unwrap().is_empty());
    assert_eq!(migrator.records().await.unwrap().len(), 1);

    db.drop_table(&table).await.unwrap();
}
