mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use loam_orm::{
    ColumnType, Database, DatabaseId, MemoryDriver, Migration, MigrationError, MigrationLog,
    Migrations, Migrator, ModelCrud, OrmError, OrmResult, Schema,
};

struct CreateGalaxies;

#[async_trait]
impl Migration for CreateGalaxies {
    fn name(&self) -> &str {
        "create_galaxies"
    }

    async fn prepare(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(
            &Schema::create("galaxies")
                .id()
                .column("name", ColumnType::Text)
                .build(),
        )
        .await
    }

    async fn revert(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(&Schema::drop("galaxies")).await
    }
}

struct CreateStars;

#[async_trait]
impl Migration for CreateStars {
    fn name(&self) -> &str {
        "create_stars"
    }

    async fn prepare(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(
            &Schema::create("stars")
                .id()
                .column("name", ColumnType::Text)
                .column("galaxy_id", ColumnType::Int)
                .soft_deletes()
                .build(),
        )
        .await
    }

    async fn revert(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(&Schema::drop("stars")).await
    }
}

struct AddStarMagnitude;

#[async_trait]
impl Migration for AddStarMagnitude {
    fn name(&self) -> &str {
        "add_star_magnitude"
    }

    async fn prepare(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(
            &Schema::alter("stars")
                .add_column("magnitude", ColumnType::Float)
                .build(),
        )
        .await
    }

    async fn revert(&self, db: &Database) -> OrmResult<()> {
        db.execute_schema(&Schema::alter("stars").drop_column("magnitude").build())
            .await
    }
}

struct Broken;

#[async_trait]
impl Migration for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn prepare(&self, _db: &Database) -> OrmResult<()> {
        Err(OrmError::Database("deliberate failure".into()))
    }

    async fn revert(&self, _db: &Database) -> OrmResult<()> {
        Ok(())
    }
}

fn fresh_db() -> (Database, MemoryDriver) {
    let driver = MemoryDriver::new();
    (Database::new(Arc::new(driver.clone())), driver)
}

async fn applied_batches(db: &Database) -> Vec<i64> {
    MigrationLog::query(db)
        .order_by_asc("id")
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|log| log.batch)
        .collect()
}

#[tokio::test]
async fn setup_is_idempotent() {
    let (db, _) = fresh_db();
    let migrator = Migrator::single(db, Migrations::new());
    migrator.setup_if_needed().await.unwrap();
    migrator.setup_if_needed().await.unwrap();
}

#[tokio::test]
async fn batches_grow_monotonically() {
    let (db, _) = fresh_db();

    let mut first = Migrations::new();
    first.add(CreateGalaxies);
    first.add(CreateStars);
    let migrator = Migrator::single(db.clone(), first);
    migrator.setup_if_needed().await.unwrap();
    migrator.prepare_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 1]);

    // Re-running with nothing pending leaves the log alone
    migrator.prepare_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 1]);

    let mut second = Migrations::new();
    second.add(CreateGalaxies);
    second.add(CreateStars);
    second.add(AddStarMagnitude);
    let migrator = Migrator::single(db.clone(), second);
    migrator.prepare_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 1, 2]);
}

#[tokio::test]
async fn revert_walks_batches_newest_first() {
    let (db, driver) = fresh_db();

    let mut migrations = Migrations::new();
    migrations.add(CreateGalaxies);
    migrations.add(CreateStars);
    let migrator = Migrator::single(db.clone(), migrations);
    migrator.setup_if_needed().await.unwrap();
    migrator.prepare_batch().await.unwrap();

    let mut with_alter = Migrations::new();
    with_alter.add(CreateGalaxies);
    with_alter.add(CreateStars);
    with_alter.add(AddStarMagnitude);
    let migrator = Migrator::single(db.clone(), with_alter);
    migrator.prepare_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 1, 2]);

    migrator.revert_last_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 1]);

    migrator.revert_all_batches().await.unwrap();
    assert_eq!(applied_batches(&db).await, Vec::<i64>::new());
    assert!(driver.rows("galaxies").is_empty());

    // A further revert with an empty log is a no-op
    migrator.revert_last_batch().await.unwrap();
}

#[tokio::test]
async fn failure_mid_batch_keeps_earlier_work() {
    let (db, _) = fresh_db();

    let mut migrations = Migrations::new();
    migrations.add(CreateGalaxies);
    migrations.add(Broken);
    migrations.add(CreateStars);
    let migrator = Migrator::single(db.clone(), migrations);
    migrator.setup_if_needed().await.unwrap();

    let err = migrator.prepare_batch().await.unwrap_err();
    match err {
        OrmError::Migration(MigrationError::Failed { name, phase, .. }) => {
            assert_eq!(name, "broken");
            assert_eq!(phase, "prepare");
        }
        other => panic!("expected migration failure, got {other:?}"),
    }

    // The first migration of the batch stuck, the rest never ran
    assert_eq!(applied_batches(&db).await, vec![1]);
    let names: Vec<String> = MigrationLog::query(&db)
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|log| log.name)
        .collect();
    assert_eq!(names, vec!["create_galaxies"]);

    // Once the broken migration is fixed (here: dropped), a follow-up run
    // picks up the pending work in a fresh batch
    let mut fixed = Migrations::new();
    fixed.add(CreateGalaxies);
    fixed.add(CreateStars);
    let migrator = Migrator::single(db.clone(), fixed);
    migrator.prepare_batch().await.unwrap();
    assert_eq!(applied_batches(&db).await, vec![1, 2]);
}

#[tokio::test]
async fn reverting_an_unregistered_migration_is_an_error() {
    let (db, _) = fresh_db();

    let mut migrations = Migrations::new();
    migrations.add(CreateGalaxies);
    let migrator = Migrator::single(db.clone(), migrations);
    migrator.setup_if_needed().await.unwrap();
    migrator.prepare_batch().await.unwrap();

    let migrator = Migrator::single(db.clone(), Migrations::new());
    let err = migrator.revert_last_batch().await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Migration(MigrationError::NotRegistered { name }) if name == "create_galaxies"
    ));
}

#[tokio::test]
async fn logical_databases_keep_independent_batch_counters() {
    let (primary, _) = fresh_db();
    let (analytics, analytics_driver) = fresh_db();
    let analytics_id = DatabaseId::named("analytics");

    let mut migrations = Migrations::new();
    migrations.add(CreateGalaxies);
    migrations.add_to(CreateStars, analytics_id.clone());

    let mut migrator = Migrator::new(migrations);
    migrator.add_database(DatabaseId::default_database(), primary.clone());
    migrator.add_database(analytics_id, analytics.clone());
    migrator.setup_if_needed().await.unwrap();
    migrator.prepare_batch().await.unwrap();

    assert_eq!(applied_batches(&primary).await, vec![1]);
    assert_eq!(applied_batches(&analytics).await, vec![1]);
    assert!(analytics_driver.rows("galaxies").is_empty());
    let names: Vec<String> = MigrationLog::query(&analytics)
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|log| log.name)
        .collect();
    assert_eq!(names, vec!["create_stars"]);
}
