#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures: a `folders` / `documents` schema where every row has an
//! owner, and policies that scope rows and the `secret` column to it.

use std::cell::Cell;

use rowguard_db::secure::{AuthPolicy, AuthSession, FieldSet, Guarded, Principal};
use rowguard_db::{DbConfig, connect_db};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, QueryFilter, Set};
use sea_orm_migration::prelude as mig;

pub mod folder {
    use sea_orm::entity::prelude::*;

    use rowguard_db::secure::GuardedFields;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, GuardedFields)]
    #[sea_orm(table_name = "folders")]
    #[guarded(trait_name = "FolderFields")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub owner: String,
        #[guarded(skip)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::document::Entity")]
        Documents,
    }

    impl Related<super::document::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Documents.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod document {
    use sea_orm::entity::prelude::*;

    use rowguard_db::secure::GuardedFields;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, GuardedFields)]
    #[sea_orm(table_name = "documents")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub owner: String,
        pub folder_id: i32,
        pub title: String,
        pub secret: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::folder::Entity",
            from = "Column::FolderId",
            to = "super::folder::Column::Id"
        )]
        Folder,
    }

    impl Related<super::folder::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Folder.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

thread_local! {
    static DOCUMENT_FILTERS: Cell<usize> = const { Cell::new(0) };
    static FOLDER_FILTERS: Cell<usize> = const { Cell::new(0) };
    static DOCUMENT_READ_EVALS: Cell<usize> = const { Cell::new(0) };
}

pub fn document_filter_calls() -> usize {
    DOCUMENT_FILTERS.with(Cell::get)
}

pub fn folder_filter_calls() -> usize {
    FOLDER_FILTERS.with(Cell::get)
}

pub fn document_read_evals() -> usize {
    DOCUMENT_READ_EVALS.with(Cell::get)
}

pub fn reset_counters() {
    DOCUMENT_FILTERS.with(|c| c.set(0));
    FOLDER_FILTERS.with(|c| c.set(0));
    DOCUMENT_READ_EVALS.with(|c| c.set(0));
}

impl AuthPolicy<String> for document::Entity {
    fn add_filters<Q: QueryFilter>(query: Q, identity: &String) -> Q {
        DOCUMENT_FILTERS.with(|c| c.set(c.get() + 1));
        query.filter(document::Column::Owner.eq(identity.clone()))
    }

    fn blocked_read_fields(
        object: &Guarded<document::Model, String>,
        identity: &String,
    ) -> FieldSet {
        use document::GuardedFields;

        DOCUMENT_READ_EVALS.with(|c| c.set(c.get() + 1));
        // The generated accessor goes through the guard; during evaluation it
        // is not re-checked.
        let owner = object.owner().expect("owner readable while evaluating");
        if owner == *identity {
            FieldSet::empty()
        } else {
            FieldSet::empty().with(document::Column::Secret)
        }
    }

    fn blocked_write_fields(
        _object: &Guarded<document::Model, String>,
        _identity: &String,
    ) -> FieldSet {
        FieldSet::empty().with(document::Column::Owner)
    }
}

impl AuthPolicy<String> for folder::Entity {
    fn add_filters<Q: QueryFilter>(query: Q, identity: &String) -> Q {
        FOLDER_FILTERS.with(|c| c.set(c.get() + 1));
        query.filter(folder::Column::Owner.eq(identity.clone()))
    }
}

pub fn alice() -> Principal<String> {
    Principal::Identity("alice".to_owned())
}

pub fn bob() -> Principal<String> {
    Principal::Identity("bob".to_owned())
}

struct CreateDocumentTables;

impl mig::MigrationName for CreateDocumentTables {
    fn name(&self) -> &'static str {
        "m001_create_document_tables"
    }
}

#[async_trait::async_trait]
impl mig::MigrationTrait for CreateDocumentTables {
    async fn up(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .create_table(
                mig::Table::create()
                    .table(mig::Alias::new("folders"))
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("id"))
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("owner"))
                            .string()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("name"))
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(mig::Alias::new("documents"))
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("id"))
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("owner"))
                            .string()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("folder_id"))
                            .integer()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("title"))
                            .string()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(mig::Alias::new("secret"))
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .drop_table(
                mig::Table::drop()
                    .table(mig::Alias::new("documents"))
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                mig::Table::drop()
                    .table(mig::Alias::new("folders"))
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

fn memory_config(name: &str) -> DbConfig {
    DbConfig::new(format!("sqlite:file:memdb_{name}?mode=memory&cache=shared"))
}

/// A connection to a fresh database with no tables at all.
pub async fn empty_db(name: &str) -> DatabaseConnection {
    connect_db(&memory_config(name)).await.expect("connect")
}

/// A migrated and seeded database:
///
/// | folder | owner |
/// |--------|-------|
/// | 1 | alice |
/// | 2 | bob |
///
/// | document | owner | folder |
/// |----------|-------|--------|
/// | 1, 2 | alice | 1 |
/// | 3 | bob | 2 |
/// | 4 | bob | 1 |
pub async fn seeded_db(name: &str) -> DatabaseConnection {
    let conn = empty_db(name).await;
    let manager = mig::SchemaManager::new(&conn);
    mig::MigrationTrait::up(&CreateDocumentTables, &manager)
        .await
        .expect("migrate");

    for (id, owner) in [(1, "alice"), (2, "bob")] {
        folder::ActiveModel {
            id: Set(id),
            owner: Set(owner.to_owned()),
            name: Set(format!("{owner}-folder")),
        }
        .insert(&conn)
        .await
        .expect("insert folder");
    }

    for (id, owner, folder_id) in [(1, "alice", 1), (2, "alice", 1), (3, "bob", 2), (4, "bob", 1)] {
        document::ActiveModel {
            id: Set(id),
            owner: Set(owner.to_owned()),
            folder_id: Set(folder_id),
            title: Set(format!("{owner}-doc-{id}")),
            secret: Set(format!("{owner}-secret-{id}")),
        }
        .insert(&conn)
        .await
        .expect("insert document");
    }

    conn
}

/// A session over a seeded database.
pub async fn session(name: &str, principal: Principal<String>) -> AuthSession<String> {
    AuthSession::new(seeded_db(name).await, principal)
}
