//! Database migrations for the documentation site backend.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2024_01_01_000001_create_principals;
mod m2024_01_01_000002_create_discord_connections;
mod m2024_01_01_000003_create_oauth_states;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2024_01_01_000001_create_principals::Migration),
            Box::new(m2024_01_01_000002_create_discord_connections::Migration),
            Box::new(m2024_01_01_000003_create_oauth_states::Migration),
        ]
    }
}
