pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20261001_000001_offer_tables;
mod m20261001_000002_audience_tables;
mod m20261008_000001_funnel_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_offer_tables::Migration),
            Box::new(m20261001_000002_audience_tables::Migration),
            Box::new(m20261008_000001_funnel_indexes::Migration),
        ]
    }
}
