pub use sea_orm_migration::prelude::*;

mod m20260101_000000_create_ocp_enabled_tag_keys;
mod m20260101_000001_create_ocp_cost_category;
mod m20260101_000002_create_ocp_usage_line_item_daily_summary;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000000_create_ocp_enabled_tag_keys::Migration),
            Box::new(m20260101_000001_create_ocp_cost_category::Migration),
            Box::new(m20260101_000002_create_ocp_usage_line_item_daily_summary::Migration),
        ]
    }
}
