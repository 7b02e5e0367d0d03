use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608070001_create_users::Migration),
            Box::new(migrations::m202608070002_create_courses::Migration),
            Box::new(migrations::m202608070003_create_schedule_exceptions::Migration),
            Box::new(migrations::m202608070004_create_attendance::Migration),
            Box::new(migrations::m202608070005_create_leave_requests::Migration),
        ]
    }
}
