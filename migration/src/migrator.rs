use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608200001_create_users::Migration),
            Box::new(migrations::m202608200002_create_attendance_sessions::Migration),
            Box::new(migrations::m202608200003_create_tracking_points::Migration),
            Box::new(migrations::m202608200004_create_trips::Migration),
            Box::new(migrations::m202608200005_create_visits::Migration),
        ]
    }
}
