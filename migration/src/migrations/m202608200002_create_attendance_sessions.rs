use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202608200002_create_attendance_sessions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_sessions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("user_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_in_time"))
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_in_lat"))
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_in_lng"))
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_in_battery"))
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_in_address"))
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_out_time"))
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("punch_out_lat")).double().null())
                    .col(ColumnDef::new(Alias::new("punch_out_lng")).double().null())
                    .col(
                        ColumnDef::new(Alias::new("punch_out_battery"))
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("punch_out_address"))
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("total_distance_m"))
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("total_duration_min"))
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("is_active"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_user")
                            .from(Alias::new("attendance_sessions"), Alias::new("user_id"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_att_sess_user_punch_in")
                    .table(Alias::new("attendance_sessions"))
                    .col(Alias::new("user_id"))
                    .col(Alias::new("punch_in_time"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_sessions"))
                    .to_owned(),
            )
            .await
    }
}
