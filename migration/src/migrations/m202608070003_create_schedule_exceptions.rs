use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202608070003_create_schedule_exceptions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("schedule_exceptions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("course_id"))
                            .big_integer()
                            .not_null(),
                    )
                    // "cancelled" or "makeup"; regular meetings are never stored
                    .col(
                        ColumnDef::new(Alias::new("kind"))
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("date")).date().not_null())
                    // For a makeup: the cancellation it replaces
                    .col(ColumnDef::new(Alias::new("related_id")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("related_date")).date().null())
                    .col(ColumnDef::new(Alias::new("start_time")).time().null())
                    .col(ColumnDef::new(Alias::new("end_time")).time().null())
                    .col(ColumnDef::new(Alias::new("week")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("reason")).text().null())
                    .col(ColumnDef::new(Alias::new("notes")).text().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sched_exc_course")
                            .from(Alias::new("schedule_exceptions"), Alias::new("course_id"))
                            .to(Alias::new("courses"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sched_exc_related")
                            .from(Alias::new("schedule_exceptions"), Alias::new("related_id"))
                            .to(Alias::new("schedule_exceptions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One exception per (course, date); concurrent creators race on this index.
        manager
            .create_index(
                Index::create()
                    .name("uq_sched_exc_course_date")
                    .table(Alias::new("schedule_exceptions"))
                    .col(Alias::new("course_id"))
                    .col(Alias::new("date"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        // At most one makeup per cancellation (NULLs are exempt).
        manager
            .create_index(
                Index::create()
                    .name("uq_sched_exc_related")
                    .table(Alias::new("schedule_exceptions"))
                    .col(Alias::new("related_id"))
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("schedule_exceptions"))
                    .to_owned(),
            )
            .await
    }
}
