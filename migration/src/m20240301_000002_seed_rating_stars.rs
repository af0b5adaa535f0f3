use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const STAR_VALUES: [i32; 5] = [1, 2, 3, 4, 5];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert.into_table(RatingStar::Table).columns([RatingStar::Value]);
        for value in STAR_VALUES {
            insert.values_panic([value.into()]);
        }
        manager.exec_stmt(insert).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(RatingStar::Table)
            .and_where(Expr::col(RatingStar::Value).is_in(STAR_VALUES))
            .to_owned();
        manager.exec_stmt(delete).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum RatingStar {
    Table,
    Value,
}
