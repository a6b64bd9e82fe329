use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Users (login identities for staff and customers)
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(string(Users::PasswordHash))
                    .col(string_len(Users::FirstName, 50))
                    .col(string_len(Users::LastName, 50))
                    .col(string_null(Users::Document))
                    .col(string_null(Users::Address))
                    .col(string_null(Users::PhoneNumber))
                    .col(string(Users::Email))
                    .col(string(Users::Role))
                    .col(big_integer(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Owners::Table)
                    .if_not_exists()
                    .col(pk_auto(Owners::Id))
                    .col(
                        ColumnDef::new(Owners::UserId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_owners_user")
                            .from(Owners::Table, Owners::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PetTypes::Table)
                    .if_not_exists()
                    .col(pk_auto(PetTypes::Id))
                    .col(
                        ColumnDef::new(PetTypes::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceTypes::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceTypes::Id))
                    .col(
                        ColumnDef::new(ServiceTypes::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pets::Table)
                    .if_not_exists()
                    .col(pk_auto(Pets::Id))
                    .col(string_len(Pets::Name, 50))
                    .col(string_len(Pets::Race, 50))
                    .col(date(Pets::Born))
                    .col(string_null(Pets::Remarks))
                    .col(string_null(Pets::ImageUrl))
                    .col(integer(Pets::OwnerId))
                    .col(integer(Pets::PetTypeId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pets_owner")
                            .from(Pets::Table, Pets::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pets_pet_type")
                            .from(Pets::Table, Pets::PetTypeId)
                            .to(PetTypes::Table, PetTypes::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Histories::Table)
                    .if_not_exists()
                    .col(pk_auto(Histories::Id))
                    .col(string_len(Histories::Description, 100))
                    .col(big_integer(Histories::Date))
                    .col(string_null(Histories::Remarks))
                    .col(integer(Histories::PetId))
                    .col(integer(Histories::ServiceTypeId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_histories_pet")
                            .from(Histories::Table, Histories::PetId)
                            .to(Pets::Table, Pets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_histories_service_type")
                            .from(Histories::Table, Histories::ServiceTypeId)
                            .to(ServiceTypes::Table, ServiceTypes::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Agendas::Table)
                    .if_not_exists()
                    .col(pk_auto(Agendas::Id))
                    .col(
                        ColumnDef::new(Agendas::Date)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_null(Agendas::Remarks))
                    .col(
                        ColumnDef::new(Agendas::IsAvailable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(integer_null(Agendas::OwnerId))
                    .col(integer_null(Agendas::PetId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agendas_owner")
                            .from(Agendas::Table, Agendas::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agendas_pet")
                            .from(Agendas::Table, Agendas::PetId)
                            .to(Pets::Table, Pets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookups by owner / pet
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pets_owner")
                    .table(Pets::Table)
                    .col(Pets::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_histories_pet")
                    .table(Histories::Table)
                    .col(Histories::PetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Agendas::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Histories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PetTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Owners::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    PasswordHash,
    FirstName,
    LastName,
    Document,
    Address,
    PhoneNumber,
    Email,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Owners {
    Table,
    Id,
    UserId,
}

#[derive(DeriveIden)]
enum PetTypes {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum ServiceTypes {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Pets {
    Table,
    Id,
    Name,
    Race,
    Born,
    Remarks,
    ImageUrl,
    OwnerId,
    PetTypeId,
}

#[derive(DeriveIden)]
enum Histories {
    Table,
    Id,
    Description,
    Date,
    Remarks,
    PetId,
    ServiceTypeId,
}

#[derive(DeriveIden)]
enum Agendas {
    Table,
    Id,
    Date,
    Remarks,
    IsAvailable,
    OwnerId,
    PetId,
}
