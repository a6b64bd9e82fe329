use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub race: String,
    pub born: Date,
    pub remarks: Option<String>,
    /// Path relative to the public base URL, e.g. `/images/pets/abc.jpg`
    pub image_url: Option<String>,
    pub owner_id: i32,
    pub pet_type_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::owner::Entity",
        from = "Column::OwnerId",
        to = "super::owner::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::pet_type::Entity",
        from = "Column::PetTypeId",
        to = "super::pet_type::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    PetType,
    #[sea_orm(has_many = "super::history::Entity")]
    History,
    #[sea_orm(has_many = "super::agenda::Entity")]
    Agenda,
}

impl Related<super::owner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::pet_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PetType.def()
    }
}

impl Related<super::history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::agenda::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agenda.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
