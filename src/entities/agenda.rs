use chrono::{DateTime, Local, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agendas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Slot start, unix seconds UTC
    #[sea_orm(unique)]
    pub date: i64,
    pub remarks: Option<String>,
    pub is_available: bool,
    pub owner_id: Option<i32>,
    pub pet_id: Option<i32>,
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
        belongs_to = "super::pet::Entity",
        from = "Column::PetId",
        to = "super::pet::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Pet,
}

impl Related<super::owner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::pet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn date_utc(&self) -> DateTime<Utc> {
        super::utc_from_timestamp(self.date)
    }

    pub fn date_local(&self) -> DateTime<Local> {
        super::local_from_timestamp(self.date)
    }
}
