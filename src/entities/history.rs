use chrono::{DateTime, Local, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "histories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub description: String,
    /// Visit instant, unix seconds UTC
    pub date: i64,
    pub remarks: Option<String>,
    pub pet_id: i32,
    pub service_type_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pet::Entity",
        from = "Column::PetId",
        to = "super::pet::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Pet,
    #[sea_orm(
        belongs_to = "super::service_type::Entity",
        from = "Column::ServiceTypeId",
        to = "super::service_type::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    ServiceType,
}

impl Related<super::pet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pet.def()
    }
}

impl Related<super::service_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceType.def()
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
