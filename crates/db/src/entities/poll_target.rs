//! Poll target entity: restricts a poll to an audience option.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll_target")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub poll_id: String,

    #[sea_orm(indexed)]
    pub option_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,

    #[sea_orm(
        belongs_to = "super::audience_option::Entity",
        from = "Column::OptionId",
        to = "super::audience_option::Column::Id",
        on_delete = "Cascade"
    )]
    AudienceOption,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::audience_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AudienceOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
