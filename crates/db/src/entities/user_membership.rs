//! User membership entity: links a user to one audience option.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_membership")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    pub option_id: String,

    /// Copy of the option's category; `(user_id, category_id)` is unique
    pub category_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::audience_option::Entity",
        from = "Column::OptionId",
        to = "super::audience_option::Column::Id",
        on_delete = "Cascade"
    )]
    AudienceOption,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::audience_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AudienceOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
