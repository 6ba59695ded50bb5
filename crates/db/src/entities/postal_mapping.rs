//! Postal mapping entity: district-level postal code table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "postal_mapping")]
pub struct Model {
    /// Digits-only postal code
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Option in the "Berlin Bezirk" category
    pub option_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::audience_option::Entity",
        from = "Column::OptionId",
        to = "super::audience_option::Column::Id",
        on_delete = "Cascade"
    )]
    AudienceOption,
}

impl Related<super::audience_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AudienceOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
