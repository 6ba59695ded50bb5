//! Audience category entity (a targeting axis such as "Berlin Bezirk").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fine-grained city district category.
pub const BERLIN_BEZIRK: &str = "Berlin Bezirk";

/// Coarse-grained federal state category.
pub const BUNDESLAND: &str = "Bundesland";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audience_category")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::audience_option::Entity")]
    AudienceOption,
}

impl Related<super::audience_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AudienceOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
