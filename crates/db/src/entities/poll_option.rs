//! Poll option entity (one answer of a poll, with its running counter).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on options per poll.
pub const MAX_OPTIONS_PER_POLL: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll_option")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub poll_id: String,

    pub text: String,

    /// Number of vote rows pointing at this option
    #[sea_orm(default_value = 0)]
    pub votes: i32,

    /// 0-based, unique within the poll
    pub display_order: i32,
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
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
