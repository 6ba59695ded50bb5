//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    #[sea_orm(default_value = true)]
    pub is_visible: bool,

    /// Legacy inline choice slots, superseded by `poll_option` rows
    #[sea_orm(nullable)]
    pub option_one: Option<String>,
    #[sea_orm(nullable)]
    pub option_two: Option<String>,
    #[sea_orm(nullable)]
    pub option_three: Option<String>,

    /// Legacy inline counters
    #[sea_orm(default_value = 0)]
    pub option_one_count: i32,
    #[sea_orm(default_value = 0)]
    pub option_two_count: i32,
    #[sea_orm(default_value = 0)]
    pub option_three_count: i32,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Non-empty legacy slots in order, with their counters.
    #[must_use]
    pub fn legacy_choices(&self) -> Vec<(String, i32)> {
        [
            (&self.option_one, self.option_one_count),
            (&self.option_two, self.option_two_count),
            (&self.option_three, self.option_three_count),
        ]
        .into_iter()
        .filter_map(|(text, count)| match text {
            Some(text) if !text.trim().is_empty() => Some((text.clone(), count)),
            _ => None,
        })
        .collect()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,

    #[sea_orm(has_many = "super::poll_target::Entity")]
    PollTarget,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::poll_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollTarget.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_legacy_choices_skip_empty_slots() {
        let poll = Model {
            id: "p1".to_string(),
            question: "Q?".to_string(),
            is_visible: true,
            option_one: Some("A".to_string()),
            option_two: Some(String::new()),
            option_three: Some("C".to_string()),
            option_one_count: 2,
            option_two_count: 3,
            option_three_count: 4,
            created_at: Utc::now().into(),
        };

        assert_eq!(
            poll.legacy_choices(),
            vec![("A".to_string(), 2), ("C".to_string(), 4)]
        );
    }
}
