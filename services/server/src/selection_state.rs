//! Per-connection derived state: the set of course-groups a user has
//! already chosen, and their chosen count by course type. Grounded on
//! `original_source/course_types_groups.go::populateUserCourseTypesAndGroups`.

use cca_protocol::{CourseGroup, CourseType};
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct ChosenState {
    pub groups: HashSet<CourseGroup>,
    pub type_counts: HashMap<CourseType, u32>,
}

impl ChosenState {
    pub fn type_count(&self, t: CourseType) -> u32 {
        self.type_counts.get(&t).copied().unwrap_or(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error("duplicate group in user choices: {0}")]
    DuplicateGroup(CourseGroup),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Reads every course the user currently has in `choices`, joined against
/// `courses` for type/group, combining both into one pass. Errors if the
/// same course-group appears twice, which would mean the group-conflict
/// invariant (§8 I-2) was already violated in storage.
pub async fn populate(pool: &PgPool, user_id: &str) -> Result<ChosenState, PopulateError> {
    let rows = sqlx::query(
        r#"SELECT c.ctype, c.cgroup FROM choices ch
           JOIN courses c ON c.id = ch.courseid
           WHERE ch.userid = $1"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut state = ChosenState::default();
    for row in rows {
        let ctype_str: String = row.get("ctype");
        let cgroup_str: String = row.get("cgroup");
        let Some(ctype) = CourseType::parse(&ctype_str) else {
            continue;
        };
        let Some(cgroup) = CourseGroup::parse(&cgroup_str) else {
            continue;
        };
        if !state.groups.insert(cgroup) {
            return Err(PopulateError::DuplicateGroup(cgroup));
        }
        *state.type_counts.entry(ctype).or_insert(0) += 1;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_count_defaults_to_zero_for_unseen_type() {
        let state = ChosenState::default();
        assert_eq!(state.type_count(CourseType::Sport), 0);
    }

    #[test]
    fn type_count_reflects_inserted_counts() {
        let mut state = ChosenState::default();
        state.type_counts.insert(CourseType::Sport, 2);
        assert_eq!(state.type_count(CourseType::Sport), 2);
        assert_eq!(state.type_count(CourseType::NonSport), 0);
    }
}
