//! Shared domain vocabulary: year groups, course groups, course types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cohort label, or the special `Staff` label. Gates command acceptance
/// and UI role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YearGroup {
    Y9,
    Y10,
    Y11,
    Y12,
    Staff,
}

impl YearGroup {
    /// The four cohorts that participate in selection (excludes `Staff`).
    pub const SELECTABLE: [YearGroup; 4] =
        [YearGroup::Y9, YearGroup::Y10, YearGroup::Y11, YearGroup::Y12];

    /// Bit position in a course's year-group bitmask (Y9=1, Y10=2, Y11=4, Y12=8).
    pub fn bitmask(self) -> u8 {
        match self {
            YearGroup::Y9 => 0b0001,
            YearGroup::Y10 => 0b0010,
            YearGroup::Y11 => 0b0100,
            YearGroup::Y12 => 0b1000,
            YearGroup::Staff => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            YearGroup::Y9 => "Y9",
            YearGroup::Y10 => "Y10",
            YearGroup::Y11 => "Y11",
            YearGroup::Y12 => "Y12",
            YearGroup::Staff => "Staff",
        }
    }

    pub fn parse(s: &str) -> Option<YearGroup> {
        match s {
            "Y9" => Some(YearGroup::Y9),
            "Y10" => Some(YearGroup::Y10),
            "Y11" => Some(YearGroup::Y11),
            "Y12" => Some(YearGroup::Y12),
            "Staff" => Some(YearGroup::Staff),
            _ => None,
        }
    }
}

impl fmt::Display for YearGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timetable-slot label. A user may select at most one course per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseGroup {
    Mw1,
    Mw2,
    Mw3,
    Tt1,
    Tt2,
    Tt3,
}

impl CourseGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseGroup::Mw1 => "MW1",
            CourseGroup::Mw2 => "MW2",
            CourseGroup::Mw3 => "MW3",
            CourseGroup::Tt1 => "TT1",
            CourseGroup::Tt2 => "TT2",
            CourseGroup::Tt3 => "TT3",
        }
    }

    /// Human-readable label, as used for display purposes.
    pub fn display_name(self) -> &'static str {
        match self {
            CourseGroup::Mw1 => "Monday/Wednesday CCA1",
            CourseGroup::Mw2 => "Monday/Wednesday CCA2",
            CourseGroup::Mw3 => "Monday/Wednesday CCA3",
            CourseGroup::Tt1 => "Tuesday/Thursday CCA1",
            CourseGroup::Tt2 => "Tuesday/Thursday CCA2",
            CourseGroup::Tt3 => "Tuesday/Thursday CCA3",
        }
    }

    pub fn parse(s: &str) -> Option<CourseGroup> {
        match s {
            "MW1" => Some(CourseGroup::Mw1),
            "MW2" => Some(CourseGroup::Mw2),
            "MW3" => Some(CourseGroup::Mw3),
            "TT1" => Some(CourseGroup::Tt1),
            "TT2" => Some(CourseGroup::Tt2),
            "TT3" => Some(CourseGroup::Tt3),
            _ => None,
        }
    }
}

impl fmt::Display for CourseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pedagogical category. Per-year-group minimums drive confirmation
/// eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    Sport,
    NonSport,
}

impl CourseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseType::Sport => "Sport",
            CourseType::NonSport => "Non-sport",
        }
    }

    pub fn parse(s: &str) -> Option<CourseType> {
        match s {
            "Sport" => Some(CourseType::Sport),
            "Non-sport" => Some(CourseType::NonSport),
            _ => None,
        }
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_group_bitmasks_are_distinct_single_bits() {
        let masks: Vec<u8> = YearGroup::SELECTABLE.iter().map(|yg| yg.bitmask()).collect();
        assert_eq!(masks, vec![1, 2, 4, 8]);
    }

    #[test]
    fn course_group_round_trips_through_as_str() {
        for g in [
            CourseGroup::Mw1,
            CourseGroup::Mw2,
            CourseGroup::Mw3,
            CourseGroup::Tt1,
            CourseGroup::Tt2,
            CourseGroup::Tt3,
        ] {
            assert_eq!(CourseGroup::parse(g.as_str()), Some(g));
        }
    }

    #[test]
    fn course_type_round_trips_through_as_str() {
        for t in [CourseType::Sport, CourseType::NonSport] {
            assert_eq!(CourseType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn unknown_labels_parse_to_none() {
        assert_eq!(YearGroup::parse("Y13"), None);
        assert_eq!(CourseGroup::parse("MW4"), None);
        assert_eq!(CourseType::parse("Art"), None);
    }
}
