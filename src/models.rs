use std::fmt;
use std::ops::RangeInclusive;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

pub const SUBJECT_COUNT: usize = 6;

/// Minimum score for a subject to count towards pathway eligibility.
pub const ELIGIBILITY_THRESHOLD: u32 = 70;
/// Overall scores strictly below this are at risk.
pub const AT_RISK_THRESHOLD: f64 = 60.0;
/// Overall scores at or above this are excelling.
pub const EXCELLING_THRESHOLD: f64 = 90.0;

pub const RADAR_RANGE: (u32, u32) = (50, 100);
pub const HISTOGRAM_BINS: usize = 10;

pub const SYNTHETIC_SCORE_RANGE: RangeInclusive<u32> = 50..=100;
pub const SYNTHETIC_AGE_RANGE: RangeInclusive<u32> = 12..=18;
pub const SYNTHETIC_GRADE_RANGE: RangeInclusive<u32> = 8..=12;
pub const SYNTHETIC_TERM_RANGE: RangeInclusive<u32> = 1..=3;
pub const SYNTHETIC_CLASS_RANGE: RangeInclusive<u32> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Subject {
    #[serde(rename = "English Language")]
    EnglishLanguage,
    #[serde(rename = "Social Studies")]
    SocialStudies,
    #[serde(rename = "Mathematics")]
    Mathematics,
    #[serde(rename = "Integrated Science")]
    IntegratedScience,
    #[serde(rename = "Zambian Languages")]
    ZambianLanguages,
    #[serde(rename = "Creative and Technology Studies")]
    CreativeAndTechnologyStudies,
}

impl Subject {
    pub const ALL: [Subject; SUBJECT_COUNT] = [
        Subject::EnglishLanguage,
        Subject::SocialStudies,
        Subject::Mathematics,
        Subject::IntegratedScience,
        Subject::ZambianLanguages,
        Subject::CreativeAndTechnologyStudies,
    ];

    /// Display name, also used as the CSV column header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::EnglishLanguage => "English Language",
            Subject::SocialStudies => "Social Studies",
            Subject::Mathematics => "Mathematics",
            Subject::IntegratedScience => "Integrated Science",
            Subject::ZambianLanguages => "Zambian Languages",
            Subject::CreativeAndTechnologyStudies => "Creative and Technology Studies",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-subject scores indexed by [`Subject`]. A `None` slot is a subject the
/// record has no score for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjectScores([Option<u32>; SUBJECT_COUNT]);

impl SubjectScores {
    pub fn from_scores(scores: [u32; SUBJECT_COUNT]) -> Self {
        SubjectScores(scores.map(Some))
    }

    #[cfg(test)]
    pub fn with(mut self, subject: Subject, score: u32) -> Self {
        self.0[subject.index()] = Some(score);
        self
    }

    pub fn set(&mut self, subject: Subject, score: Option<u32>) {
        self.0[subject.index()] = score;
    }

    pub fn get(&self, subject: Subject) -> Option<u32> {
        self.0[subject.index()]
    }

    /// Present scores in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (Subject, u32)> + '_ {
        Subject::ALL
            .into_iter()
            .filter_map(|subject| self.get(subject).map(|score| (subject, score)))
    }

    /// Sum of present scores, widened so out-of-range imports cannot overflow.
    pub fn total(&self) -> u64 {
        self.iter().map(|(_, score)| u64::from(score)).sum()
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Serialize for SubjectScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.present_count()))?;
        for (subject, score) in self.iter() {
            map.serialize_entry(subject.as_str(), &score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    pub grade: u32,
    pub term: Option<u32>,
    pub class: Option<u32>,
    pub school: String,
    pub scores: SubjectScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pathway {
    pub name: &'static str,
    pub required: &'static [Subject],
}

pub const PATHWAYS: [Pathway; 4] = [
    Pathway {
        name: "STEM",
        required: &[Subject::Mathematics, Subject::IntegratedScience],
    },
    Pathway {
        name: "Humanities and Social Sciences",
        required: &[Subject::EnglishLanguage, Subject::SocialStudies],
    },
    Pathway {
        name: "Linguistic and Cultural Studies",
        required: &[Subject::ZambianLanguages, Subject::EnglishLanguage],
    },
    Pathway {
        name: "Creative and Design",
        required: &[Subject::CreativeAndTechnologyStudies],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectAnalysis {
    pub subject: Subject,
    pub scores: Vec<u32>,
    pub summary: Option<ScoreSummary>,
    pub histogram: Histogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathwayGroup {
    pub pathway: Pathway,
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentOverall {
    pub student: StudentRecord,
    pub overall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeAnalysis {
    pub grade: u32,
    pub students: Vec<StudentOverall>,
    pub summary: ScoreSummary,
    pub histogram: Histogram,
    pub at_risk: Vec<StudentOverall>,
    pub excelling: Vec<StudentOverall>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarProfile {
    pub name: String,
    pub axes: Vec<(Subject, u32)>,
    pub range: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedScore {
    pub name: String,
    pub age: u32,
    pub predicted: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_order_matches_index() {
        for (position, subject) in Subject::ALL.iter().enumerate() {
            assert_eq!(subject.index(), position);
        }
    }

    #[test]
    fn sparse_scores_only_iterate_present_subjects() {
        let scores = SubjectScores::default()
            .with(Subject::Mathematics, 80)
            .with(Subject::SocialStudies, 60);
        let present: Vec<_> = scores.iter().collect();
        assert_eq!(
            present,
            vec![(Subject::SocialStudies, 60), (Subject::Mathematics, 80)]
        );
        assert_eq!(scores.total(), 140);
        assert_eq!(scores.present_count(), 2);
    }

    #[test]
    fn every_pathway_requires_known_subjects() {
        for pathway in PATHWAYS.iter() {
            assert!(!pathway.required.is_empty());
            assert!(pathway
                .required
                .iter()
                .all(|subject| Subject::ALL.contains(subject)));
        }
    }

    #[test]
    fn scores_serialize_as_named_map() {
        let scores = SubjectScores::default().with(Subject::ZambianLanguages, 77);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"Zambian Languages":77}"#);
    }
}
