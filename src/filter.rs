use serde::Serialize;

use crate::models::StudentRecord;

/// School value that places no constraint on the school.
pub const ALL_SCHOOLS: &str = "All";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_grade: Option<u32>,
    pub max_grade: Option<u32>,
    pub school: Option<String>,
}

impl FilterCriteria {
    pub fn is_unconstrained(&self) -> bool {
        self.min_age.is_none()
            && self.max_age.is_none()
            && self.min_grade.is_none()
            && self.max_grade.is_none()
            && self.school().is_none()
    }

    /// The school constraint, with the `All` sentinel treated as none.
    pub(crate) fn school(&self) -> Option<&str> {
        self.school
            .as_deref()
            .filter(|school| *school != ALL_SCHOOLS)
    }

    pub fn matches(&self, student: &StudentRecord) -> bool {
        self.min_age.map_or(true, |min| student.age >= min)
            && self.max_age.map_or(true, |max| student.age <= max)
            && self.min_grade.map_or(true, |min| student.grade >= min)
            && self.max_grade.map_or(true, |max| student.grade <= max)
            && self.school().map_or(true, |school| student.school == school)
    }
}

/// Returns the students satisfying every present criterion, in input order.
pub fn filter_students(students: &[StudentRecord], criteria: &FilterCriteria) -> Vec<StudentRecord> {
    students
        .iter()
        .filter(|student| criteria.matches(student))
        .cloned()
        .collect()
}

/// School choices for a selector: `All` first, then each school once in
/// first-seen order.
pub fn schools(students: &[StudentRecord]) -> Vec<String> {
    let mut choices = vec![ALL_SCHOOLS.to_string()];
    for student in students {
        if !choices.iter().any(|school| *school == student.school) {
            choices.push(student.school.clone());
        }
    }
    choices
}
