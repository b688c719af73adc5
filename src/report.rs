use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{self, ScoreDivisor};
use crate::error::AnalyticsError;
use crate::filter::FilterCriteria;
use crate::models::{Histogram, PredictedScore, StudentRecord, PATHWAYS};

pub const NO_MATCHES: &str = "No students match the current filters.";
const NO_DATA: &str = "No data.";

#[derive(Debug, Clone, Copy, Default)]
pub struct GradeOptions {
    pub details: bool,
    pub at_risk: bool,
    pub excelling: bool,
    pub divisor: ScoreDivisor,
}

pub fn describe_filters(criteria: &FilterCriteria) -> String {
    if criteria.is_unconstrained() {
        return "all students".to_string();
    }

    let range = |label: &str, min: Option<u32>, max: Option<u32>| match (min, max) {
        (Some(min), Some(max)) => Some(format!("{label} {min}-{max}")),
        (Some(min), None) => Some(format!("{label} {min}+")),
        (None, Some(max)) => Some(format!("{label} up to {max}")),
        (None, None) => None,
    };

    let mut parts = Vec::new();
    parts.extend(range("age", criteria.min_age, criteria.max_age));
    parts.extend(range("grade", criteria.min_grade, criteria.max_grade));
    if let Some(school) = criteria.school() {
        parts.push(format!("school {school}"));
    }
    parts.join(", ")
}

fn subject_line(student: &StudentRecord) -> String {
    student
        .scores
        .iter()
        .map(|(subject, score)| format!("{subject}: {score}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_histogram(output: &mut String, histogram: &Histogram) {
    for bin in histogram.bins.iter() {
        let _ = writeln!(
            output,
            "- {:.1}-{:.1}: {}",
            bin.lower, bin.upper, bin.count
        );
    }
}

pub fn write_profile(output: &mut String, student: &StudentRecord) {
    let profile = analytics::radar_profile(student);

    let _ = writeln!(output, "## Student Profile");
    let _ = writeln!(output, "**STUDENT:** {}", student.name);
    let _ = writeln!(output, "**AGE:** {}", student.age);
    let _ = writeln!(output, "**GRADE:** {}", student.grade);
    let _ = writeln!(output, "**SCHOOL:** {}", student.school);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "### Subject Radar for {} (range {}-{})",
        profile.name, profile.range.0, profile.range.1
    );
    for (subject, score) in profile.axes.iter() {
        let _ = writeln!(output, "- {subject}: {score}");
    }
}

pub fn write_subjects(output: &mut String, students: &[StudentRecord], details: bool) {
    let _ = writeln!(output, "## Subject Analysis");

    let analysis = match analytics::subject_analysis(students) {
        Ok(analysis) => analysis,
        Err(AnalyticsError::EmptyAggregate(_)) => {
            let _ = writeln!(output, "{NO_MATCHES}");
            return;
        }
        Err(other) => {
            let _ = writeln!(output, "{other}");
            return;
        }
    };

    for subject in analysis.iter() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} Analysis", subject.subject);
        match subject.summary {
            Some(summary) => {
                let _ = writeln!(output, "Average Score: {:.2}", summary.average);
                let _ = writeln!(output, "Minimum Score: {:.0}", summary.min);
                let _ = writeln!(output, "Maximum Score: {:.0}", summary.max);
            }
            None => {
                let _ = writeln!(output, "{NO_DATA}");
            }
        }

        if details && !subject.histogram.bins.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "{} Score Distribution:", subject.subject);
            write_histogram(output, &subject.histogram);
        }
    }
}

pub fn write_pathways(output: &mut String, students: &[StudentRecord], details: bool) {
    let _ = writeln!(output, "## Pathway Analysis");

    if students.is_empty() {
        let _ = writeln!(output, "{NO_MATCHES}");
        return;
    }

    for group in analytics::pathway_analysis(students).iter() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} Pathway", group.pathway.name);
        let _ = writeln!(
            output,
            "{} of {} students qualify.",
            group.students.len(),
            students.len()
        );

        if details {
            for student in group.students.iter() {
                let required = group
                    .pathway
                    .required
                    .iter()
                    .map(|subject| {
                        let score = student.scores.get(*subject).unwrap_or_default();
                        format!("{subject}: {score}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(output, "- {}: {}", student.name, required);
            }
        }
    }
}

pub fn write_grades(output: &mut String, students: &[StudentRecord], options: &GradeOptions) {
    let _ = writeln!(output, "## Grade Comparison");

    if students.is_empty() {
        let _ = writeln!(output, "{NO_MATCHES}");
        return;
    }

    let grades = match analytics::grade_comparison(students, options.divisor) {
        Ok(grades) => grades,
        Err(err) => {
            let _ = writeln!(output, "{NO_DATA} ({err})");
            return;
        }
    };

    for grade in grades.iter() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Grade {} Performance Analysis", grade.grade);
        let _ = writeln!(output, "**Grade Performance Summary:**");
        let _ = writeln!(output, "Average Score: {:.2}", grade.summary.average);
        let _ = writeln!(output, "Minimum Score: {:.2}", grade.summary.min);
        let _ = writeln!(output, "Maximum Score: {:.2}", grade.summary.max);
        let _ = writeln!(output);
        let _ = writeln!(output, "Grade {} Score Distribution:", grade.grade);
        write_histogram(output, &grade.histogram);

        if options.details {
            let _ = writeln!(output);
            let _ = writeln!(output, "**Student Details:**");
            for member in grade.students.iter() {
                let _ = writeln!(
                    output,
                    "- {} (overall {:.2}): {}",
                    member.student.name,
                    member.overall,
                    subject_line(&member.student)
                );
            }
        }

        if options.at_risk {
            let _ = writeln!(output);
            let _ = writeln!(output, "**At-Risk Students:**");
            if grade.at_risk.is_empty() {
                let _ = writeln!(output, "None.");
            }
            for member in grade.at_risk.iter() {
                let _ = writeln!(output, "- {}: {}", member.student.name, subject_line(&member.student));
            }
        }

        if options.excelling {
            let _ = writeln!(output);
            let _ = writeln!(output, "**Excelling Students:**");
            if grade.excelling.is_empty() {
                let _ = writeln!(output, "None.");
            }
            for member in grade.excelling.iter() {
                let _ = writeln!(output, "- {}: {}", member.student.name, subject_line(&member.student));
            }
        }
    }
}

pub fn write_predictions(output: &mut String, predictions: &[PredictedScore]) {
    let _ = writeln!(output, "## Performance Prediction");

    if predictions.is_empty() {
        let _ = writeln!(output, "{NO_MATCHES}");
        return;
    }

    let _ = writeln!(output, "Placeholder values, not a trained model.");
    for prediction in predictions.iter() {
        let _ = writeln!(
            output,
            "- {} (age {}): predicted score {:.2}",
            prediction.name, prediction.age, prediction.predicted
        );
    }
}

/// Every report in one markdown document, with all optional sections shown.
pub fn build_report(
    students: &[StudentRecord],
    criteria: &FilterCriteria,
    generated_on: NaiveDate,
    divisor: ScoreDivisor,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# ScholarSense Report");
    let _ = writeln!(
        output,
        "Generated on {} for {} ({} students)",
        generated_on,
        describe_filters(criteria),
        students.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pathways");
    for pathway in PATHWAYS.iter() {
        let required = pathway
            .required
            .iter()
            .map(|subject| subject.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(output, "- {}: {}", pathway.name, required);
    }

    let _ = writeln!(output);
    write_subjects(&mut output, students, true);
    let _ = writeln!(output);
    write_pathways(&mut output, students, true);
    let _ = writeln!(output);
    write_grades(
        &mut output,
        students,
        &GradeOptions {
            details: true,
            at_risk: true,
            excelling: true,
            divisor,
        },
    );

    output
}

#[derive(Debug, Serialize)]
struct JsonEnvelope<'a, T: Serialize> {
    report: &'a str,
    generated_on: NaiveDate,
    filters: &'a FilterCriteria,
    students: usize,
    data: Option<T>,
}

/// Wraps an aggregate for machine consumption. `data` is `null` when the
/// aggregate had nothing to summarize.
pub fn to_json<T: Serialize>(
    report: &str,
    criteria: &FilterCriteria,
    generated_on: NaiveDate,
    students: usize,
    data: Option<T>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonEnvelope {
        report,
        generated_on,
        filters: criteria,
        students,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Subject, SubjectScores, SUBJECT_COUNT};
    use uuid::Uuid;

    fn student(name: &str, grade: u32, score: u32) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age: 14,
            grade,
            term: Some(2),
            class: Some(4),
            school: "Kabwe Academy".to_string(),
            scores: SubjectScores::from_scores([score; SUBJECT_COUNT]),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 2).expect("valid date")
    }

    #[test]
    fn profile_lists_header_and_radar_axes() {
        let mut output = String::new();
        write_profile(&mut output, &student("Avery Lee", 10, 77));
        assert!(output.contains("**STUDENT:** Avery Lee"));
        assert!(output.contains("**GRADE:** 10"));
        assert!(output.contains("(range 50-100)"));
        assert!(output.contains("- Creative and Technology Studies: 77"));
    }

    #[test]
    fn empty_students_render_no_matches_everywhere() {
        let report = build_report(&[], &FilterCriteria::default(), date(), ScoreDivisor::default());
        assert_eq!(report.matches(NO_MATCHES).count(), 3);
        assert!(report.contains("(0 students)"));
    }

    #[test]
    fn subject_section_uses_two_decimal_average() {
        let students = vec![student("Avery", 10, 70), student("Jules", 10, 71), student("Kiara", 10, 71)];
        let mut output = String::new();
        write_subjects(&mut output, &students, false);
        assert!(output.contains("### Mathematics Analysis"));
        assert!(output.contains("Average Score: 70.67"));
        assert!(output.contains("Minimum Score: 70"));
        assert!(!output.contains("Score Distribution"));
    }

    #[test]
    fn sparse_subject_reports_no_data() {
        let mut sparse = student("Avery", 10, 80);
        sparse.scores = SubjectScores::default().with(Subject::Mathematics, 80);
        let mut output = String::new();
        write_subjects(&mut output, &[sparse], true);
        assert!(output.contains(NO_DATA));
        assert!(output.contains("Mathematics Score Distribution:"));
    }

    #[test]
    fn pathway_details_list_required_scores() {
        let mut output = String::new();
        write_pathways(&mut output, &[student("Avery", 10, 85)], true);
        assert!(output.contains("### STEM Pathway"));
        assert!(output.contains("- Avery: Mathematics: 85, Integrated Science: 85"));
        assert!(output.contains("1 of 1 students qualify."));
    }

    #[test]
    fn grade_flags_control_sections() {
        let students = vec![student("Avery", 9, 55), student("Jules", 9, 92)];
        let mut quiet = String::new();
        write_grades(&mut quiet, &students, &GradeOptions::default());
        assert!(quiet.contains("### Grade 9 Performance Analysis"));
        assert!(!quiet.contains("At-Risk Students"));

        let mut loud = String::new();
        write_grades(
            &mut loud,
            &students,
            &GradeOptions {
                at_risk: true,
                excelling: true,
                ..Default::default()
            },
        );
        let risk_section = loud.split("**At-Risk Students:**").nth(1).unwrap();
        let (at_risk, excelling) = risk_section.split_once("**Excelling Students:**").unwrap();
        assert!(at_risk.contains("Avery"));
        assert!(!at_risk.contains("Jules"));
        assert!(excelling.contains("Jules"));
    }

    #[test]
    fn filters_are_described() {
        assert_eq!(describe_filters(&FilterCriteria::default()), "all students");
        let criteria = FilterCriteria {
            min_age: Some(12),
            max_age: Some(15),
            max_grade: Some(10),
            school: Some("Kabwe Academy".to_string()),
            ..Default::default()
        };
        assert_eq!(
            describe_filters(&criteria),
            "age 12-15, grade up to 10, school Kabwe Academy"
        );
    }

    #[test]
    fn all_schools_sentinel_is_not_described() {
        let criteria = FilterCriteria {
            min_age: Some(12),
            school: Some(crate::filter::ALL_SCHOOLS.to_string()),
            ..Default::default()
        };
        assert_eq!(describe_filters(&criteria), "age 12+");
    }

    #[test]
    fn json_envelope_marks_missing_data_as_null() {
        let json = to_json::<Vec<u32>>("subjects", &FilterCriteria::default(), date(), 0, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"], "subjects");
        assert_eq!(value["generated_on"], "2026-02-02");
        assert!(value["data"].is_null());
    }
}
