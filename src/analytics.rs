use clap::ValueEnum;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{
    GradeAnalysis, Histogram, HistogramBin, Pathway, PathwayGroup, PredictedScore, RadarProfile,
    ScoreSummary, StudentOverall, StudentRecord, Subject, SubjectAnalysis, AT_RISK_THRESHOLD,
    ELIGIBILITY_THRESHOLD, EXCELLING_THRESHOLD, HISTOGRAM_BINS, PATHWAYS, RADAR_RANGE,
    SUBJECT_COUNT, SYNTHETIC_SCORE_RANGE,
};

/// How the overall score divides a student's summed subject scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
pub enum ScoreDivisor {
    /// Always divide by the number of subjects in the curriculum, so absent
    /// scores count as zero.
    #[default]
    #[value(name = "universe")]
    SubjectUniverse,
    /// Divide by the number of scores the student actually has.
    #[value(name = "present")]
    PresentSubjects,
}

pub fn summarize(values: &[f64], label: &str) -> Result<ScoreSummary> {
    if values.is_empty() {
        return Err(AnalyticsError::EmptyAggregate(label.to_string()));
    }

    let total: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(ScoreSummary {
        average: total / values.len() as f64,
        min,
        max,
        count: values.len(),
    })
}

/// Splits the observed range into `bins` equal-width buckets. The maximum
/// lands in the last bucket; when every value is equal they all land in the
/// first.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    if values.is_empty() || bins == 0 {
        return Histogram { bins: Vec::new() };
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bins as f64;

    let mut buckets: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for value in values {
        let index = if width > 0.0 {
            (((value - min) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        buckets[index].count += 1;
    }

    Histogram { bins: buckets }
}

fn as_f64(scores: &[u32]) -> Vec<f64> {
    scores.iter().map(|&score| f64::from(score)).collect()
}

/// Per-subject average, minimum, maximum and distribution.
pub fn subject_analysis(students: &[StudentRecord]) -> Result<Vec<SubjectAnalysis>> {
    if students.is_empty() {
        return Err(AnalyticsError::EmptyAggregate("subject analysis".to_string()));
    }

    let mut collected: [Vec<u32>; SUBJECT_COUNT] = Default::default();
    for student in students {
        for (subject, score) in student.scores.iter() {
            collected[subject.index()].push(score);
        }
    }

    let analysis = Subject::ALL
        .into_iter()
        .zip(collected)
        .map(|(subject, scores)| {
            let values = as_f64(&scores);
            let summary = summarize(&values, subject.as_str()).ok();
            if summary.is_none() {
                debug!(subject = subject.as_str(), "no scores recorded");
            }
            SubjectAnalysis {
                subject,
                histogram: histogram(&values, HISTOGRAM_BINS),
                scores,
                summary,
            }
        })
        .collect();

    Ok(analysis)
}

/// Subjects the student scored at least `threshold` in.
pub fn eligible_subjects(student: &StudentRecord, threshold: u32) -> Vec<Subject> {
    student
        .scores
        .iter()
        .filter(|&(_, score)| score >= threshold)
        .map(|(subject, _)| subject)
        .collect()
}

pub fn qualifies(student: &StudentRecord, pathway: &Pathway, threshold: u32) -> bool {
    let eligible = eligible_subjects(student, threshold);
    pathway
        .required
        .iter()
        .all(|subject| eligible.contains(subject))
}

pub fn pathway_analysis(students: &[StudentRecord]) -> Vec<PathwayGroup> {
    pathway_analysis_with_threshold(students, ELIGIBILITY_THRESHOLD)
}

/// Buckets students into every pathway they qualify for. A student may land
/// in several buckets or none; input order is kept inside each bucket.
pub fn pathway_analysis_with_threshold(
    students: &[StudentRecord],
    threshold: u32,
) -> Vec<PathwayGroup> {
    PATHWAYS
        .iter()
        .map(|pathway| PathwayGroup {
            pathway: *pathway,
            students: students
                .iter()
                .filter(|student| qualifies(student, pathway, threshold))
                .cloned()
                .collect(),
        })
        .collect()
}

pub fn overall_score(student: &StudentRecord, divisor: ScoreDivisor) -> f64 {
    let total = student.scores.total() as f64;
    let count = match divisor {
        ScoreDivisor::SubjectUniverse => SUBJECT_COUNT,
        ScoreDivisor::PresentSubjects => student.scores.present_count(),
    };
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn is_at_risk(overall: f64) -> bool {
    overall < AT_RISK_THRESHOLD
}

pub fn is_excelling(overall: f64) -> bool {
    overall >= EXCELLING_THRESHOLD
}

/// Groups students by grade, in order of each grade's first appearance, and
/// summarizes their overall scores.
pub fn grade_comparison(
    students: &[StudentRecord],
    divisor: ScoreDivisor,
) -> Result<Vec<GradeAnalysis>> {
    let mut groups: Vec<(u32, Vec<StudentOverall>)> = Vec::new();

    for student in students {
        let entry = StudentOverall {
            student: student.clone(),
            overall: overall_score(student, divisor),
        };
        match groups.iter_mut().find(|(grade, _)| *grade == student.grade) {
            Some((_, members)) => members.push(entry),
            None => groups.push((student.grade, vec![entry])),
        }
    }

    groups
        .into_iter()
        .map(|(grade, members)| -> Result<GradeAnalysis> {
            let overall: Vec<f64> = members.iter().map(|member| member.overall).collect();
            let summary = summarize(&overall, &format!("grade {grade}"))?;
            let at_risk = members
                .iter()
                .filter(|member| is_at_risk(member.overall))
                .cloned()
                .collect();
            let excelling = members
                .iter()
                .filter(|member| is_excelling(member.overall))
                .cloned()
                .collect();

            Ok(GradeAnalysis {
                grade,
                histogram: histogram(&overall, HISTOGRAM_BINS),
                students: members,
                summary,
                at_risk,
                excelling,
            })
        })
        .collect()
}

/// Scores in subject order with absent subjects as zero.
pub fn radar_profile(student: &StudentRecord) -> RadarProfile {
    RadarProfile {
        name: student.name.clone(),
        axes: Subject::ALL
            .into_iter()
            .map(|subject| (subject, student.scores.get(subject).unwrap_or(0)))
            .collect(),
        range: RADAR_RANGE,
    }
}

/// Placeholder forecast: a uniform draw over the synthetic score range for
/// every student. Not a model.
pub fn predict_placeholder<R: Rng>(
    students: &[StudentRecord],
    rng: &mut R,
) -> Vec<PredictedScore> {
    let low = f64::from(*SYNTHETIC_SCORE_RANGE.start());
    let high = f64::from(*SYNTHETIC_SCORE_RANGE.end());
    students
        .iter()
        .map(|student| PredictedScore {
            name: student.name.clone(),
            age: student.age,
            predicted: rng.gen_range(low..high),
        })
        .collect()
}
