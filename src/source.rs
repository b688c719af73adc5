use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use rand::Rng;
use tracing::{debug, info};
use uuid::{Builder, Uuid};

use crate::error::{AnalyticsError, Result};
use crate::models::{
    StudentRecord, Subject, SubjectScores, SUBJECT_COUNT, SYNTHETIC_AGE_RANGE,
    SYNTHETIC_CLASS_RANGE, SYNTHETIC_GRADE_RANGE, SYNTHETIC_SCORE_RANGE, SYNTHETIC_TERM_RANGE,
};

const FIRST_NAMES: &[&str] = &[
    "Avery", "Chanda", "Mutale", "Jules", "Kiara", "Bwalya", "Natasha", "Daniel", "Grace",
    "Mwila", "Thandiwe", "Peter", "Esther", "Kondwani", "Ruth", "Samuel", "Lubona", "Miriam",
    "Joseph", "Chipo",
];

const LAST_NAMES: &[&str] = &[
    "Banda", "Phiri", "Mwanza", "Tembo", "Zulu", "Lee", "Moreno", "Patel", "Sakala", "Mulenga",
    "Chilufya", "Ngoma", "Lungu", "Daka", "Kabwe", "Musonda", "Simwanza", "Hamoonga",
];

const SCHOOL_SUFFIXES: &[&str] = &[
    "Secondary School",
    "Academy",
    "High School",
    "Day Secondary School",
    "Boarding School",
];

/// Produces synthetic student records one at a time.
pub trait StudentGenerator {
    fn next_student(&mut self) -> StudentRecord;
}

/// Draws every field uniformly from the synthetic ranges. Names and schools
/// come from small built-in pools.
pub struct RandomStudents<R> {
    rng: R,
}

impl<R: Rng> RandomStudents<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn pick(&mut self, pool: &[&'static str]) -> &'static str {
        pool[self.rng.gen_range(0..pool.len())]
    }

    fn name(&mut self) -> String {
        let first = self.pick(FIRST_NAMES);
        let last = self.pick(LAST_NAMES);
        format!("{first} {last}")
    }

    fn school(&mut self) -> String {
        let founder = self.pick(LAST_NAMES);
        let suffix = self.pick(SCHOOL_SUFFIXES);
        format!("{founder} {suffix}")
    }
}

impl<R: Rng> StudentGenerator for RandomStudents<R> {
    fn next_student(&mut self) -> StudentRecord {
        let id = Builder::from_random_bytes(self.rng.gen()).into_uuid();
        let name = self.name();
        let mut scores = [0u32; SUBJECT_COUNT];
        for score in scores.iter_mut() {
            *score = self.rng.gen_range(SYNTHETIC_SCORE_RANGE);
        }

        StudentRecord {
            id,
            name,
            age: self.rng.gen_range(SYNTHETIC_AGE_RANGE),
            grade: self.rng.gen_range(SYNTHETIC_GRADE_RANGE),
            term: Some(self.rng.gen_range(SYNTHETIC_TERM_RANGE)),
            class: Some(self.rng.gen_range(SYNTHETIC_CLASS_RANGE)),
            school: self.school(),
            scores: SubjectScores::from_scores(scores),
        }
    }
}

pub fn synthesize<G: StudentGenerator + ?Sized>(
    generator: &mut G,
    count: usize,
) -> Vec<StudentRecord> {
    let records: Vec<StudentRecord> = (0..count).map(|_| generator.next_student()).collect();
    info!(count = records.len(), "generated synthetic students");
    records
}

#[derive(Debug)]
pub struct RejectedRow {
    pub line: u64,
    pub error: AnalyticsError,
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub records: Vec<StudentRecord>,
    pub rejected: Vec<RejectedRow>,
}

struct ColumnMap {
    name: usize,
    age: usize,
    grade: usize,
    school: usize,
    term: Option<usize>,
    class: Option<usize>,
    subjects: [usize; SUBJECT_COUNT],
}

impl ColumnMap {
    fn resolve(headers: &StringRecord, source_name: &str) -> Result<Self> {
        let position = |label: &str| headers.iter().position(|header| header.trim() == label);
        let mut missing = Vec::new();
        let mut require = |label: &'static str| {
            let found = position(label);
            if found.is_none() {
                missing.push(label);
            }
            found.unwrap_or_default()
        };

        let name = require("Name");
        let age = require("Age");
        let grade = require("Grade");
        let school = require("School");
        let subjects = Subject::ALL.map(|subject| require(subject.as_str()));

        if !missing.is_empty() {
            return Err(AnalyticsError::Parse {
                source_name: source_name.to_string(),
                reason: format!("missing required column(s): {}", missing.join(", ")),
            });
        }

        Ok(Self {
            name,
            age,
            grade,
            school,
            term: position("Term"),
            class: position("Class"),
            subjects,
        })
    }

    fn parse_row(&self, row: &StringRecord) -> Result<StudentRecord> {
        let name = cell(row, self.name);
        if name.is_empty() {
            return Err(AnalyticsError::MissingField("Name".to_string()));
        }

        let mut scores = SubjectScores::default();
        for subject in Subject::ALL {
            let score = optional_number(row, Some(self.subjects[subject.index()]), subject.as_str())?;
            scores.set(subject, score);
        }

        Ok(StudentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age: required_number(row, self.age, "Age")?,
            grade: required_number(row, self.grade, "Grade")?,
            term: optional_number(row, self.term, "Term")?,
            class: optional_number(row, self.class, "Class")?,
            school: cell(row, self.school).to_string(),
            scores,
        })
    }
}

fn cell(row: &StringRecord, index: usize) -> &str {
    row.get(index).map(str::trim).unwrap_or("")
}

fn parse_number(value: &str, column: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| AnalyticsError::Value {
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn required_number(row: &StringRecord, index: usize, column: &str) -> Result<u32> {
    match cell(row, index) {
        "" => Err(AnalyticsError::MissingField(column.to_string())),
        value => parse_number(value, column),
    }
}

fn optional_number(row: &StringRecord, index: Option<usize>, column: &str) -> Result<Option<u32>> {
    match index.map(|index| cell(row, index)) {
        None | Some("") => Ok(None),
        Some(value) => parse_number(value, column).map(Some),
    }
}

/// Reads student records from CSV. Rows with bad cells are skipped and
/// reported; a missing required column or a file with no usable rows fails.
pub fn read_csv<R: Read>(input: R, source_name: &str) -> Result<ImportOutcome> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();
    let columns = ColumnMap::resolve(&headers, source_name)?;

    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Utf8 { .. }) => {
                let line = err.position().map(|position| position.line()).unwrap_or_default();
                debug!(line, error = %err, "rejecting undecodable row from {source_name}");
                rejected.push(RejectedRow {
                    line,
                    error: AnalyticsError::Csv(err),
                });
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let line = row.position().map(|position| position.line()).unwrap_or_default();
        match columns.parse_row(&row) {
            Ok(record) => records.push(record),
            Err(error) => {
                debug!(line, %error, "rejecting row from {source_name}");
                rejected.push(RejectedRow { line, error });
            }
        }
    }

    if records.is_empty() {
        return Err(AnalyticsError::Parse {
            source_name: source_name.to_string(),
            reason: "no usable rows".to_string(),
        });
    }

    info!(
        accepted = records.len(),
        rejected = rejected.len(),
        "imported students from {source_name}"
    );
    Ok(ImportOutcome { records, rejected })
}

pub fn load_csv(path: &Path) -> Result<ImportOutcome> {
    let file = File::open(path).map_err(|source| AnalyticsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file, &path.display().to_string())
}

/// Writes records in the same layout [`read_csv`] accepts.
pub fn write_csv<W: Write>(records: &[StudentRecord], output: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);

    let mut header = vec!["Name", "Age", "Grade", "Term", "Class", "School"];
    header.extend(Subject::ALL.iter().map(|subject| subject.as_str()));
    writer.write_record(&header)?;

    let optional = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();
    for record in records {
        let mut row = vec![
            record.name.clone(),
            record.age.to_string(),
            record.grade.to_string(),
            optional(record.term),
            optional(record.class),
            record.school.clone(),
        ];
        row.extend(Subject::ALL.iter().map(|subject| optional(record.scores.get(*subject))));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    debug!(count = records.len(), "wrote student csv");
    Ok(())
}

pub fn save_csv(path: &Path, records: &[StudentRecord]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(records, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Name,Age,Grade,Term,Class,School,English Language,Social Studies,Mathematics,Integrated Science,Zambian Languages,Creative and Technology Studies";

    #[test]
    fn seeded_generation_is_reproducible() {
        let first = synthesize(&mut RandomStudents::new(StdRng::seed_from_u64(7)), 10);
        let second = synthesize(&mut RandomStudents::new(StdRng::seed_from_u64(7)), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn generated_fields_stay_in_range() {
        let students = synthesize(&mut RandomStudents::new(StdRng::seed_from_u64(42)), 200);
        assert_eq!(students.len(), 200);
        for student in &students {
            assert!(SYNTHETIC_AGE_RANGE.contains(&student.age));
            assert!(SYNTHETIC_GRADE_RANGE.contains(&student.grade));
            assert!(student.term.is_some_and(|term| SYNTHETIC_TERM_RANGE.contains(&term)));
            assert!(student.class.is_some_and(|class| SYNTHETIC_CLASS_RANGE.contains(&class)));
            assert_eq!(student.scores.present_count(), SUBJECT_COUNT);
            assert!(student
                .scores
                .iter()
                .all(|(_, score)| SYNTHETIC_SCORE_RANGE.contains(&score)));
            assert!(!student.name.is_empty());
            assert!(!student.school.is_empty());
        }
    }

    #[test]
    fn imports_rows_with_optional_term_and_class() {
        let input = format!("{HEADER}\nAvery Lee,15,10,2,3,Kabwe Academy,80,70,90,75,60,88\n");
        let outcome = read_csv(input.as_bytes(), "inline").unwrap();
        assert!(outcome.rejected.is_empty());
        let record = &outcome.records[0];
        assert_eq!(record.name, "Avery Lee");
        assert_eq!(record.age, 15);
        assert_eq!(record.grade, 10);
        assert_eq!(record.term, Some(2));
        assert_eq!(record.class, Some(3));
        assert_eq!(record.school, "Kabwe Academy");
        assert_eq!(record.scores.get(Subject::Mathematics), Some(90));
        assert_eq!(record.scores.get(Subject::CreativeAndTechnologyStudies), Some(88));
    }

    #[test]
    fn missing_column_rejects_file() {
        let input = "Name,Grade,School,English Language\nAvery,10,Kabwe,80\n";
        let err = read_csv(input.as_bytes(), "partial.csv").unwrap_err();
        match err {
            AnalyticsError::Parse { reason, .. } => {
                assert!(reason.contains("Age"));
                assert!(reason.contains("Mathematics"));
                assert!(!reason.contains("Term"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_numbers_reject_only_that_row() {
        let input = format!(
            "{HEADER}\nAvery Lee,fifteen,10,1,1,Kabwe,80,70,90,75,60,88\nJules Moreno,14,9,1,1,Kabwe,81,71,91,76,61,89\n"
        );
        let outcome = read_csv(input.as_bytes(), "inline").unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name, "Jules Moreno");
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].line, 2);
        assert!(matches!(
            outcome.rejected[0].error,
            AnalyticsError::Value { ref column, .. } if column == "Age"
        ));
    }

    #[test]
    fn empty_name_is_a_missing_field() {
        let input = format!(
            "{HEADER}\n,15,10,1,1,Kabwe,80,70,90,75,60,88\nJules,14,9,1,1,Kabwe,81,71,91,76,61,89\n"
        );
        let outcome = read_csv(input.as_bytes(), "inline").unwrap();
        assert!(matches!(
            outcome.rejected[0].error,
            AnalyticsError::MissingField(ref field) if field == "Name"
        ));
    }

    #[test]
    fn empty_subject_cell_leaves_score_absent() {
        let input = format!("{HEADER}\nAvery,15,10,,,Kabwe,80,,90,75,60,88\n");
        let outcome = read_csv(input.as_bytes(), "inline").unwrap();
        let record = &outcome.records[0];
        assert_eq!(record.scores.get(Subject::SocialStudies), None);
        assert_eq!(record.term, None);
        assert_eq!(record.scores.present_count(), 5);
    }

    #[test]
    fn undecodable_row_is_rejected_not_fatal() {
        let mut input = format!("{HEADER}\n").into_bytes();
        input.extend_from_slice(b"Av\xffery,15,10,1,1,Kabwe,80,70,90,75,60,88\n");
        input.extend_from_slice(b"Jules,14,9,1,1,Kabwe,81,71,91,76,61,89\n");

        let outcome = read_csv(input.as_slice(), "inline").unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name, "Jules");
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].line, 2);
        assert!(matches!(outcome.rejected[0].error, AnalyticsError::Csv(_)));
    }

    #[test]
    fn file_without_usable_rows_fails() {
        let input = format!("{HEADER}\nAvery,old,10,1,1,Kabwe,80,70,90,75,60,88\n");
        let err = read_csv(input.as_bytes(), "bad.csv").unwrap_err();
        assert!(matches!(err, AnalyticsError::Parse { .. }));
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let input = "Email,Name,Age,Grade,School,English Language,Social Studies,Mathematics,Integrated Science,Zambian Languages,Creative and Technology Studies,Physics\n\
                     a@b.c,Avery,15,10,Kabwe,80,70,90,75,60,88,99\n";
        let outcome = read_csv(input.as_bytes(), "inline").unwrap();
        assert_eq!(outcome.records[0].name, "Avery");
        assert_eq!(outcome.records[0].scores.total(), 80 + 70 + 90 + 75 + 60 + 88);
    }

    #[test]
    fn exported_students_load_back() {
        let students = synthesize(&mut RandomStudents::new(StdRng::seed_from_u64(3)), 5);
        let file = NamedTempFile::new().expect("tempfile");
        save_csv(file.path(), &students).expect("save");

        let outcome = load_csv(file.path()).expect("load");
        assert_eq!(outcome.records.len(), students.len());
        for (loaded, original) in outcome.records.iter().zip(students.iter()) {
            assert_eq!(loaded.name, original.name);
            assert_eq!(loaded.age, original.age);
            assert_eq!(loaded.grade, original.grade);
            assert_eq!(loaded.term, original.term);
            assert_eq!(loaded.class, original.class);
            assert_eq!(loaded.school, original.school);
            assert_eq!(loaded.scores, original.scores);
        }
    }

    #[test]
    fn bundled_sample_imports_cleanly() {
        let sample = include_str!("../data/sample_students.csv");
        let outcome = read_csv(sample.as_bytes(), "sample_students.csv").unwrap();
        assert_eq!(outcome.records.len(), 6);
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.records[3].scores.total(), 420);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, AnalyticsError::FileRead { .. }));
    }

    #[test]
    fn headers_with_padding_still_match() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            " Name , Age,Grade,School,English Language,Social Studies,Mathematics,Integrated Science,Zambian Languages,Creative and Technology Studies"
        )
        .unwrap();
        writeln!(file, "Avery,15,10,Kabwe,80,70,90,75,60,88").unwrap();
        let outcome = load_csv(file.path()).expect("load");
        assert_eq!(outcome.records.len(), 1);
    }
}
