//! Domain entities for a single student's curriculum.
//!
//! Field names and enum values in the canonical projections keep the German
//! vocabulary of the persisted CSV format (`modul_id`, `offen`, ...), while
//! the Rust identifiers are English.

use crate::domain::canonical::{
    date_value, malformed, nested_list, nested_object, optional_bool, optional_date, optional_f64,
    optional_string, optional_u32, require_string, Canonical,
};
use crate::utils::error::{Result, StudyError};
use chrono::{Local, Months, NaiveDate};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status of a module: open, active or completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Open,
    Active,
    Completed,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Open => "offen",
            ModuleStatus::Active => "aktiv",
            ModuleStatus::Completed => "abgeschlossen",
        }
    }

    /// All statuses in declaration order, for presentation-layer option lists.
    pub fn variants() -> &'static [ModuleStatus] {
        &[
            ModuleStatus::Open,
            ModuleStatus::Active,
            ModuleStatus::Completed,
        ]
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleStatus {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "offen" => Ok(ModuleStatus::Open),
            "aktiv" => Ok(ModuleStatus::Active),
            "abgeschlossen" => Ok(ModuleStatus::Completed),
            other => Err(StudyError::InvalidValue {
                field: "status".to_string(),
                value: other.to_string(),
                reason: "expected one of: offen, aktiv, abgeschlossen".to_string(),
            }),
        }
    }
}

/// Status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStatus {
    Planned,
    Active,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Planned => "geplant",
            EnrollmentStatus::Active => "aktiv",
            EnrollmentStatus::Completed => "abgeschlossen",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "geplant" => Ok(EnrollmentStatus::Planned),
            "aktiv" => Ok(EnrollmentStatus::Active),
            "abgeschlossen" => Ok(EnrollmentStatus::Completed),
            other => Err(StudyError::InvalidValue {
                field: "status".to_string(),
                value: other.to_string(),
                reason: "expected one of: geplant, aktiv, abgeschlossen".to_string(),
            }),
        }
    }
}

/// Which metric feeds a study goal and which comparison decides achievement.
///
/// Credit and study-time goals are achieved at `current >= target`; the
/// grade-average goal at `current <= target` (lower grades are better).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    TotalCredits,
    SemesterCredits,
    GradeAverage,
    WeeklyStudyTime,
}

impl GoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalKind::TotalCredits => "Erreichte ECTS Punkte gesamt",
            GoalKind::SemesterCredits => "Erreichte ECTS Punkte Semester",
            GoalKind::GradeAverage => "Notendurchschnitt",
            GoalKind::WeeklyStudyTime => "Anzahl der Lernstunden",
        }
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalKind {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Erreichte ECTS Punkte gesamt" => Ok(GoalKind::TotalCredits),
            "Erreichte ECTS Punkte Semester" => Ok(GoalKind::SemesterCredits),
            "Notendurchschnitt" => Ok(GoalKind::GradeAverage),
            "Anzahl der Lernstunden" => Ok(GoalKind::WeeklyStudyTime),
            other => Err(StudyError::InvalidValue {
                field: "typ".to_string(),
                value: other.to_string(),
                reason: "unknown goal kind".to_string(),
            }),
        }
    }
}

/// A single exam attempt inside a module. `module_id` is a back-reference,
/// not ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamResult {
    pub result_id: String,
    pub grade: Option<f64>,
    pub date: Option<NaiveDate>,
    pub attempt: u32,
    pub module_id: String,
}

impl ExamResult {
    pub fn new(
        result_id: &str,
        grade: Option<f64>,
        date: Option<NaiveDate>,
        attempt: u32,
        module_id: &str,
    ) -> Self {
        Self {
            result_id: result_id.to_string(),
            grade,
            date,
            attempt,
            module_id: module_id.to_string(),
        }
    }
}

impl Canonical for ExamResult {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("leistung_id".into(), Value::String(self.result_id.clone()));
        map.insert(
            "note".into(),
            self.grade.map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("datum".into(), date_value(&self.date));
        map.insert("versuch".into(), Value::from(self.attempt));
        map.insert("modul_id".into(), Value::String(self.module_id.clone()));
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            result_id: require_string("pruefungsleistung", map, "leistung_id")?,
            grade: optional_f64("pruefungsleistung", map, "note")?,
            date: optional_date("pruefungsleistung", map, "datum")?,
            attempt: optional_u32("pruefungsleistung", map, "versuch")?,
            module_id: optional_string(map, "modul_id").unwrap_or_default(),
        })
    }
}

/// A study module with its exam results (append-only).
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub module_id: String,
    pub title: String,
    pub credits: u32,
    pub status: ModuleStatus,
    pub exam_results: Vec<ExamResult>,
}

impl Module {
    /// A freshly created module starts out open with no exam results.
    pub fn new(module_id: &str, title: &str, credits: u32) -> Self {
        Self::with_status(module_id, title, credits, ModuleStatus::Open)
    }

    pub fn with_status(module_id: &str, title: &str, credits: u32, status: ModuleStatus) -> Self {
        Self {
            module_id: module_id.to_string(),
            title: title.to_string(),
            credits,
            status,
            exam_results: Vec::new(),
        }
    }

    /// Appends a result. Results are never deduplicated or reordered; the
    /// last appended entry counts as the most recent attempt.
    pub fn add_exam_result(&mut self, result: ExamResult) {
        self.exam_results.push(result);
    }
}

impl Canonical for Module {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("modul_id".into(), Value::String(self.module_id.clone()));
        map.insert("titel".into(), Value::String(self.title.clone()));
        map.insert("ects_punkte".into(), Value::from(self.credits));
        map.insert("status".into(), Value::String(self.status.as_str().into()));
        map.insert(
            "pruefungsleistungen".into(),
            Value::Array(
                self.exam_results
                    .iter()
                    .map(|r| Value::Object(r.to_canonical()))
                    .collect(),
            ),
        );
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        let status = match optional_string(map, "status") {
            Some(raw) => raw
                .parse()
                .map_err(|e| malformed("modul", format!("{e}")))?,
            None => ModuleStatus::Open,
        };
        Ok(Self {
            module_id: require_string("modul", map, "modul_id")?,
            title: optional_string(map, "titel").unwrap_or_default(),
            credits: optional_u32("modul", map, "ects_punkte")?,
            status,
            exam_results: nested_list("modul", map, "pruefungsleistungen")?,
        })
    }
}

/// A semester within a program, owning its modules for persistence purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Semester {
    pub semester_id: String,
    pub number: u32,
    pub modules: Vec<Module>,
}

impl Canonical for Semester {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("semester_id".into(), Value::String(self.semester_id.clone()));
        map.insert("nummer".into(), Value::from(self.number));
        map.insert(
            "module".into(),
            Value::Array(
                self.modules
                    .iter()
                    .map(|m| Value::Object(m.to_canonical()))
                    .collect(),
            ),
        );
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            semester_id: require_string("semester", map, "semester_id")?,
            number: optional_u32("semester", map, "nummer")?,
            modules: nested_list("semester", map, "module")?,
        })
    }
}

/// A degree program with its ordered semesters.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub program_id: String,
    pub title: String,
    /// Planned duration in terms.
    pub duration: u32,
    /// Credit points required to finish the program.
    pub total_credits: u32,
    pub semesters: Vec<Semester>,
}

impl Program {
    /// The modules of the semester with the given sequence number, empty if
    /// no semester matches.
    pub fn modules_for_semester(&self, number: u32) -> &[Module] {
        self.semesters
            .iter()
            .find(|s| s.number == number)
            .map(|s| s.modules.as_slice())
            .unwrap_or(&[])
    }
}

impl Canonical for Program {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "studiengang_id".into(),
            Value::String(self.program_id.clone()),
        );
        map.insert("titel".into(), Value::String(self.title.clone()));
        map.insert("dauer".into(), Value::from(self.duration));
        map.insert("ects_gesamt".into(), Value::from(self.total_credits));
        map.insert(
            "semester_liste".into(),
            Value::Array(
                self.semesters
                    .iter()
                    .map(|s| Value::Object(s.to_canonical()))
                    .collect(),
            ),
        );
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            program_id: require_string("studiengang", map, "studiengang_id")?,
            title: optional_string(map, "titel").unwrap_or_default(),
            duration: optional_u32("studiengang", map, "dauer")?,
            total_credits: optional_u32("studiengang", map, "ects_gesamt")?,
            semesters: nested_list("studiengang", map, "semester_liste")?,
        })
    }
}

/// Enrollment of the student into a program. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub matriculation_no: String,
    pub status: EnrollmentStatus,
    pub enrolled_on: Option<NaiveDate>,
    pub planned_completion: Option<NaiveDate>,
}

impl Canonical for EnrollmentRecord {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "matrikelnummer".into(),
            Value::String(self.matriculation_no.clone()),
        );
        map.insert("status".into(), Value::String(self.status.as_str().into()));
        map.insert("einschreibungsdatum".into(), date_value(&self.enrolled_on));
        map.insert(
            "geplanter_abschluss".into(),
            date_value(&self.planned_completion),
        );
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        let status = require_string("einschreibung", map, "status")?
            .parse()
            .map_err(|e| malformed("einschreibung", format!("{e}")))?;
        Ok(Self {
            matriculation_no: require_string("einschreibung", map, "matrikelnummer")?,
            status,
            enrolled_on: optional_date("einschreibung", map, "einschreibungsdatum")?,
            planned_completion: optional_date("einschreibung", map, "geplanter_abschluss")?,
        })
    }
}

/// The one student this storage directory belongs to. Persisted as a
/// singleton collection holding the whole program aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    /// Week label (`"KW {n}"`) to logged study hours. Entries for the same
    /// week accumulate; nothing is ever overwritten.
    pub study_times: BTreeMap<String, Vec<u32>>,
    pub program: Option<Program>,
    pub enrollment: Option<EnrollmentRecord>,
}

impl Student {
    /// Assigns the program and creates an active enrollment record dated
    /// today, planned to complete three years later.
    pub fn enroll(&mut self, program: Program, matriculation_no: &str) {
        let today = Local::now().date_naive();
        self.enrollment = Some(EnrollmentRecord {
            matriculation_no: matriculation_no.to_string(),
            status: EnrollmentStatus::Active,
            enrolled_on: Some(today),
            planned_completion: today.checked_add_months(Months::new(36)),
        });
        self.program = Some(program);
    }
}

impl Canonical for Student {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("student_id".into(), Value::String(self.student_id.clone()));
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("email".into(), Value::String(self.email.clone()));
        map.insert("geburtsdatum".into(), date_value(&self.birth_date));
        let times: Map<String, Value> = self
            .study_times
            .iter()
            .map(|(week, hours)| {
                (
                    week.clone(),
                    Value::Array(hours.iter().copied().map(Value::from).collect()),
                )
            })
            .collect();
        map.insert("lernzeiten".into(), Value::Object(times));
        map.insert(
            "studiengang".into(),
            self.program
                .as_ref()
                .map(|p| Value::Object(p.to_canonical()))
                .unwrap_or(Value::Null),
        );
        map.insert(
            "einschreibung".into(),
            self.enrollment
                .as_ref()
                .map(|e| Value::Object(e.to_canonical()))
                .unwrap_or(Value::Null),
        );
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            student_id: require_string("student", map, "student_id")?,
            name: optional_string(map, "name").unwrap_or_default(),
            email: optional_string(map, "email").unwrap_or_default(),
            birth_date: optional_date("student", map, "geburtsdatum")?,
            study_times: study_times_from(map)?,
            program: nested_object("student", map, "studiengang")?,
            enrollment: nested_object("student", map, "einschreibung")?,
        })
    }
}

fn study_times_from(map: &Map<String, Value>) -> Result<BTreeMap<String, Vec<u32>>> {
    match map.get("lernzeiten") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(weeks)) => {
            let mut times = BTreeMap::new();
            for (week, entries) in weeks {
                let Value::Array(values) = entries else {
                    return Err(malformed(
                        "student",
                        format!("study times for '{week}' are not a list"),
                    ));
                };
                let hours = values
                    .iter()
                    .map(|v| {
                        v.as_u64().map(|n| n as u32).ok_or_else(|| {
                            malformed(
                                "student",
                                format!("study-time entry for '{week}' is not a number"),
                            )
                        })
                    })
                    .collect::<Result<Vec<u32>>>()?;
                times.insert(week.clone(), hours);
            }
            Ok(times)
        }
        Some(other) => Err(malformed(
            "student",
            format!("field 'lernzeiten' is not a mapping: {other}"),
        )),
    }
}

/// A personal study goal. `current` and `achieved` are derived values and
/// only trustworthy after `ProgressService::refresh_goals` has run.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyGoal {
    pub goal_id: String,
    pub kind: GoalKind,
    pub target: f64,
    pub current: f64,
    pub achieved: bool,
}

impl Canonical for StudyGoal {
    fn to_canonical(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ziel_id".into(), Value::String(self.goal_id.clone()));
        map.insert("typ".into(), Value::String(self.kind.as_str().into()));
        map.insert("ziel_wert".into(), Value::from(self.target));
        map.insert("aktueller_wert".into(), Value::from(self.current));
        map.insert("status".into(), Value::Bool(self.achieved));
        map
    }

    fn from_canonical(map: &Map<String, Value>) -> Result<Self> {
        let kind = require_string("studienziel", map, "typ")?
            .parse()
            .map_err(|e| malformed("studienziel", format!("{e}")))?;
        Ok(Self {
            goal_id: require_string("studienziel", map, "ziel_id")?,
            kind,
            target: optional_f64("studienziel", map, "ziel_wert")?.unwrap_or(0.0),
            current: optional_f64("studienziel", map, "aktueller_wert")?.unwrap_or(0.0),
            achieved: optional_bool("studienziel", map, "status")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> Module {
        let mut module = Module::with_status("Modul_1", "Mathematik für KI", 5, ModuleStatus::Active);
        module.add_exam_result(ExamResult::new(
            "L1",
            Some(2.3),
            NaiveDate::from_ymd_opt(2025, 3, 17),
            1,
            "Modul_1",
        ));
        module.add_exam_result(ExamResult::new("L2", None, None, 2, "Modul_1"));
        module
    }

    fn sample_student() -> Student {
        let mut study_times = BTreeMap::new();
        study_times.insert("KW 35".to_string(), vec![2, 1]);
        let mut student = Student {
            student_id: "1".to_string(),
            name: "Andreas Loidl".to_string(),
            email: "andreas.loidl@gmail.com".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1981, 8, 13),
            study_times,
            program: None,
            enrollment: None,
        };
        let program = Program {
            program_id: "AI_1".to_string(),
            title: "Angewandte Künstliche Intelligenz".to_string(),
            duration: 6,
            total_credits: 180,
            semesters: vec![Semester {
                semester_id: "2025SS".to_string(),
                number: 1,
                modules: vec![sample_module()],
            }],
        };
        student.enroll(program, "14128675");
        student
    }

    #[test]
    fn test_module_round_trip() {
        let module = sample_module();
        let rebuilt = Module::from_canonical(&module.to_canonical()).unwrap();
        assert_eq!(rebuilt, module);
    }

    #[test]
    fn test_module_round_trip_without_results() {
        let module = Module::new("Modul_9", "Statistik", 5);
        let rebuilt = Module::from_canonical(&module.to_canonical()).unwrap();
        assert_eq!(rebuilt, module);
        assert!(rebuilt.exam_results.is_empty());
    }

    #[test]
    fn test_student_round_trip_with_full_aggregate() {
        let student = sample_student();
        let rebuilt = Student::from_canonical(&student.to_canonical()).unwrap();
        assert_eq!(rebuilt, student);
    }

    #[test]
    fn test_student_round_trip_without_program() {
        let mut student = sample_student();
        student.program = None;
        student.enrollment = None;
        student.study_times.clear();
        let rebuilt = Student::from_canonical(&student.to_canonical()).unwrap();
        assert_eq!(rebuilt, student);
    }

    #[test]
    fn test_goal_round_trip() {
        let goal = StudyGoal {
            goal_id: "Ziel_Notenschnitt".to_string(),
            kind: GoalKind::GradeAverage,
            target: 2.0,
            current: 5.0,
            achieved: false,
        };
        let rebuilt = StudyGoal::from_canonical(&goal.to_canonical()).unwrap();
        assert_eq!(rebuilt, goal);
    }

    #[test]
    fn test_missing_identity_field_is_rejected() {
        let mut map = sample_module().to_canonical();
        map.remove("modul_id");
        let err = Module::from_canonical(&map).unwrap_err();
        assert!(matches!(err, StudyError::MalformedRecord { .. }));
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let mut map = sample_module().to_canonical();
        map.remove("pruefungsleistungen");
        map.remove("status");
        let module = Module::from_canonical(&map).unwrap();
        assert!(module.exam_results.is_empty());
        assert_eq!(module.status, ModuleStatus::Open);
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        assert!("bestanden".parse::<ModuleStatus>().is_err());
        assert_eq!("aktiv".parse::<ModuleStatus>().unwrap(), ModuleStatus::Active);
    }

    #[test]
    fn test_goal_kind_strings_round_trip() {
        for kind in [
            GoalKind::TotalCredits,
            GoalKind::SemesterCredits,
            GoalKind::GradeAverage,
            GoalKind::WeeklyStudyTime,
        ] {
            assert_eq!(kind.as_str().parse::<GoalKind>().unwrap(), kind);
        }
        assert!("Irgendwas".parse::<GoalKind>().is_err());
    }

    #[test]
    fn test_program_modules_for_semester() {
        let student = sample_student();
        let program = student.program.as_ref().unwrap();
        assert_eq!(program.modules_for_semester(1).len(), 1);
        assert!(program.modules_for_semester(4).is_empty());
    }
}
