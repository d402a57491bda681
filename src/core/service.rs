//! The progress service: sole owner of the loaded object graph and the only
//! writer back to the table store.
//!
//! Every mutation follows the same sequence: mutate the in-memory aggregate,
//! persist the student collection in full, return a freshly derived flat
//! module view. The flat view is a pure query over the semesters, so it can
//! never go stale.

use crate::core::table::TableStore;
use crate::domain::model::{
    ExamResult, GoalKind, Module, ModuleStatus, Program, Student, StudyGoal,
};
use crate::utils::error::{Result, StudyError};
use chrono::{Datelike, Local};

/// The label of the current calendar week, e.g. `"KW 35"`.
pub fn current_week_label() -> String {
    format!("KW {}", Local::now().date_naive().iso_week().week())
}

#[derive(Debug)]
pub struct ProgressService {
    store: TableStore,
    student: Student,
    goals: Vec<StudyGoal>,
}

impl ProgressService {
    /// Loads the student singleton and the study goals. All collections are
    /// read once; there is no reload path.
    pub fn load(store: TableStore) -> Result<Self> {
        let mut students: Vec<Student> = store.read("student")?;
        if students.is_empty() {
            return Err(StudyError::MalformedRecord {
                resource: "student".to_string(),
                detail: "collection is empty".to_string(),
            });
        }
        let student = students.swap_remove(0);
        if student.program.is_none() {
            return Err(StudyError::MalformedRecord {
                resource: "student".to_string(),
                detail: "student has no program assigned".to_string(),
            });
        }
        let goals = store.read("studienziele")?;

        tracing::info!(
            "loaded student '{}' with {} study goal(s)",
            student.name,
            goals.len()
        );
        Ok(Self {
            store,
            student,
            goals,
        })
    }

    pub fn student(&self) -> &Student {
        &self.student
    }

    pub fn goals(&self) -> &[StudyGoal] {
        &self.goals
    }

    /// Flat view of all modules across all semesters, in declaration order.
    pub fn modules(&self) -> Vec<Module> {
        self.student
            .program
            .as_ref()
            .map(|p| {
                p.semesters
                    .iter()
                    .flat_map(|s| s.modules.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn modules_for_semester(&self, number: u32) -> Vec<Module> {
        self.student
            .program
            .as_ref()
            .map(|p| p.modules_for_semester(number).to_vec())
            .unwrap_or_default()
    }

    /// Modules that have been started, i.e. whose status is not "offen".
    pub fn active_modules(&self) -> Vec<Module> {
        self.modules()
            .into_iter()
            .filter(|m| m.status != ModuleStatus::Open)
            .collect()
    }

    /// Status strings for presentation-layer option lists.
    pub fn status_options(&self) -> Vec<&'static str> {
        ModuleStatus::variants().iter().map(|s| s.as_str()).collect()
    }

    /// Creates a new open module. New modules always land in the first
    /// semester; there is no semester targeting.
    pub fn add_module(&mut self, module_id: &str, title: &str, credits: u32) -> Result<Vec<Module>> {
        let module = Module::new(module_id, title, credits);
        let program = self.program_mut()?;
        let first = program
            .semesters
            .first_mut()
            .ok_or_else(|| StudyError::MalformedRecord {
                resource: "studiengang".to_string(),
                detail: "program has no semesters".to_string(),
            })?;
        first.modules.push(module);

        tracing::debug!("added module '{}' to semester '{}'", module_id, first.semester_id);
        self.persist_student()?;
        Ok(self.modules())
    }

    pub fn change_module_status(
        &mut self,
        module_id: &str,
        new_status: ModuleStatus,
    ) -> Result<Vec<Module>> {
        let module = self.find_module_mut(module_id)?;
        module.status = new_status;

        tracing::debug!("module '{}' is now '{}'", module_id, new_status);
        self.persist_student()?;
        Ok(self.modules())
    }

    /// Appends an exam result to the module. Results are append-only; the
    /// last appended entry counts as the most recent attempt.
    pub fn record_exam_result(
        &mut self,
        result_id: &str,
        grade: Option<f64>,
        date: Option<chrono::NaiveDate>,
        attempt: u32,
        module_id: &str,
    ) -> Result<Vec<Module>> {
        let result = ExamResult::new(result_id, grade, date, attempt, module_id);
        let module = self.find_module_mut(module_id)?;
        module.add_exam_result(result);

        tracing::debug!("recorded result '{}' for module '{}'", result_id, module_id);
        self.persist_student()?;
        Ok(self.modules())
    }

    /// Appends logged hours to the week's study-time sequence, creating the
    /// week entry if needed. Repeated bookings for a week are additive.
    pub fn log_study_time(&mut self, week_label: &str, hours: u32) -> Result<&Student> {
        self.student
            .study_times
            .entry(week_label.to_string())
            .or_default()
            .push(hours);

        tracing::debug!("logged {} hour(s) for {}", hours, week_label);
        self.persist_student()?;
        Ok(&self.student)
    }

    /// Mean of the most recent grade of every started module, rounded to two
    /// decimal places. 0.0 when no grades qualify.
    pub fn average_grade(&self) -> f64 {
        let mut grades = Vec::new();
        for module in self.module_iter() {
            if module.status == ModuleStatus::Open {
                continue;
            }
            if let Some(last) = module.exam_results.last() {
                if let Some(grade) = last.grade {
                    grades.push(grade);
                }
            }
        }
        if grades.is_empty() {
            return 0.0;
        }
        let mean = grades.iter().sum::<f64>() / grades.len() as f64;
        (mean * 100.0).round() / 100.0
    }

    /// Sum of credit points of completed modules, optionally restricted to
    /// one semester (matched by id string equality).
    pub fn total_credits(&self, semester_id: Option<&str>) -> u32 {
        let Some(program) = &self.student.program else {
            return 0;
        };
        program
            .semesters
            .iter()
            .filter(|s| semester_id.is_none_or(|id| s.semester_id == id))
            .flat_map(|s| &s.modules)
            .filter(|m| m.status == ModuleStatus::Completed)
            .map(|m| m.credits)
            .sum()
    }

    /// Logged study hours of the current calendar week.
    pub fn weekly_study_time(&self) -> u32 {
        self.study_time_for_week(&current_week_label())
    }

    pub fn study_time_for_week(&self, week_label: &str) -> u32 {
        self.student
            .study_times
            .get(week_label)
            .map(|hours| hours.iter().sum())
            .unwrap_or(0)
    }

    /// Recomputes every goal's current value from the live metrics and sets
    /// its achieved flag. Must run before goal values are displayed; the
    /// persisted values are advisory only.
    pub fn refresh_goals(&mut self, active_semester_id: Option<&str>) -> &[StudyGoal] {
        let total_credits = self.total_credits(None) as f64;
        let semester_credits = match active_semester_id {
            Some(id) => self.total_credits(Some(id)) as f64,
            None => 0.0,
        };
        let weekly_hours = self.weekly_study_time() as f64;
        let average = self.average_grade();

        for goal in &mut self.goals {
            match goal.kind {
                GoalKind::TotalCredits => {
                    goal.current = total_credits;
                    goal.achieved = goal.current >= goal.target;
                }
                GoalKind::SemesterCredits => {
                    goal.current = semester_credits;
                    goal.achieved = goal.current >= goal.target;
                }
                GoalKind::WeeklyStudyTime => {
                    goal.current = weekly_hours;
                    goal.achieved = goal.current >= goal.target;
                }
                GoalKind::GradeAverage => {
                    goal.current = average;
                    // lower grades are better
                    goal.achieved = goal.current <= goal.target;
                }
            }
        }
        &self.goals
    }

    fn module_iter(&self) -> impl Iterator<Item = &Module> {
        self.student
            .program
            .iter()
            .flat_map(|p| &p.semesters)
            .flat_map(|s| &s.modules)
    }

    fn find_module_mut(&mut self, module_id: &str) -> Result<&mut Module> {
        let program = self.program_mut()?;
        for semester in &mut program.semesters {
            if let Some(module) = semester
                .modules
                .iter_mut()
                .find(|m| m.module_id == module_id)
            {
                return Ok(module);
            }
        }
        Err(StudyError::NotFound {
            entity: "Modul".to_string(),
            id: module_id.to_string(),
        })
    }

    fn program_mut(&mut self) -> Result<&mut Program> {
        self.student
            .program
            .as_mut()
            .ok_or_else(|| StudyError::MalformedRecord {
                resource: "student".to_string(),
                detail: "student has no program assigned".to_string(),
            })
    }

    fn persist_student(&self) -> Result<()> {
        self.store
            .write("student", std::slice::from_ref(&self.student))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{EnrollmentRecord, EnrollmentStatus, Program, Semester};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn graded_module(id: &str, grade: f64, status: ModuleStatus) -> Module {
        let mut module = Module::with_status(id, id, 5, status);
        module.add_exam_result(ExamResult::new(
            &format!("L_{id}"),
            Some(grade),
            NaiveDate::from_ymd_opt(2025, 6, 1),
            1,
            id,
        ));
        module
    }

    fn sample_student(modules_first: Vec<Module>, modules_second: Vec<Module>) -> Student {
        Student {
            student_id: "1".to_string(),
            name: "Andreas Loidl".to_string(),
            email: "andreas.loidl@gmail.com".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1981, 8, 13),
            study_times: BTreeMap::new(),
            program: Some(Program {
                program_id: "AI_1".to_string(),
                title: "Angewandte Künstliche Intelligenz".to_string(),
                duration: 6,
                total_credits: 180,
                semesters: vec![
                    Semester {
                        semester_id: "2025SS".to_string(),
                        number: 1,
                        modules: modules_first,
                    },
                    Semester {
                        semester_id: "2025WS".to_string(),
                        number: 2,
                        modules: modules_second,
                    },
                ],
            }),
            enrollment: Some(EnrollmentRecord {
                matriculation_no: "14128675".to_string(),
                status: EnrollmentStatus::Active,
                enrolled_on: NaiveDate::from_ymd_opt(2025, 3, 17),
                planned_completion: NaiveDate::from_ymd_opt(2028, 3, 17),
            }),
        }
    }

    fn service_with(
        modules_first: Vec<Module>,
        modules_second: Vec<Module>,
        goals: Vec<StudyGoal>,
    ) -> (TempDir, ProgressService) {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let student = sample_student(modules_first, modules_second);
        store.write("student", &[student]).unwrap();
        if goals.is_empty() {
            // the goal collection must exist even when empty is meant
            std::fs::write(dir.path().join("studienziele.csv"), "ziel_id,typ\n").unwrap();
        } else {
            store.write("studienziele", &goals).unwrap();
        }
        let service = ProgressService::load(TableStore::new(dir.path()).unwrap()).unwrap();
        (dir, service)
    }

    fn goal(id: &str, kind: GoalKind, target: f64) -> StudyGoal {
        StudyGoal {
            goal_id: id.to_string(),
            kind,
            target,
            current: 0.0,
            achieved: false,
        }
    }

    #[test]
    fn test_average_grade_over_last_results() {
        let (_dir, service) = service_with(
            vec![
                graded_module("Modul_1", 2.0, ModuleStatus::Completed),
                graded_module("Modul_2", 3.0, ModuleStatus::Active),
            ],
            vec![graded_module("Modul_3", 1.7, ModuleStatus::Completed)],
            vec![],
        );
        assert_eq!(service.average_grade(), 2.23);
    }

    #[test]
    fn test_average_grade_uses_last_appended_result() {
        let mut module = graded_module("Modul_1", 5.0, ModuleStatus::Completed);
        module.add_exam_result(ExamResult::new("L2", Some(2.0), None, 2, "Modul_1"));
        let (_dir, service) = service_with(vec![module], vec![], vec![]);
        assert_eq!(service.average_grade(), 2.0);
    }

    #[test]
    fn test_average_grade_without_qualifying_grades() {
        let (_dir, service) = service_with(
            vec![
                Module::new("Modul_1", "offenes Modul", 5),
                Module::with_status("Modul_2", "ohne Leistung", 5, ModuleStatus::Active),
            ],
            vec![],
            vec![],
        );
        assert_eq!(service.average_grade(), 0.0);
    }

    #[test]
    fn test_total_credits_counts_only_completed() {
        let (_dir, service) = service_with(
            vec![
                graded_module("Modul_1", 2.0, ModuleStatus::Completed),
                graded_module("Modul_2", 2.0, ModuleStatus::Completed),
                Module::new("Modul_3", "offen", 5),
            ],
            vec![graded_module("Modul_4", 2.0, ModuleStatus::Completed)],
            vec![],
        );
        assert_eq!(service.total_credits(None), 15);
        assert_eq!(service.total_credits(Some("2025SS")), 10);
        assert_eq!(service.total_credits(Some("2025WS")), 5);
        assert_eq!(service.total_credits(Some("2099XX")), 0);
    }

    #[test]
    fn test_add_module_lands_in_first_semester() {
        let (_dir, mut service) = service_with(vec![], vec![], vec![]);
        let view = service.add_module("Modul_7", "Deep Learning", 5).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].status, ModuleStatus::Open);
        assert_eq!(service.modules_for_semester(1).len(), 1);
        assert!(service.modules_for_semester(2).is_empty());
    }

    #[test]
    fn test_change_status_of_unknown_module_fails_without_side_effects() {
        let (_dir, mut service) = service_with(
            vec![Module::new("Modul_1", "Mathe", 5)],
            vec![],
            vec![],
        );
        let err = service
            .change_module_status("Modul_99", ModuleStatus::Active)
            .unwrap_err();
        assert!(matches!(err, StudyError::NotFound { id, .. } if id == "Modul_99"));
        assert!(service
            .modules()
            .iter()
            .all(|m| m.status == ModuleStatus::Open));
    }

    #[test]
    fn test_record_exam_result_appends() {
        let (_dir, mut service) = service_with(
            vec![graded_module("Modul_1", 3.0, ModuleStatus::Active)],
            vec![],
            vec![],
        );
        let view = service
            .record_exam_result("L9", Some(1.3), None, 2, "Modul_1")
            .unwrap();
        assert_eq!(view[0].exam_results.len(), 2);
        assert_eq!(view[0].exam_results.last().unwrap().grade, Some(1.3));

        let err = service
            .record_exam_result("L10", Some(1.0), None, 1, "Modul_99")
            .unwrap_err();
        assert!(matches!(err, StudyError::NotFound { .. }));
    }

    #[test]
    fn test_log_study_time_accumulates() {
        let (_dir, mut service) = service_with(vec![], vec![], vec![]);
        service.log_study_time("KW 35", 2).unwrap();
        service.log_study_time("KW 35", 1).unwrap();
        assert_eq!(service.study_time_for_week("KW 35"), 3);
        assert_eq!(service.study_time_for_week("KW 36"), 0);
        assert_eq!(service.student().study_times["KW 35"], vec![2, 1]);
    }

    #[test]
    fn test_refresh_goals_total_credits() {
        let (_dir, mut service) = service_with(
            vec![
                graded_module("Modul_1", 2.0, ModuleStatus::Completed),
                graded_module("Modul_2", 2.0, ModuleStatus::Completed),
            ],
            vec![graded_module("Modul_3", 2.0, ModuleStatus::Completed)],
            vec![goal("Ziel_ECTS_Gesamt", GoalKind::TotalCredits, 180.0)],
        );

        let goals = service.refresh_goals(None);
        assert_eq!(goals[0].current, 15.0);
        assert!(!goals[0].achieved);

        // completing enough further credits flips the goal
        service.add_module("Modul_XL", "Projektarbeit", 165).unwrap();
        service
            .change_module_status("Modul_XL", ModuleStatus::Completed)
            .unwrap();
        let goals = service.refresh_goals(None);
        assert_eq!(goals[0].current, 180.0);
        assert!(goals[0].achieved);
    }

    #[test]
    fn test_refresh_goals_per_kind_comparisons() {
        let (_dir, mut service) = service_with(
            vec![graded_module("Modul_1", 1.7, ModuleStatus::Completed)],
            vec![],
            vec![
                goal("Ziel_Semester", GoalKind::SemesterCredits, 5.0),
                goal("Ziel_Notenschnitt", GoalKind::GradeAverage, 2.0),
                goal("Ziel_Lernstunden", GoalKind::WeeklyStudyTime, 4.0),
            ],
        );

        let goals = service.refresh_goals(Some("2025SS")).to_vec();
        assert_eq!(goals[0].current, 5.0);
        assert!(goals[0].achieved);
        // grade average: lower is better, 1.7 <= 2.0
        assert_eq!(goals[1].current, 1.7);
        assert!(goals[1].achieved);
        assert!(!goals[2].achieved);

        // without an active semester the semester metric is 0
        let goals = service.refresh_goals(None);
        assert_eq!(goals[0].current, 0.0);
        assert!(!goals[0].achieved);
    }

    #[test]
    fn test_active_modules_and_status_options() {
        let (_dir, service) = service_with(
            vec![
                Module::new("Modul_1", "offen", 5),
                graded_module("Modul_2", 2.0, ModuleStatus::Active),
            ],
            vec![],
            vec![],
        );
        let active = service.active_modules();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].module_id, "Modul_2");
        assert_eq!(
            service.status_options(),
            vec!["offen", "aktiv", "abgeschlossen"]
        );
    }

    #[test]
    fn test_load_rejects_student_without_program() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut student = sample_student(vec![], vec![]);
        student.program = None;
        store.write("student", &[student]).unwrap();
        store
            .write::<StudyGoal>("studienziele", &[goal("Z", GoalKind::TotalCredits, 180.0)])
            .unwrap();

        let err = ProgressService::load(store).unwrap_err();
        assert!(matches!(err, StudyError::MalformedRecord { .. }));
    }
}
