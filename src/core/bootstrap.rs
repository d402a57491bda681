//! First-run seeding of the five entity collections.

use crate::core::table::TableStore;
use crate::domain::model::{
    GoalKind, Module, ModuleStatus, Program, Semester, Student, StudyGoal,
};
use crate::utils::error::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;

const REQUIRED_TABLES: [&str; 5] = ["module", "semester", "studiengang", "student", "studienziele"];

/// Seeds the initial dataset unless all five collections already exist.
/// Returns `true` when seeding happened.
pub fn ensure_seeded(store: &TableStore) -> Result<bool> {
    if REQUIRED_TABLES.iter().all(|name| store.exists(name)) {
        return Ok(false);
    }
    tracing::info!("first run detected, seeding study data");

    let modules = vec![
        Module::with_status("Modul_1", "Mathematik für KI", 5, ModuleStatus::Active),
        Module::with_status("Modul_2", "Programmieren in Python", 5, ModuleStatus::Completed),
        Module::new("Modul_3", "Machine Learning Grundlagen", 5),
        Module::new("Modul_4", "Datenstrukturen & Algorithmen", 5),
        Module::new("Modul_5", "Statistik für Data Science", 5),
        Module::new("Modul_6", "Deep Learning", 5),
    ];
    let semesters = vec![
        Semester {
            semester_id: "2025SS".to_string(),
            number: 1,
            modules: modules[0..2].to_vec(),
        },
        Semester {
            semester_id: "2025WS".to_string(),
            number: 2,
            modules: modules[2..4].to_vec(),
        },
        Semester {
            semester_id: "2026SS".to_string(),
            number: 3,
            modules: modules[4..6].to_vec(),
        },
    ];
    store.write("module", &modules)?;
    store.write("semester", &semesters)?;

    let program = Program {
        program_id: "AI_1".to_string(),
        title: "Angewandte Künstliche Intelligenz".to_string(),
        duration: 6,
        total_credits: 180,
        semesters,
    };
    store.write("studiengang", std::slice::from_ref(&program))?;

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
    student.enroll(program, "14128675");
    store.write("student", std::slice::from_ref(&student))?;

    let goals = vec![
        goal("Ziel_ECTS_Gesamt", GoalKind::TotalCredits, 180.0, 0.0),
        goal("Ziel_ECTS_Semester", GoalKind::SemesterCredits, 30.0, 0.0),
        goal("Ziel_Notenschnitt", GoalKind::GradeAverage, 2.0, 5.0),
        goal("Ziel_Lernstunden", GoalKind::WeeklyStudyTime, 4.0, 0.0),
    ];
    store.write("studienziele", &goals)?;

    Ok(true)
}

fn goal(id: &str, kind: GoalKind, target: f64, current: f64) -> StudyGoal {
    StudyGoal {
        goal_id: id.to_string(),
        kind,
        target,
        current,
        achieved: false,
    }
}
