pub mod canonical;
pub mod model;

pub use canonical::Canonical;
pub use model::{
    EnrollmentRecord, EnrollmentStatus, ExamResult, GoalKind, Module, ModuleStatus, Program,
    Semester, Student, StudyGoal,
};
