//! Student aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use mediator::DomainException;
use serde::{Deserialize, Serialize};

/// Entity name used to tag notifications about students.
pub const STUDENT_ENTITY: &str = "Student";

/// Longest accepted student name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// A student's enrollment in one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: AggregateId,
    pub enrolled_at: DateTime<Utc>,
}

/// Student aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    id: AggregateId,
    name: String,
    email: String,
    registered_at: DateTime<Utc>,
    enrollments: Vec<Enrollment>,
}

impl Student {
    /// Registers a new student. Input is validated by the command beforehand.
    pub fn register(id: AggregateId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            registered_at: Utc::now(),
            enrollments: Vec::new(),
        }
    }

    /// Enrolls the student in a course.
    ///
    /// # Errors
    ///
    /// Enrolling twice in the same course is an illegal state transition.
    pub fn enroll(&mut self, course_id: AggregateId) -> Result<Enrollment, DomainException> {
        if self.is_enrolled_in(course_id) {
            return Err(DomainException::new(format!(
                "Student {} is already enrolled in course {course_id}",
                self.id
            )));
        }
        let enrollment = Enrollment {
            course_id,
            enrolled_at: Utc::now(),
        };
        self.enrollments.push(enrollment);
        Ok(enrollment)
    }

    /// Returns true if the student is enrolled in `course_id`.
    pub fn is_enrolled_in(&self, course_id: AggregateId) -> bool {
        self.enrollments.iter().any(|e| e.course_id == course_id)
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student::register(AggregateId::new(), "Ada Lovelace", "ada@example.com")
    }

    #[test]
    fn test_register() {
        let student = student();
        assert_eq!(student.name(), "Ada Lovelace");
        assert_eq!(student.email(), "ada@example.com");
        assert!(student.enrollments().is_empty());
    }

    #[test]
    fn test_enroll() {
        let mut student = student();
        let course = AggregateId::new();

        let enrollment = student.enroll(course).unwrap();

        assert_eq!(enrollment.course_id, course);
        assert!(student.is_enrolled_in(course));
        assert_eq!(student.enrollments().len(), 1);
    }

    #[test]
    fn test_enroll_twice_is_domain_exception() {
        let mut student = student();
        let course = AggregateId::new();
        student.enroll(course).unwrap();

        let err = student.enroll(course).unwrap_err();

        assert!(err.message().contains("already enrolled"));
        assert_eq!(student.enrollments().len(), 1);
    }
}
