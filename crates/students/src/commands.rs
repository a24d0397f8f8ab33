//! Student commands and their validators.

use std::sync::LazyLock;

use common::{AggregateId, MessageHeader};
use mediator::{Command, ValidationResult, Validator};

use crate::student::MAX_NAME_LENGTH;

/// Registers a new student.
#[derive(Debug, Clone)]
pub struct RegisterStudent {
    pub header: MessageHeader,
    pub student_id: AggregateId,
    pub name: String,
    pub email: String,
}

impl RegisterStudent {
    pub fn new(student_id: AggregateId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::command(),
            student_id,
            name: name.into(),
            email: email.into(),
        }
    }
}

static REGISTER_RULES: LazyLock<Validator<RegisterStudent>> = LazyLock::new(|| {
    Validator::new()
        .rule(
            "StudentId",
            |c: &RegisterStudent| !c.student_id.is_nil(),
            "Student id is required",
        )
        .rule(
            "Name",
            |c: &RegisterStudent| !c.name.trim().is_empty(),
            "Name is required",
        )
        .rule(
            "Name",
            |c: &RegisterStudent| c.name.chars().count() <= MAX_NAME_LENGTH,
            format!("Name must not exceed {MAX_NAME_LENGTH} characters"),
        )
        .rule(
            "Email",
            |c: &RegisterStudent| !c.email.trim().is_empty(),
            "Email is required",
        )
        .rule(
            "Email",
            |c: &RegisterStudent| c.email.contains('@'),
            "Email is invalid",
        )
});

impl Command for RegisterStudent {
    type Output = AggregateId;

    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }

    fn validate(&self) -> ValidationResult {
        REGISTER_RULES.validate(self)
    }
}

/// Enrolls an existing student in a course.
#[derive(Debug, Clone)]
pub struct EnrollStudent {
    pub header: MessageHeader,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
}

impl EnrollStudent {
    pub fn new(student_id: AggregateId, course_id: AggregateId) -> Self {
        Self {
            header: MessageHeader::command(),
            student_id,
            course_id,
        }
    }
}

static ENROLL_RULES: LazyLock<Validator<EnrollStudent>> = LazyLock::new(|| {
    Validator::new()
        .rule(
            "StudentId",
            |c: &EnrollStudent| !c.student_id.is_nil(),
            "Student id is required",
        )
        .rule(
            "CourseId",
            |c: &EnrollStudent| !c.course_id.is_nil(),
            "Course id is required",
        )
});

impl Command for EnrollStudent {
    type Output = ();

    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }

    fn validate(&self) -> ValidationResult {
        ENROLL_RULES.validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_registration() {
        let cmd = RegisterStudent::new(AggregateId::new(), "Ada", "ada@example.com");
        assert!(cmd.validate().is_valid());
    }

    #[test]
    fn test_empty_name_reports_only_required() {
        let cmd = RegisterStudent::new(AggregateId::new(), "", "ada@example.com");
        assert_eq!(cmd.validate().messages(), vec!["Name is required"]);
    }

    #[test]
    fn test_name_too_long() {
        let cmd = RegisterStudent::new(AggregateId::new(), "a".repeat(101), "ada@example.com");
        assert_eq!(
            cmd.validate().messages(),
            vec!["Name must not exceed 100 characters"]
        );

        let cmd = RegisterStudent::new(AggregateId::new(), "a".repeat(100), "ada@example.com");
        assert!(cmd.validate().is_valid());
    }

    #[test]
    fn test_email_rules() {
        let missing = RegisterStudent::new(AggregateId::new(), "Ada", " ");
        assert_eq!(missing.validate().messages(), vec!["Email is required"]);

        let malformed = RegisterStudent::new(AggregateId::new(), "Ada", "ada.example.com");
        assert_eq!(malformed.validate().messages(), vec!["Email is invalid"]);
    }

    #[test]
    fn test_enroll_requires_both_ids() {
        let cmd = EnrollStudent::new(AggregateId::nil(), AggregateId::nil());
        assert_eq!(
            cmd.validate().messages(),
            vec!["Student id is required", "Course id is required"]
        );
        assert!(
            EnrollStudent::new(AggregateId::new(), AggregateId::new())
                .validate()
                .is_valid()
        );
    }
}
