//! Student persistence and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use mediator::{PersistenceError, UnitOfWork};

use crate::student::Student;

/// Changes staged during one unit of work, applied together on commit.
pub trait StudentTransaction: UnitOfWork {
    /// Stages an inserted or updated student.
    fn save(&self, student: Student);
}

/// Read access to students plus a way to open a unit of work.
#[async_trait]
pub trait StudentRepository: Send + Sync + 'static {
    type Transaction: StudentTransaction;

    /// Loads a committed student.
    async fn find(&self, id: AggregateId) -> Result<Option<Student>, PersistenceError>;

    /// Opens a unit of work.
    fn begin(&self) -> Self::Transaction;
}

#[derive(Debug, Default)]
struct InMemoryStudentState {
    students: HashMap<AggregateId, Student>,
    commit_count: u32,
    fail_on_commit: bool,
}

/// In-memory student repository for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudentRepository {
    state: Arc<RwLock<InMemoryStudentState>>,
}

impl InMemoryStudentRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures commits to fail until reset.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.write().fail_on_commit = fail;
    }

    /// Returns the number of commit attempts made so far.
    pub fn commit_count(&self) -> u32 {
        self.read().commit_count
    }

    /// Returns the number of committed students.
    pub fn student_count(&self) -> usize {
        self.read().students.len()
    }

    /// Returns a committed student without going through a unit of work.
    pub fn get(&self, id: AggregateId) -> Option<Student> {
        self.read().students.get(&id).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryStudentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryStudentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StudentRepository for InMemoryStudentRepository {
    type Transaction = InMemoryStudentTransaction;

    async fn find(&self, id: AggregateId) -> Result<Option<Student>, PersistenceError> {
        Ok(self.get(id))
    }

    fn begin(&self) -> InMemoryStudentTransaction {
        InMemoryStudentTransaction {
            repository: self.clone(),
            staged: Mutex::new(Vec::new()),
        }
    }
}

/// Unit of work over [`InMemoryStudentRepository`].
#[derive(Debug)]
pub struct InMemoryStudentTransaction {
    repository: InMemoryStudentRepository,
    staged: Mutex<Vec<Student>>,
}

impl StudentTransaction for InMemoryStudentTransaction {
    fn save(&self, student: Student) {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(student);
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStudentTransaction {
    async fn commit(&self) -> Result<(), PersistenceError> {
        let staged: Vec<Student> = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut state = self.repository.write();
        state.commit_count += 1;
        if state.fail_on_commit {
            return Err(PersistenceError("storage unavailable".to_string()));
        }
        for student in staged {
            state.students.insert(student.id(), student);
        }
        Ok(())
    }
}
