use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ── Entity types ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    Admin,
}

/// Task status is a free-form field: any status may be set to any other.
/// Completed is not terminal — a completed task can be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique among users — enforced at registration, not on later edits.
    pub username: String,
    pub role: Role,
    /// Registration instant. Listings and assignment tie-breaking order
    /// users by (created_at, id).
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Relative effort, always within 1..=5.
    pub complexity: u8,
    pub status: TaskStatus,
    /// Always Some once creation succeeds. Unconditional user deletion can
    /// leave it pointing at a user that no longer exists.
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The resolved identity behind a request. Handed to apply() explicitly so
/// tests (and a future real auth layer) can substitute any caller.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

// ── Commands (HTTP layer → board) ─────────────────────────────

/// A command is something a caller wants to happen. The board validates
/// it, applies it, and returns an Event (or an error).
#[derive(Debug, Clone)]
pub enum Command {
    CreateUser {
        username: String,
        role: Role,
    },
    UpdateUser {
        user_id: Uuid,
        username: String,
        role: Role,
    },
    DeleteUser {
        user_id: Uuid,
    },
    CreateTask {
        title: String,
        description: Option<String>,
        complexity: u8,
        /// None → auto-assignment to the least-loaded employee.
        assigned_to: Option<Uuid>,
    },
    /// Full update of the descriptive fields. Status and assignee are
    /// untouched, and no role gate applies.
    UpdateTask {
        task_id: Uuid,
        title: String,
        description: Option<String>,
        complexity: u8,
    },
    /// Self-service status change by the assigned employee.
    UpdateStatus {
        task_id: Uuid,
        status: TaskStatus,
    },
    /// Manager status change, no ownership check.
    ForceStatus {
        task_id: Uuid,
        status: TaskStatus,
    },
    Reassign {
        task_id: Uuid,
        user_id: Uuid,
    },
    DeleteTask {
        task_id: Uuid,
    },
}

// ── Events (board → persistence) ──────────────────────────────

/// An event is what actually happened. It carries the revision it was
/// applied at and enough state for the save file to rewrite exactly the
/// affected row.
#[derive(Debug, Clone)]
pub enum Event {
    UserCreated { revision: u64, user: User },
    UserUpdated { revision: u64, user: User },
    UserDeleted { revision: u64, user_id: Uuid },
    TaskCreated { revision: u64, task: Task },
    TaskUpdated { revision: u64, task: Task },
    TaskDeleted { revision: u64, task_id: Uuid },
}

impl Event {
    /// The revision this event was applied at.
    pub fn revision(&self) -> u64 {
        match self {
            Event::UserCreated { revision, .. }
            | Event::UserUpdated { revision, .. }
            | Event::UserDeleted { revision, .. }
            | Event::TaskCreated { revision, .. }
            | Event::TaskUpdated { revision, .. }
            | Event::TaskDeleted { revision, .. } => *revision,
        }
    }

    /// The task carried by task create/update events.
    pub fn into_task(self) -> Option<Task> {
        match self {
            Event::TaskCreated { task, .. } | Event::TaskUpdated { task, .. } => Some(task),
            _ => None,
        }
    }

    /// The user carried by user create/update events.
    pub fn into_user(self) -> Option<User> {
        match self {
            Event::UserCreated { user, .. } | Event::UserUpdated { user, .. } => Some(user),
            _ => None,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Role or ownership gate failed.
    Forbidden,
    TaskNotFound,
    UserNotFound,
    DuplicateUsername,
    /// Auto-assignment found no user with role employee.
    NoEligibleAssignee,
    /// Complexity outside 1..=5.
    InvalidComplexity,
}

// ── The Board ──────────────────────────────────────────────────

/// The authoritative state: users, tasks, and a revision counter. Lives in
/// memory, loaded from redb on boot. All mutations go through apply(),
/// which validates, mutates, and returns an Event for the save-file flush.
pub struct Board {
    pub users: HashMap<Uuid, User>,
    pub tasks: HashMap<Uuid, Task>,
    /// Bumped once per applied mutation, persisted with every flush.
    pub revision: u64,
}

impl Board {
    pub fn new() -> Self {
        Board {
            users: HashMap::new(),
            tasks: HashMap::new(),
            revision: 0,
        }
    }

    /// Apply a command on behalf of a caller. Returns the resulting Event
    /// on success. This is THE mutation codepath — every state change goes
    /// through here, so a failed command never leaves partial state.
    pub fn apply(&mut self, cmd: Command, caller: Caller) -> Result<Event, BoardError> {
        match cmd {
            Command::CreateUser { username, role } => {
                // Registration is open to anyone; only the username must
                // be free. Edits later on do not re-check uniqueness.
                if self.user_by_username(&username).is_some() {
                    return Err(BoardError::DuplicateUsername);
                }

                let user = User {
                    id: Uuid::new_v4(),
                    username,
                    role,
                    created_at: Utc::now(),
                };

                self.revision += 1;
                let event = Event::UserCreated {
                    revision: self.revision,
                    user: user.clone(),
                };
                self.users.insert(user.id, user);
                Ok(event)
            }

            Command::UpdateUser { user_id, username, role } => {
                let user = self.users.get_mut(&user_id).ok_or(BoardError::UserNotFound)?;
                user.username = username;
                user.role = role;
                let user = user.clone();

                self.revision += 1;
                Ok(Event::UserUpdated {
                    revision: self.revision,
                    user,
                })
            }

            Command::DeleteUser { user_id } => {
                // Unconditional: tasks assigned to this user keep their
                // (now dangling) assignee.
                if self.users.remove(&user_id).is_none() {
                    return Err(BoardError::UserNotFound);
                }

                self.revision += 1;
                Ok(Event::UserDeleted {
                    revision: self.revision,
                    user_id,
                })
            }

            Command::CreateTask { title, description, complexity, assigned_to } => {
                if caller.role != Role::Manager {
                    return Err(BoardError::Forbidden);
                }
                validate_complexity(complexity)?;

                // An explicit assignee is taken as-is — no existence or
                // role check. Only the auto path screens candidates.
                let assigned_to = match assigned_to {
                    Some(user_id) => user_id,
                    None => self
                        .least_loaded_employee()
                        .ok_or(BoardError::NoEligibleAssignee)?,
                };

                let task = Task {
                    id: Uuid::new_v4(),
                    title,
                    description,
                    complexity,
                    status: TaskStatus::Open,
                    assigned_to: Some(assigned_to),
                    created_at: Utc::now(),
                };

                self.revision += 1;
                let event = Event::TaskCreated {
                    revision: self.revision,
                    task: task.clone(),
                };
                self.tasks.insert(task.id, task);
                Ok(event)
            }

            Command::UpdateTask { task_id, title, description, complexity } => {
                validate_complexity(complexity)?;

                let task = self.tasks.get_mut(&task_id).ok_or(BoardError::TaskNotFound)?;
                task.title = title;
                task.description = description;
                task.complexity = complexity;
                let task = task.clone();

                self.revision += 1;
                Ok(Event::TaskUpdated {
                    revision: self.revision,
                    task,
                })
            }

            Command::UpdateStatus { task_id, status } => {
                // Role gate first: a non-employee probing this operation
                // gets Forbidden even for a missing task.
                if caller.role != Role::Employee {
                    return Err(BoardError::Forbidden);
                }

                let task = self.tasks.get_mut(&task_id).ok_or(BoardError::TaskNotFound)?;
                if task.assigned_to != Some(caller.id) {
                    return Err(BoardError::Forbidden);
                }

                task.status = status;
                let task = task.clone();

                self.revision += 1;
                Ok(Event::TaskUpdated {
                    revision: self.revision,
                    task,
                })
            }

            Command::ForceStatus { task_id, status } => {
                if caller.role != Role::Manager {
                    return Err(BoardError::Forbidden);
                }

                let task = self.tasks.get_mut(&task_id).ok_or(BoardError::TaskNotFound)?;
                task.status = status;
                let task = task.clone();

                self.revision += 1;
                Ok(Event::TaskUpdated {
                    revision: self.revision,
                    task,
                })
            }

            Command::Reassign { task_id, user_id } => {
                if caller.role != Role::Manager {
                    return Err(BoardError::Forbidden);
                }
                // Unlike creation, reassignment checks that the target
                // exists. Any role may be the target.
                if !self.users.contains_key(&user_id) {
                    return Err(BoardError::UserNotFound);
                }

                let task = self.tasks.get_mut(&task_id).ok_or(BoardError::TaskNotFound)?;
                task.assigned_to = Some(user_id);
                let task = task.clone();

                self.revision += 1;
                Ok(Event::TaskUpdated {
                    revision: self.revision,
                    task,
                })
            }

            Command::DeleteTask { task_id } => {
                if caller.role != Role::Manager {
                    return Err(BoardError::Forbidden);
                }
                if self.tasks.remove(&task_id).is_none() {
                    return Err(BoardError::TaskNotFound);
                }

                self.revision += 1;
                Ok(Event::TaskDeleted {
                    revision: self.revision,
                    task_id,
                })
            }
        }
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    /// Look up a user by username (linear scan — fine at this scale).
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    /// All users in registration order.
    pub fn users_sorted(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        users
    }

    /// All tasks, newest first.
    pub fn tasks_sorted(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Tasks assigned to one user, newest first.
    pub fn tasks_for(&self, user_id: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.assigned_to == Some(user_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Candidates for auto-assignment: users with role employee, in
    /// registration order. This ordering is what makes workload ties
    /// deterministic.
    pub fn eligible_employees(&self) -> Vec<&User> {
        let mut employees: Vec<&User> = self
            .users
            .values()
            .filter(|u| u.role == Role::Employee)
            .collect();
        employees.sort_by_key(|u| (u.created_at, u.id));
        employees
    }

    /// Load score for one user: sum of complexity over the user's
    /// non-completed tasks, plus the count of those tasks. The count term
    /// weighs task volume in addition to effort, so many trivial tasks
    /// still register. Completed tasks never contribute.
    pub fn workload(&self, user_id: Uuid) -> u32 {
        self.tasks
            .values()
            .filter(|t| t.assigned_to == Some(user_id) && t.status != TaskStatus::Completed)
            .map(|t| u32::from(t.complexity) + 1)
            .sum()
    }

    /// Assignment policy: the eligible employee with the minimum workload
    /// score. Ties go to the earliest-registered candidate (min_by_key
    /// keeps the first minimum). None when no employees exist.
    pub fn least_loaded_employee(&self) -> Option<Uuid> {
        self.eligible_employees()
            .into_iter()
            .min_by_key(|u| self.workload(u.id))
            .map(|u| u.id)
    }
}

// ── Validation helpers ─────────────────────────────────────────

fn validate_complexity(complexity: u8) -> Result<(), BoardError> {
    if !(1..=5).contains(&complexity) {
        return Err(BoardError::InvalidComplexity);
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────
