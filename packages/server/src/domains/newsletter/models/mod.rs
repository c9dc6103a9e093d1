pub mod newsletter;
pub mod newsletter_source;
pub mod user;
pub mod user_newsletter;
pub mod user_newsletter_source;

pub use newsletter::*;
pub use newsletter_source::*;
pub use user::*;
pub use user_newsletter::*;
pub use user_newsletter_source::*;

/// Result of an idempotent insert.
///
/// Unique-constraint conflicts are not errors: the existing row is returned
/// as `Duplicate`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    /// A new row was inserted.
    Created(T),
    /// A row with the same unique key already existed.
    Duplicate(T),
}

impl<T> InsertOutcome<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Created(row) | InsertOutcome::Duplicate(row) => row,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            InsertOutcome::Created(row) | InsertOutcome::Duplicate(row) => row,
        }
    }
}
