//! Typed IDs for every persisted entity.

pub use super::id::{Id, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Account owning a forwarding inbox (rows owned by the auth provider).
pub struct User;

/// Newsletter publisher, keyed by sender email.
pub struct Source;

/// One received newsletter issue.
pub struct Issue;

/// User ↔ issue link.
pub struct UserIssue;

/// User ↔ publisher subscription link.
pub struct UserSubscription;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;
pub type NewsletterSourceId = Id<Source>;
pub type NewsletterId = Id<Issue>;
pub type UserNewsletterId = Id<UserIssue>;
pub type UserNewsletterSourceId = Id<UserSubscription>;
