//! # Access Rules
//!
//! The actor model the engines receive from the (external) auth layer.
//!
//! ```text
//! HTTP layer: token → user → role + shop scope
//!       │
//!       ▼
//! Actor { user_id, name, role, visibility }   ← computed once per request
//!       │
//!       ├── can_access_shop(actor, shop)      ← data-dependent guard in engines
//!       └── Visibility → query filters        ← explicit, never ambient
//! ```
//!
//! Role gating itself ("may a cashier approve an opname?") stays outside the
//! core; what lives here are the checks that depend on data: shop scope and
//! the void time window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Role
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Owner,
    Admin,
    Manager,
    Cashier,
}

impl Role {
    /// Roles allowed to void outside the void window.
    pub fn bypasses_void_window(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Owner | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// The set of shops an actor may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// No shop restriction (super admins).
    All,
    /// Exactly these shop ids. An empty set sees nothing.
    Shops(BTreeSet<String>),
}

impl Visibility {
    pub fn shops<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Visibility::Shops(ids.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, shop_id: &str) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Shops(ids) => ids.contains(shop_id),
        }
    }

    /// Shop ids to filter on, or `None` when unrestricted.
    pub fn shop_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Visibility::All => None,
            Visibility::Shops(ids) => Some(ids),
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// A pre-authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    /// Display name, used in audit notes.
    pub name: String,
    pub role: Role,
    pub visibility: Visibility,
}

impl Actor {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        visibility: Visibility,
    ) -> Self {
        Actor {
            user_id: user_id.into(),
            name: name.into(),
            role,
            visibility,
        }
    }
}

/// Whether `actor` may operate on `shop_id`.
pub fn can_access_shop(actor: &Actor, shop_id: &str) -> bool {
    actor.visibility.includes(shop_id)
}

/// [`can_access_shop`] as a `Result`, for use with `?`.
pub fn ensure_shop_access(actor: &Actor, shop_id: &str) -> CoreResult<()> {
    if can_access_shop(actor, shop_id) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied {
            shop_id: shop_id.to_string(),
        })
    }
}

/// Rejects a void of a transaction older than `window_hours`, unless the
/// actor's role bypasses the window. A window too large for a `Duration`
/// never expires.
pub fn ensure_void_window(
    actor: &Actor,
    invoice_number: &str,
    transaction_date: DateTime<Utc>,
    now: DateTime<Utc>,
    window_hours: i64,
) -> CoreResult<()> {
    if actor.role.bypasses_void_window() {
        return Ok(());
    }
    let Some(window) = Duration::try_hours(window_hours) else {
        return Ok(());
    };
    if now - transaction_date > window {
        return Err(CoreError::VoidWindowExpired {
            invoice_number: invoice_number.to_string(),
            window_hours,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cashier_of(shops: &[&str]) -> Actor {
        Actor::new("u-1", "Sari", Role::Cashier, Visibility::shops(shops.iter().copied()))
    }

    #[test]
    fn test_shop_scope() {
        let actor = cashier_of(&["shop-a"]);
        assert!(can_access_shop(&actor, "shop-a"));
        assert!(!can_access_shop(&actor, "shop-b"));
        assert!(matches!(
            ensure_shop_access(&actor, "shop-b"),
            Err(CoreError::AccessDenied { .. })
        ));

        let admin = Actor::new("u-0", "Root", Role::SuperAdmin, Visibility::All);
        assert!(can_access_shop(&admin, "anything"));
    }

    #[test]
    fn test_empty_visibility_sees_nothing() {
        let actor = cashier_of(&[]);
        assert!(!can_access_shop(&actor, "shop-a"));
    }

    #[test]
    fn test_void_window_applies_to_cashier_only() {
        let now = Utc::now();
        let old = now - Duration::hours(25);
        let recent = now - Duration::hours(23);

        let cashier = cashier_of(&["shop-a"]);
        assert!(ensure_void_window(&cashier, "INV", recent, now, 24).is_ok());
        assert!(matches!(
            ensure_void_window(&cashier, "INV", old, now, 24),
            Err(CoreError::VoidWindowExpired { window_hours: 24, .. })
        ));

        let owner = Actor::new("u-2", "Budi", Role::Owner, Visibility::shops(["shop-a"]));
        assert!(ensure_void_window(&owner, "INV", old, now, 24).is_ok());
    }

    #[test]
    fn test_huge_void_window_never_expires() {
        let now = Utc::now();
        let ancient = now - Duration::days(3650);
        let cashier = cashier_of(&["shop-a"]);

        assert!(ensure_void_window(&cashier, "INV", ancient, now, i64::MAX).is_ok());
        assert!(ensure_void_window(&cashier, "INV", ancient, now, i64::MAX / 3600).is_ok());
    }
}
