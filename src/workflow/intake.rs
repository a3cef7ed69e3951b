//! Source intake variants
//!
//! Curators always propose sources for themselves; managers may hand a new
//! source to any curator. The variant is picked from the caller's role.

use crate::auth::Actor;
use crate::error::AppError;
use uuid::Uuid;

pub trait SourceIntake: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the intake accepts an explicit owner
    fn accepts_owner(&self) -> bool;

    /// Owner of a source proposed by `actor`, given the owner requested in the form
    fn resolve_owner(&self, actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppError>;
}

pub struct CuratorIntake;

impl SourceIntake for CuratorIntake {
    fn name(&self) -> &'static str {
        "curator"
    }

    fn accepts_owner(&self) -> bool {
        false
    }

    fn resolve_owner(&self, actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        match requested {
            Some(owner) if owner != actor.id => Err(AppError::Forbidden(
                "Only managers can propose sources for other curators".to_string(),
            )),
            _ => Ok(actor.id),
        }
    }
}

pub struct ManagerIntake;

impl SourceIntake for ManagerIntake {
    fn name(&self) -> &'static str {
        "manager"
    }

    fn accepts_owner(&self) -> bool {
        true
    }

    fn resolve_owner(&self, actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        Ok(requested.unwrap_or(actor.id))
    }
}

/// Intake variant the caller is entitled to
pub fn intake_for(actor: &Actor) -> &'static dyn SourceIntake {
    if actor.role.can_manage_sources() {
        &ManagerIntake
    } else {
        &CuratorIntake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    #[test]
    fn test_variant_selection() {
        let curator = Actor::new(Uuid::new_v4(), Role::Curator);
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        assert_eq!(intake_for(&curator).name(), "curator");
        assert!(!intake_for(&curator).accepts_owner());
        assert_eq!(intake_for(&manager).name(), "manager");
        assert!(intake_for(&manager).accepts_owner());
    }

    #[test]
    fn test_curator_owns_own_sources() {
        let curator = Actor::new(Uuid::new_v4(), Role::Curator);
        let intake = intake_for(&curator);
        assert_eq!(intake.resolve_owner(&curator, None).unwrap(), curator.id);
        assert_eq!(intake.resolve_owner(&curator, Some(curator.id)).unwrap(), curator.id);
        assert!(matches!(
            intake.resolve_owner(&curator, Some(Uuid::new_v4())),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_manager_assigns_owner() {
        let manager = Actor::new(Uuid::new_v4(), Role::Admin);
        let curator = Uuid::new_v4();
        let intake = intake_for(&manager);
        assert_eq!(intake.resolve_owner(&manager, Some(curator)).unwrap(), curator);
        assert_eq!(intake.resolve_owner(&manager, None).unwrap(), manager.id);
    }
}
