//! Single place where roles are turned into permissions.

use std::fmt;
use std::str::FromStr;

use crate::domain::DomainError;
use crate::middleware::auth::AuthContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Owner,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::Cashier => "cashier",
        }
    }

    /// Administrators and owners may discount and sell on credit.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            "cashier" => Ok(Role::Cashier),
            other => Err(DomainError::Validation(format!("Invalid role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Sell,
    ApplyDiscount,
    SellOnCredit,
    ViewCatalog,
    ManageCatalog,
    ManageClients,
    AdjustClientBalance,
    RemoveClients,
    ManageOwners,
    ManageSuppliers,
    ManageUsers,
    ManageBills,
    ManageFinance,
    ViewAllSales,
    /// Reading a record that belongs to an owner (`None` = shop stock).
    ReadOwned { owner_id: Option<i64> },
}

pub fn authorize(auth: &AuthContext, capability: Capability) -> Result<(), DomainError> {
    if allowed(auth.role, auth.owner_id, capability) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(denial_message(capability).to_string()))
    }
}

fn allowed(role: Role, own_owner_id: Option<i64>, capability: Capability) -> bool {
    use Capability::*;
    match capability {
        Sell | ViewCatalog | ManageClients => true,
        ApplyDiscount | SellOnCredit | ViewAllSales => role.is_elevated(),
        ReadOwned { owner_id } => match role {
            Role::Owner => owner_id.is_some() && owner_id == own_owner_id,
            Role::Admin | Role::Cashier => true,
        },
        ManageCatalog | AdjustClientBalance | RemoveClients | ManageOwners | ManageSuppliers | ManageUsers
        | ManageBills | ManageFinance => role == Role::Admin,
    }
}

fn denial_message(capability: Capability) -> &'static str {
    match capability {
        Capability::ApplyDiscount => "Only administrators and owners can apply discounts",
        Capability::SellOnCredit => "Only administrators and owners can sell on credit",
        Capability::ReadOwned { .. } => "You can only access your own records",
        _ => "Administrator role required",
    }
}

/// Owners only ever see their own products; other roles see everything.
/// An owner account without a linked owner sees nothing and is refused.
pub fn owner_scope(auth: &AuthContext) -> Result<Option<i64>, DomainError> {
    match (auth.role, auth.owner_id) {
        (Role::Owner, Some(owner_id)) => Ok(Some(owner_id)),
        (Role::Owner, None) => Err(DomainError::Forbidden("Owner account is not linked to an owner".into())),
        (Role::Admin | Role::Cashier, _) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role, owner_id: Option<i64>) -> AuthContext {
        AuthContext { user_id: 1, email: "x@shop.test".into(), role, owner_id }
    }

    #[test]
    fn cashiers_sell_but_do_not_discount() {
        let cashier = ctx(Role::Cashier, None);
        assert!(authorize(&cashier, Capability::Sell).is_ok());
        assert!(matches!(authorize(&cashier, Capability::ApplyDiscount), Err(DomainError::Forbidden(_))));
        assert!(matches!(authorize(&cashier, Capability::SellOnCredit), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn owners_are_elevated_but_not_admins() {
        let owner = ctx(Role::Owner, Some(3));
        assert!(authorize(&owner, Capability::SellOnCredit).is_ok());
        assert!(authorize(&owner, Capability::ManageBills).is_err());
        assert!(authorize(&owner, Capability::ReadOwned { owner_id: Some(3) }).is_ok());
        assert!(authorize(&owner, Capability::ReadOwned { owner_id: Some(4) }).is_err());
        assert!(authorize(&owner, Capability::ReadOwned { owner_id: None }).is_err());
        assert_eq!(owner_scope(&owner).unwrap(), Some(3));
    }

    #[test]
    fn admins_manage_everything() {
        let admin = ctx(Role::Admin, None);
        for cap in [
            Capability::ManageCatalog,
            Capability::ManageFinance,
            Capability::ManageUsers,
            Capability::AdjustClientBalance,
            Capability::ReadOwned { owner_id: Some(9) },
        ] {
            assert!(authorize(&admin, cap).is_ok(), "{cap:?}");
        }
        assert_eq!(owner_scope(&admin).unwrap(), None);
    }

    #[test]
    fn unlinked_owner_is_refused_a_scope() {
        let unlinked = ctx(Role::Owner, None);
        assert!(matches!(owner_scope(&unlinked), Err(DomainError::Forbidden(_))));
        assert!(authorize(&unlinked, Capability::ReadOwned { owner_id: None }).is_err());
        assert_eq!(owner_scope(&ctx(Role::Cashier, Some(2))).unwrap(), None);
    }

    #[test]
    fn parses_roles() {
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Owner);
        assert!("driver".parse::<Role>().is_err());
    }
}
