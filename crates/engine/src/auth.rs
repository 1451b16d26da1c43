//! Pluggable authorization seam.
//!
//! The engine checks every mutating call against an [`Authorizer`] before
//! touching state. Hosts with their own access-control layer implement the
//! trait; [`RoleTable`] is a small reference implementation mirroring the
//! admin/operator/alerter/reserve split of the on-chain permission groups.

use std::collections::HashSet;

use alloy::primitives::Address;

use crate::{error::RatesError, types::Role};

/// Answers whether `caller` holds `role`. Must be cheap and side-effect free;
/// it runs on the rate-query-free mutation path only.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, caller: Address, role: Role) -> bool;
}

/// Static role assignments: one admin, operator and alerter sets, and an
/// optional reserve address allowed to record trades. Roles are strict; the
/// admin does not implicitly hold the operator or alerter role.
#[derive(Clone, Debug)]
pub struct RoleTable {
    admin: Address,
    operators: HashSet<Address>,
    alerters: HashSet<Address>,
    reserve: Option<Address>,
}

impl RoleTable {
    pub fn new(admin: Address) -> Self {
        Self { admin, operators: HashSet::new(), alerters: HashSet::new(), reserve: None }
    }

    pub fn admin(&self) -> Address { self.admin }

    pub fn add_operator(&mut self, caller: Address, operator: Address) -> Result<(), RatesError> {
        self.require_admin(caller)?;
        self.operators.insert(operator);
        Ok(())
    }

    pub fn remove_operator(
        &mut self,
        caller: Address,
        operator: Address,
    ) -> Result<(), RatesError> {
        self.require_admin(caller)?;
        self.operators.remove(&operator);
        Ok(())
    }

    pub fn add_alerter(&mut self, caller: Address, alerter: Address) -> Result<(), RatesError> {
        self.require_admin(caller)?;
        self.alerters.insert(alerter);
        Ok(())
    }

    pub fn remove_alerter(&mut self, caller: Address, alerter: Address) -> Result<(), RatesError> {
        self.require_admin(caller)?;
        self.alerters.remove(&alerter);
        Ok(())
    }

    /// Address trade recording is accepted from.
    pub fn set_reserve(&mut self, caller: Address, reserve: Address) -> Result<(), RatesError> {
        self.require_admin(caller)?;
        self.reserve = Some(reserve);
        Ok(())
    }

    fn require_admin(&self, caller: Address) -> Result<(), RatesError> {
        if caller == self.admin {
            Ok(())
        } else {
            Err(RatesError::Unauthorized { caller, role: Role::Admin })
        }
    }
}

impl Authorizer for RoleTable {
    fn is_authorized(&self, caller: Address, role: Role) -> bool {
        match role {
            Role::Admin => caller == self.admin,
            Role::Operator => self.operators.contains(&caller),
            Role::Alerter => self.alerters.contains(&caller),
            Role::Reserve => self.reserve == Some(caller),
        }
    }
}
