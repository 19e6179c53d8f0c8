//! Hierarchy policy: which node may hang under which parent, and with what attributes.
//!
//! Everything here is pure. Callers fetch the prospective parent and its current
//! children from the store and hand them in.

use serde_json::Value;
use tracing::trace;

use crate::domain::{DomainError, DomainResult, Node, NodeAttributes, NodeId, NodeKind, NodePayload};

/// Upper bound on tenants sharing one tenancy period.
pub const MAX_TENANTS_PER_PERIOD: usize = 4;

/// Allowed parent type for every child type; `None` marks a root-only type.
const ALLOWED_PARENTS: [(NodeKind, Option<NodeKind>); 5] = [
    (NodeKind::Corporation, None),
    (NodeKind::Building, Some(NodeKind::Corporation)),
    (NodeKind::Property, Some(NodeKind::Building)),
    (NodeKind::TenancyPeriod, Some(NodeKind::Property)),
    (NodeKind::Tenant, Some(NodeKind::TenancyPeriod)),
];

/// How a node is being placed under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A brand new node; required attributes are enforced.
    Create,
    /// An existing node moving to a new parent.
    Reparent {
        node: NodeId,
        current_parent: Option<NodeId>,
    },
}

impl Admission {
    pub fn is_create(&self) -> bool {
        matches!(self, Admission::Create)
    }

    fn subject(&self) -> Option<NodeId> {
        match self {
            Admission::Create => None,
            Admission::Reparent { node, .. } => Some(*node),
        }
    }
}

/// Look up the single parent type a child type may attach to.
pub fn allowed_parent(child: NodeKind) -> Option<NodeKind> {
    ALLOWED_PARENTS
        .iter()
        .find(|(kind, _)| *kind == child)
        .and_then(|(_, parent)| *parent)
}

/// Reject any parent type other than the one the table allows (including none vs. some).
pub fn check_parent_allowed(child: NodeKind, parent: Option<NodeKind>) -> DomainResult<()> {
    if allowed_parent(child) == parent {
        Ok(())
    } else {
        Err(DomainError::InvalidParent { child, parent })
    }
}

/// Type-specific business rules for placing a node of `kind` under `parent`.
///
/// `siblings` are the current children of `parent` (possibly including the node itself
/// when it is re-parented under the parent it already has).
pub fn check_type_constraints(
    kind: NodeKind,
    parent: Option<&Node>,
    siblings: &[Node],
    attributes: &NodeAttributes,
    admission: Admission,
) -> DomainResult<()> {
    trace!(?kind, ?admission, siblings = siblings.len(), "check_type_constraints");
    match kind {
        NodeKind::Corporation => Ok(()),
        NodeKind::Building => check_building(attributes, admission),
        NodeKind::Property => check_property(attributes, admission),
        NodeKind::TenancyPeriod => check_tenancy_period(siblings, attributes, admission),
        NodeKind::Tenant => check_tenant(parent, siblings, attributes, admission),
    }
}

fn check_building(attributes: &NodeAttributes, admission: Admission) -> DomainResult<()> {
    let has_zip = attributes
        .zip_code
        .as_deref()
        .is_some_and(|z| !z.trim().is_empty());
    if admission.is_create() && !has_zip {
        return Err(DomainError::constraint(
            NodeKind::Building,
            "Building type must have a zip_code",
        ));
    }
    Ok(())
}

fn check_property(attributes: &NodeAttributes, admission: Admission) -> DomainResult<()> {
    match attributes.monthly_rent {
        None if admission.is_create() => Err(DomainError::constraint(
            NodeKind::Property,
            "Property type must have a monthly_rent",
        )),
        Some(rent) if rent.is_sign_negative() && !rent.is_zero() => Err(DomainError::constraint(
            NodeKind::Property,
            "Property monthly_rent must not be negative",
        )),
        _ => Ok(()),
    }
}

fn check_active_is_boolean(kind: NodeKind, attributes: &NodeAttributes) -> DomainResult<()> {
    match &attributes.active {
        None | Some(Value::Bool(_)) => Ok(()),
        Some(_) => Err(DomainError::constraint(
            kind,
            format!("{kind} type must have a boolean for active"),
        )),
    }
}

fn check_tenancy_period(
    siblings: &[Node],
    attributes: &NodeAttributes,
    admission: Admission,
) -> DomainResult<()> {
    check_active_is_boolean(NodeKind::TenancyPeriod, attributes)?;

    if attributes.active_flag() == Some(true) {
        let excluding = admission.subject();
        let conflict = siblings
            .iter()
            .filter(|s| Some(s.id) != excluding)
            .find(|s| s.is_active_tenancy());
        if let Some(existing) = conflict {
            trace!(existing = %existing.id, "active tenancy period already present");
            return Err(DomainError::constraint(
                NodeKind::TenancyPeriod,
                "Only one Active Tenancy Period is allowed on a Property.",
            ));
        }
    }
    Ok(())
}

fn check_tenant(
    parent: Option<&Node>,
    siblings: &[Node],
    attributes: &NodeAttributes,
    admission: Admission,
) -> DomainResult<()> {
    check_active_is_boolean(NodeKind::Tenant, attributes)?;

    let tenant_count = siblings
        .iter()
        .filter(|s| s.kind() == NodeKind::Tenant)
        .count();
    let already_child = match admission {
        Admission::Create => false,
        Admission::Reparent { current_parent, .. } => {
            current_parent.is_some() && current_parent == parent.map(|p| p.id)
        }
    };
    if !already_child && tenant_count >= MAX_TENANTS_PER_PERIOD {
        return Err(DomainError::constraint(
            NodeKind::Tenant,
            format!("A Tenancy Period type must have at most {MAX_TENANTS_PER_PERIOD} Tenants."),
        ));
    }

    if admission.is_create() && attributes.moved_in_date.is_none() {
        return Err(DomainError::constraint(
            NodeKind::Tenant,
            "Tenant type must have a moved_in_date",
        ));
    }
    Ok(())
}

/// Clear every attribute the given type does not own.
pub fn project_attributes(kind: NodeKind, attributes: &NodeAttributes) -> NodeAttributes {
    let mut projected = NodeAttributes::default();
    match kind {
        NodeKind::Corporation => {}
        NodeKind::Building => projected.zip_code = attributes.zip_code.clone(),
        NodeKind::Property => projected.monthly_rent = attributes.monthly_rent,
        NodeKind::TenancyPeriod => projected.active = attributes.active.clone(),
        NodeKind::Tenant => {
            projected.active = attributes.active.clone();
            projected.moved_in_date = attributes.moved_in_date;
        }
    }
    projected
}

/// Build the typed payload for a new node from already-checked attributes.
pub fn payload_from_attributes(
    kind: NodeKind,
    attributes: &NodeAttributes,
) -> DomainResult<NodePayload> {
    let attributes = project_attributes(kind, attributes);
    let payload = match kind {
        NodeKind::Corporation => NodePayload::Corporation,
        NodeKind::Building => NodePayload::Building {
            zip_code: attributes.zip_code.ok_or_else(|| {
                DomainError::constraint(kind, "Building type must have a zip_code")
            })?,
        },
        NodeKind::Property => NodePayload::Property {
            monthly_rent: attributes.monthly_rent.ok_or_else(|| {
                DomainError::constraint(kind, "Property type must have a monthly_rent")
            })?,
        },
        NodeKind::TenancyPeriod => {
            check_active_is_boolean(kind, &attributes)?;
            NodePayload::TenancyPeriod {
                active: attributes.active_flag().unwrap_or(false),
            }
        }
        NodeKind::Tenant => {
            check_active_is_boolean(kind, &attributes)?;
            NodePayload::Tenant {
                active: attributes.active_flag(),
                moved_in_date: attributes.moved_in_date.ok_or_else(|| {
                    DomainError::constraint(kind, "Tenant type must have a moved_in_date")
                })?,
            }
        }
    };
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn node(id: u64, parent: Option<u64>, payload: NodePayload) -> Node {
        Node {
            id: NodeId(id),
            name: format!("node-{id}"),
            parent_id: parent.map(NodeId),
            height: 0,
            payload,
        }
    }

    fn tenant(id: u64, parent: u64) -> Node {
        node(
            id,
            Some(parent),
            NodePayload::Tenant {
                active: None,
                moved_in_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        )
    }

    // ============================================================
    // Allowed-parent table
    // ============================================================

    #[rstest]
    #[case(NodeKind::Corporation, None)]
    #[case(NodeKind::Building, Some(NodeKind::Corporation))]
    #[case(NodeKind::Property, Some(NodeKind::Building))]
    #[case(NodeKind::TenancyPeriod, Some(NodeKind::Property))]
    #[case(NodeKind::Tenant, Some(NodeKind::TenancyPeriod))]
    fn given_table_pair_when_checking_parent_then_accepts(
        #[case] child: NodeKind,
        #[case] parent: Option<NodeKind>,
    ) {
        assert_eq!(check_parent_allowed(child, parent), Ok(()));
    }

    #[test]
    fn given_any_pair_outside_table_when_checking_parent_then_rejects() {
        let parents = std::iter::once(None).chain(NodeKind::ALL.into_iter().map(Some));
        for parent in parents {
            for child in NodeKind::ALL {
                let expected_ok = allowed_parent(child) == parent;
                let result = check_parent_allowed(child, parent);
                assert_eq!(result.is_ok(), expected_ok, "{child} under {parent:?}");
                if !expected_ok {
                    assert!(matches!(result, Err(DomainError::InvalidParent { .. })));
                }
            }
        }
    }

    #[test]
    fn given_mismatch_when_rejected_then_message_names_both_types() {
        let err = check_parent_allowed(NodeKind::Building, Some(NodeKind::Tenant)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Parent Type: Tenant for child type: Building"
        );
    }

    // ============================================================
    // Type constraints
    // ============================================================

    #[test]
    fn given_building_without_zip_when_creating_then_rejects_but_moving_is_fine() {
        let attrs = NodeAttributes {
            zip_code: Some("   ".into()),
            ..Default::default()
        };
        let create = check_type_constraints(NodeKind::Building, None, &[], &attrs, Admission::Create);
        assert!(matches!(create, Err(DomainError::ConstraintViolation { .. })));

        let reparent = Admission::Reparent {
            node: NodeId(2),
            current_parent: Some(NodeId(1)),
        };
        assert!(check_type_constraints(NodeKind::Building, None, &[], &attrs, reparent).is_ok());
    }

    #[test]
    fn given_property_with_negative_rent_when_creating_then_rejects() {
        let attrs = NodeAttributes {
            monthly_rent: Some(Decimal::from_str("-1.00").unwrap()),
            ..Default::default()
        };
        let result = check_type_constraints(NodeKind::Property, None, &[], &attrs, Admission::Create);
        assert!(matches!(result, Err(DomainError::ConstraintViolation { .. })));
    }

    #[test]
    fn given_active_sibling_when_adding_active_period_then_rejects_with_message() {
        let property = node(1, None, NodePayload::Property { monthly_rent: Decimal::ONE });
        let siblings = vec![node(2, Some(1), NodePayload::TenancyPeriod { active: true })];
        let attrs = NodeAttributes {
            active: Some(Value::Bool(true)),
            ..Default::default()
        };

        let err = check_type_constraints(
            NodeKind::TenancyPeriod,
            Some(&property),
            &siblings,
            &attrs,
            Admission::Create,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Only one Active Tenancy Period is allowed on a Property."
        );
    }

    #[test]
    fn given_active_period_when_reparenting_itself_then_own_entry_is_excluded() {
        let property = node(1, None, NodePayload::Property { monthly_rent: Decimal::ONE });
        let siblings = vec![node(2, Some(1), NodePayload::TenancyPeriod { active: true })];
        let attrs = NodeAttributes {
            active: Some(Value::Bool(true)),
            ..Default::default()
        };
        let admission = Admission::Reparent {
            node: NodeId(2),
            current_parent: Some(NodeId(1)),
        };

        let result = check_type_constraints(
            NodeKind::TenancyPeriod,
            Some(&property),
            &siblings,
            &attrs,
            admission,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn given_non_boolean_active_when_checking_period_then_rejects() {
        let attrs = NodeAttributes {
            active: Some(Value::String("yes".into())),
            ..Default::default()
        };
        let err = check_type_constraints(NodeKind::TenancyPeriod, None, &[], &attrs, Admission::Create)
            .unwrap_err();
        assert_eq!(err.to_string(), "Tenancy Period type must have a boolean for active");
    }

    #[rstest]
    #[case(NodeKind::TenancyPeriod)]
    #[case(NodeKind::Tenant)]
    fn given_explicit_null_active_when_checking_then_rejects(#[case] kind: NodeKind) {
        let attrs = NodeAttributes {
            active: Some(Value::Null),
            moved_in_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };

        let err = check_type_constraints(kind, None, &[], &attrs, Admission::Create).unwrap_err();

        assert_eq!(err.to_string(), format!("{kind} type must have a boolean for active"));
    }

    #[test]
    fn given_four_tenants_when_adding_fifth_then_rejects() {
        let period = node(1, None, NodePayload::TenancyPeriod { active: true });
        let siblings: Vec<Node> = (2..6).map(|id| tenant(id, 1)).collect();
        let attrs = NodeAttributes {
            moved_in_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };

        let err = check_type_constraints(
            NodeKind::Tenant,
            Some(&period),
            &siblings,
            &attrs,
            Admission::Create,
        )
        .unwrap_err();

        assert!(err.to_string().contains("at most 4 Tenants"));
    }

    #[test]
    fn given_full_period_when_tenant_already_child_then_is_allowed() {
        let period = node(1, None, NodePayload::TenancyPeriod { active: true });
        let siblings: Vec<Node> = (2..6).map(|id| tenant(id, 1)).collect();
        let admission = Admission::Reparent {
            node: NodeId(3),
            current_parent: Some(NodeId(1)),
        };

        let result = check_type_constraints(
            NodeKind::Tenant,
            Some(&period),
            &siblings,
            &NodeAttributes::default(),
            admission,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn given_tenant_without_date_when_creating_then_rejects() {
        let period = node(1, None, NodePayload::TenancyPeriod { active: false });
        let result = check_type_constraints(
            NodeKind::Tenant,
            Some(&period),
            &[],
            &NodeAttributes::default(),
            Admission::Create,
        );
        assert!(matches!(result, Err(DomainError::ConstraintViolation { .. })));
    }

    // ============================================================
    // Attribute projection
    // ============================================================

    fn everything() -> NodeAttributes {
        NodeAttributes {
            zip_code: Some("12345".into()),
            monthly_rent: Some(Decimal::from_str("1000.50").unwrap()),
            active: Some(Value::Bool(true)),
            moved_in_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        }
    }

    #[test]
    fn given_foreign_attributes_when_projecting_building_then_only_zip_survives() {
        let projected = project_attributes(NodeKind::Building, &everything());
        assert_eq!(
            projected,
            NodeAttributes {
                zip_code: Some("12345".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn given_any_type_when_projecting_twice_then_equals_projecting_once() {
        for kind in NodeKind::ALL {
            let once = project_attributes(kind, &everything());
            let twice = project_attributes(kind, &once);
            assert_eq!(once, twice, "{kind}");
        }
    }

    #[test]
    fn given_period_without_active_when_building_payload_then_defaults_to_inactive() {
        let payload = payload_from_attributes(NodeKind::TenancyPeriod, &NodeAttributes::default())
            .unwrap();
        assert_eq!(payload, NodePayload::TenancyPeriod { active: false });
    }
}
