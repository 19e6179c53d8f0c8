//! Domain entities: nodes of the real-estate hierarchy

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a persisted node. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Corporation,
    Building,
    Property,
    #[serde(rename = "Tenancy Period")]
    TenancyPeriod,
    Tenant,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Corporation,
        NodeKind::Building,
        NodeKind::Property,
        NodeKind::TenancyPeriod,
        NodeKind::Tenant,
    ];

    /// Display name, as used in rejection messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Corporation => "Corporation",
            NodeKind::Building => "Building",
            NodeKind::Property => "Property",
            NodeKind::TenancyPeriod => "Tenancy Period",
            NodeKind::Tenant => "Tenant",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    /// Accepts display names ("Tenancy Period") and kebab/snake case ("tenancy-period").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "corporation" => Ok(NodeKind::Corporation),
            "building" => Ok(NodeKind::Building),
            "property" => Ok(NodeKind::Property),
            "tenancyperiod" => Ok(NodeKind::TenancyPeriod),
            "tenant" => Ok(NodeKind::Tenant),
            _ => Err(format!("unknown node type: {s}")),
        }
    }
}

/// Type-specific attributes. Each variant carries exactly the fields its type owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodePayload {
    Corporation,
    Building {
        zip_code: String,
    },
    Property {
        monthly_rent: Decimal,
    },
    #[serde(rename = "Tenancy Period")]
    TenancyPeriod {
        active: bool,
    },
    Tenant {
        #[serde(default)]
        active: Option<bool>,
        moved_in_date: NaiveDate,
    },
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Corporation => NodeKind::Corporation,
            NodePayload::Building { .. } => NodeKind::Building,
            NodePayload::Property { .. } => NodeKind::Property,
            NodePayload::TenancyPeriod { .. } => NodeKind::TenancyPeriod,
            NodePayload::Tenant { .. } => NodeKind::Tenant,
        }
    }

    /// Flatten back into the loose attribute bag (used when re-checking rules on a move).
    pub fn to_attributes(&self) -> NodeAttributes {
        let mut attrs = NodeAttributes::default();
        match self {
            NodePayload::Corporation => {}
            NodePayload::Building { zip_code } => attrs.zip_code = Some(zip_code.clone()),
            NodePayload::Property { monthly_rent } => attrs.monthly_rent = Some(*monthly_rent),
            NodePayload::TenancyPeriod { active } => {
                attrs.active = Some(serde_json::Value::Bool(*active))
            }
            NodePayload::Tenant {
                active,
                moved_in_date,
            } => {
                attrs.active = active.map(serde_json::Value::Bool);
                attrs.moved_in_date = Some(*moved_in_date);
            }
        }
        attrs
    }

    pub fn zip_code(&self) -> Option<&str> {
        match self {
            NodePayload::Building { zip_code } => Some(zip_code),
            _ => None,
        }
    }

    pub fn monthly_rent(&self) -> Option<Decimal> {
        match self {
            NodePayload::Property { monthly_rent } => Some(*monthly_rent),
            _ => None,
        }
    }

    pub fn active(&self) -> Option<bool> {
        match self {
            NodePayload::TenancyPeriod { active } => Some(*active),
            NodePayload::Tenant { active, .. } => *active,
            _ => None,
        }
    }

    pub fn moved_in_date(&self) -> Option<NaiveDate> {
        match self {
            NodePayload::Tenant { moved_in_date, .. } => Some(*moved_in_date),
            _ => None,
        }
    }
}

/// A persisted node of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    /// Number of ancestors; 0 for roots.
    pub height: u32,
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Currently active tenancy period (false for every other type).
    pub fn is_active_tenancy(&self) -> bool {
        matches!(self.payload, NodePayload::TenancyPeriod { active: true })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.id, self.name, self.kind())
    }
}

/// A node ready to be persisted; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub height: u32,
    pub payload: NodePayload,
}

impl NodeDraft {
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            name: self.name,
            parent_id: self.parent_id,
            height: self.height,
            payload: self.payload,
        }
    }
}

/// Loosely typed attribute bag as handed in by a presentation layer.
///
/// `active` stays a raw JSON value so non-boolean input can be rejected by the policy
/// instead of failing during parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    pub zip_code: Option<String>,
    pub monthly_rent: Option<Decimal>,
    pub active: Option<serde_json::Value>,
    pub moved_in_date: Option<NaiveDate>,
}

impl NodeAttributes {
    /// `Some(true)` only for a JSON boolean `true`.
    pub fn active_flag(&self) -> Option<bool> {
        self.active.as_ref().and_then(serde_json::Value::as_bool)
    }
}

/// Input for creating a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

impl NewNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, parent_id: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_id,
            attributes: NodeAttributes::default(),
        }
    }

    pub fn zip_code(mut self, zip_code: impl Into<String>) -> Self {
        self.attributes.zip_code = Some(zip_code.into());
        self
    }

    pub fn monthly_rent(mut self, rent: Decimal) -> Self {
        self.attributes.monthly_rent = Some(rent);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.attributes.active = Some(serde_json::Value::Bool(active));
        self
    }

    pub fn moved_in_date(mut self, date: NaiveDate) -> Self {
        self.attributes.moved_in_date = Some(date);
        self
    }
}
