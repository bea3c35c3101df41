//! Effect - Side effects as values
//!
//! An Effect describes one operation against the infrastructure. Building
//! Effects never touches the API; the Interpreter runs them.

use crate::resource::{Resource, ResourceId, State};
use crate::timeouts::Timeouts;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Refresh a resource's state
    Read {
        id: ResourceId,
        identifier: Option<String>,
        timeouts: Timeouts,
    },
    Create(Resource),
    Update {
        id: ResourceId,
        identifier: String,
        from: Box<State>,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Destroy then create, for changes the API cannot apply in place
    Replace {
        id: ResourceId,
        identifier: String,
        from: Box<State>,
        to: Resource,
        /// Changed attributes forcing the replacement
        forced_by: Vec<String>,
    },
    Delete {
        id: ResourceId,
        identifier: String,
        timeouts: Timeouts,
    },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read { id, .. } => id,
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } => id,
            Effect::Replace { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }

    /// Whether this Effect changes infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read { .. })
    }

    /// One-character marker used when displaying a plan
    pub fn symbol(&self) -> &'static str {
        match self {
            Effect::Read { .. } => "?",
            Effect::Create(_) => "+",
            Effect::Update { .. } => "~",
            Effect::Replace { .. } => "-/+",
            Effect::Delete { .. } => "-",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol(), self.resource_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_symbol_and_address() {
        let create = Effect::Create(Resource::new("ec2_vpc", "main"));
        assert_eq!(create.to_string(), "+ ec2_vpc.main");
        assert!(create.is_mutating());

        let read = Effect::Read {
            id: ResourceId::new("ec2_vpc", "main"),
            identifier: None,
            timeouts: Timeouts::default(),
        };
        assert_eq!(read.to_string(), "? ec2_vpc.main");
        assert!(!read.is_mutating());
    }
}
