//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" fetched from the Provider, and generates a list of required Effects
//! (Plan).

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use thiserror::Error;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Bindings, Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;
use crate::timeouts::Timeouts;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with differences the API cannot apply in place
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
        forced_by: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Only attributes present in `desired` are compared, in canonical form.
/// Computed-only attributes are skipped, as are write-only attributes the
/// current state does not carry.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);
    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forced_by: Vec<String> = match schema {
        Some(schema) => changed
            .iter()
            .filter(|name| schema.is_force_new(name))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    if forced_by.is_empty() {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
            forced_by,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        let Some(schema) = schema else {
            if current.get(key) != Some(desired_value) {
                changed.push(key.clone());
            }
            continue;
        };
        if schema.is_computed_only(key) {
            continue;
        }

        match current.get(key) {
            Some(current_value) => {
                if schema.canonicalize(key, desired_value) != schema.canonicalize(key, current_value) {
                    changed.push(key.clone());
                }
            }
            None if schema.is_write_only(key) => {}
            None => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("duplicate resource name '{0}'")]
    DuplicateName(String),

    #[error("{resource} refers to unknown resource '{binding}'")]
    UnknownReference {
        resource: ResourceId,
        binding: String,
    },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Sort resources topologically so every resource follows the ones it refers to
///
/// Resources are referred to by name, so names must be unique. Input order is
/// kept wherever dependencies allow.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<&Resource>, PlanError> {
    let mut by_name: HashMap<&str, &Resource> = HashMap::new();
    for resource in resources {
        if by_name.insert(&resource.id.name, resource).is_some() {
            return Err(PlanError::DuplicateName(resource.id.name.clone()));
        }
    }

    fn visit<'a>(
        resource: &'a Resource,
        by_name: &HashMap<&str, &'a Resource>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        sorted: &mut Vec<&'a Resource>,
    ) -> Result<(), PlanError> {
        let name = resource.id.name.as_str();
        if visited.contains(name) {
            return Ok(());
        }
        if let Some(pos) = path.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(PlanError::Cycle(cycle));
        }

        path.push(name);
        for dep in resource.dependencies() {
            let Some(&dep_resource) = by_name.get(dep.as_str()) else {
                return Err(PlanError::UnknownReference {
                    resource: resource.id.clone(),
                    binding: dep,
                });
            };
            visit(dep_resource, by_name, visited, path, sorted)?;
        }
        path.pop();

        visited.insert(name);
        sorted.push(resource);
        Ok(())
    }

    let mut sorted = Vec::with_capacity(resources.len());
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    for resource in resources {
        visit(resource, &by_name, &mut visited, &mut path, &mut sorted)?;
    }
    Ok(sorted)
}

/// Compute Diffs for all resources and generate a Plan
///
/// `current` holds the refreshed state of every tracked resource, in the
/// order they were recorded. Tracked resources missing from `desired` are
/// deleted after everything else, dependents first.
pub fn create_plan(
    desired: &[Resource],
    current: &[State],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<Plan, PlanError> {
    let sorted = sort_by_dependencies(desired)?;
    let current_by_id: HashMap<&ResourceId, &State> = current.iter().map(|s| (&s.id, s)).collect();

    let mut plan = Plan::new();
    let mut bindings = Bindings::new();

    for resource in sorted {
        let state = current_by_id
            .get(&resource.id)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        // References to resources being created or replaced stay unresolved
        // until apply, so dependents see them as changed
        let resolved = resource.resolve(&bindings);
        let schema = schemas.get(&resource.id.resource_type);
        let name = resource.id.name.clone();

        match diff(&resolved, &state, schema) {
            Diff::Create(r) => {
                bindings.insert(name, r.attributes.clone());
                plan.add(Effect::Create(r));
            }
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                let mut attrs = from.binding_attributes();
                attrs.extend(to.attributes.clone());
                bindings.insert(name, attrs);
                plan.add(Effect::Update {
                    id,
                    identifier: from.identifier.clone().unwrap_or_default(),
                    from: Box::new(from),
                    to,
                    changed_attributes,
                });
            }
            Diff::Replace {
                id,
                from,
                to,
                forced_by,
                ..
            } => {
                debug!("{} must be replaced, forced by {:?}", id, forced_by);
                bindings.insert(name, to.attributes.clone());
                plan.add(Effect::Replace {
                    id,
                    identifier: from.identifier.clone().unwrap_or_default(),
                    from: Box::new(from),
                    to,
                    forced_by,
                });
            }
            Diff::NoChange(_) => {
                let mut attrs = state.binding_attributes();
                attrs.extend(resolved.attributes);
                bindings.insert(name, attrs);
            }
        }
    }

    let desired_ids: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let orphans: Vec<&State> = current
        .iter()
        .filter(|s| s.exists && !desired_ids.contains(&s.id))
        .collect();
    for state in deletion_order(&orphans) {
        add_delete(&mut plan, state, Timeouts::default());
    }

    Ok(plan)
}

/// Plan deleting every tracked resource, dependents first
///
/// Timeouts are taken from the matching resource in `desired`, when present.
pub fn create_destroy_plan(current: &[State], desired: &[Resource]) -> Plan {
    let timeouts: HashMap<&ResourceId, Timeouts> =
        desired.iter().map(|r| (&r.id, r.timeouts)).collect();
    let existing: Vec<&State> = current.iter().filter(|s| s.exists).collect();

    let mut plan = Plan::new();
    for state in deletion_order(&existing) {
        let t = timeouts.get(&state.id).copied().unwrap_or_default();
        add_delete(&mut plan, state, t);
    }
    plan
}

/// Plan reading back every tracked resource
///
/// Timeouts are taken from the matching resource in `desired`, when present.
pub fn create_refresh_plan(current: &[State], desired: &[Resource]) -> Plan {
    let timeouts: HashMap<&ResourceId, Timeouts> =
        desired.iter().map(|r| (&r.id, r.timeouts)).collect();

    let mut plan = Plan::new();
    for state in current {
        plan.add(Effect::Read {
            id: state.id.clone(),
            identifier: state.identifier.clone(),
            timeouts: timeouts.get(&state.id).copied().unwrap_or_default(),
        });
    }
    plan
}

fn add_delete(plan: &mut Plan, state: &State, timeouts: Timeouts) {
    match state.identifier {
        Some(ref identifier) => plan.add(Effect::Delete {
            id: state.id.clone(),
            identifier: identifier.clone(),
            timeouts,
        }),
        None => warn!("{} has no identifier recorded, skipping delete", state.id),
    }
}

/// Order states so that a resource comes before the resources it refers to.
///
/// Recorded state holds resolved values, so a reference shows up as another
/// resource's identifier inside the attributes. Among unrelated resources,
/// the most recently recorded goes first.
fn deletion_order<'a>(states: &[&'a State]) -> Vec<&'a State> {
    let depends_on = |a: &State, b: &State| {
        a.id != b.id
            && b.identifier
                .as_deref()
                .is_some_and(|ident| a.attributes.values().any(|v| contains_string(v, ident)))
    };

    fn visit<'a>(
        index: usize,
        states: &[&'a State],
        depends_on: &dyn Fn(&State, &State) -> bool,
        visited: &mut HashSet<usize>,
        ordered: &mut Vec<&'a State>,
    ) {
        if !visited.insert(index) {
            return;
        }
        for (other, state) in states.iter().enumerate().rev() {
            if depends_on(*state, states[index]) {
                visit(other, states, depends_on, visited, ordered);
            }
        }
        ordered.push(states[index]);
    }

    let mut visited = HashSet::new();
    let mut ordered = Vec::with_capacity(states.len());
    for index in (0..states.len()).rev() {
        visit(index, states, &depends_on, &mut visited, &mut ordered);
    }
    ordered
}

fn contains_string(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s == needle,
        Value::List(items) => items.iter().any(|v| contains_string(v, needle)),
        Value::Map(map) => map.values().any(|v| contains_string(v, needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn vpc_schema() -> ResourceSchema {
        ResourceSchema::new("ec2_vpc")
            .attribute(
                AttributeSchema::new("cidr_block", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool).optional())
            .attribute(AttributeSchema::new("vpc_id", AttributeType::String).computed())
    }

    fn subnet_schema() -> ResourceSchema {
        ResourceSchema::new("ec2_subnet")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("cidr_block", AttributeType::String)
                    .required()
                    .force_new(),
            )
    }

    fn schemas() -> HashMap<String, ResourceSchema> {
        [vpc_schema(), subnet_schema()]
            .into_iter()
            .map(|s| (s.resource_type.clone(), s))
            .collect()
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn existing(resource_type: &str, name: &str, identifier: &str, attrs: &[(&str, Value)]) -> State {
        State::existing(
            ResourceId::new(resource_type, name),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
        .with_identifier(identifier)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("ec2_vpc", "main");
        let current = State::not_found(ResourceId::new("ec2_vpc", "main"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_ignores_computed_and_absent_attributes() {
        let desired = Resource::new("ec2_vpc", "main")
            .with_attribute("cidr_block", string("10.0.0.0/16"))
            .with_attribute("vpc_id", string("stale"));
        let current = existing(
            "ec2_vpc",
            "main",
            "vpc-1",
            &[
                ("cidr_block", string("10.0.0.0/16")),
                ("vpc_id", string("vpc-1")),
                ("instance_tenancy", string("default")),
            ],
        );

        let result = diff(&desired, &current, Some(&vpc_schema()));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("ec2_vpc", "main")
            .with_attribute("cidr_block", string("10.0.0.0/16"))
            .with_attribute("enable_dns_hostnames", Value::Bool(true));
        let current = existing(
            "ec2_vpc",
            "main",
            "vpc-1",
            &[
                ("cidr_block", string("10.0.0.0/16")),
                ("enable_dns_hostnames", Value::Bool(false)),
            ],
        );

        match diff(&desired, &current, Some(&vpc_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["enable_dns_hostnames"]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_on_force_new_change() {
        let desired =
            Resource::new("ec2_vpc", "main").with_attribute("cidr_block", string("10.1.0.0/16"));
        let current = existing(
            "ec2_vpc",
            "main",
            "vpc-1",
            &[("cidr_block", string("10.0.0.0/16"))],
        );

        match diff(&desired, &current, Some(&vpc_schema())) {
            Diff::Replace { forced_by, .. } => assert_eq!(forced_by, vec!["cidr_block"]),
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn diff_compares_canonical_forms_and_skips_unread_write_only() {
        let schema = ResourceSchema::new("iam_role")
            .attribute(
                AttributeSchema::new("assume_role_policy_document", crate::schema::types::json_document())
                    .required(),
            )
            .attribute(AttributeSchema::new("secret", AttributeType::String).optional().write_only());

        let desired = Resource::new("iam_role", "r")
            .with_attribute("assume_role_policy_document", string("{ \"Version\": \"2012-10-17\" }"))
            .with_attribute("secret", string("s3cr3t"));
        let current = existing(
            "iam_role",
            "r",
            "r",
            &[("assume_role_policy_document", string(r#"{"Version":"2012-10-17"}"#))],
        );

        assert!(!diff(&desired, &current, Some(&schema)).is_change());
    }

    #[test]
    fn sort_puts_dependencies_first() {
        let resources = vec![
            Resource::new("ec2_subnet", "a")
                .with_attribute("vpc_id", Value::ResourceRef("main".into(), "id".into())),
            Resource::new("ec2_vpc", "main"),
        ];
        let sorted = sort_by_dependencies(&resources).unwrap();
        let names: Vec<&str> = sorted.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["main", "a"]);
    }

    #[test]
    fn sort_rejects_cycles_and_unknown_references() {
        let cyclic = vec![
            Resource::new("x", "a").with_attribute("p", Value::ResourceRef("b".into(), "id".into())),
            Resource::new("x", "b").with_attribute("p", Value::ResourceRef("a".into(), "id".into())),
        ];
        assert_eq!(
            sort_by_dependencies(&cyclic).unwrap_err(),
            PlanError::Cycle(vec!["a".into(), "b".into(), "a".into()])
        );

        let dangling =
            vec![Resource::new("x", "a").with_attribute("p", Value::ResourceRef("nope".into(), "id".into()))];
        assert!(matches!(
            sort_by_dependencies(&dangling),
            Err(PlanError::UnknownReference { .. })
        ));

        let duplicate = vec![Resource::new("x", "a"), Resource::new("y", "a")];
        assert_eq!(
            sort_by_dependencies(&duplicate).unwrap_err(),
            PlanError::DuplicateName("a".into())
        );
    }

    #[test]
    fn create_plan_resolves_refs_from_existing_state() {
        let resources = vec![
            Resource::new("ec2_vpc", "main").with_attribute("cidr_block", string("10.0.0.0/16")),
            Resource::new("ec2_subnet", "a")
                .with_attribute("vpc_id", Value::ResourceRef("main".into(), "id".into()))
                .with_attribute("cidr_block", string("10.0.1.0/24")),
        ];
        let current = vec![
            existing("ec2_vpc", "main", "vpc-1", &[("cidr_block", string("10.0.0.0/16"))]),
            existing(
                "ec2_subnet",
                "a",
                "subnet-1",
                &[("vpc_id", string("vpc-1")), ("cidr_block", string("10.0.1.0/24"))],
            ),
        ];

        let plan = create_plan(&resources, &current, &schemas()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn replacing_a_dependency_replaces_dependents() {
        let resources = vec![
            Resource::new("ec2_vpc", "main").with_attribute("cidr_block", string("10.1.0.0/16")),
            Resource::new("ec2_subnet", "a")
                .with_attribute("vpc_id", Value::ResourceRef("main".into(), "id".into()))
                .with_attribute("cidr_block", string("10.0.1.0/24")),
        ];
        let current = vec![
            existing("ec2_vpc", "main", "vpc-1", &[("cidr_block", string("10.0.0.0/16"))]),
            existing(
                "ec2_subnet",
                "a",
                "subnet-1",
                &[("vpc_id", string("vpc-1")), ("cidr_block", string("10.0.1.0/24"))],
            ),
        ];

        let plan = create_plan(&resources, &current, &schemas()).unwrap();
        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Replace { .. }));
        match &plan.effects()[1] {
            Effect::Replace { to, forced_by, .. } => {
                assert_eq!(forced_by, &vec!["vpc_id".to_string()]);
                assert!(to.unresolved().is_some());
            }
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn orphans_are_deleted_dependents_first() {
        let current = vec![
            existing("ec2_vpc", "main", "vpc-1", &[]),
            existing("ec2_internet_gateway", "igw", "igw-1", &[]),
            existing(
                "ec2_subnet",
                "a",
                "subnet-1",
                &[("vpc_id", string("vpc-1"))],
            ),
            existing(
                "ec2_vpc_gateway_attachment",
                "attach",
                "IGW|vpc-1",
                &[("vpc_id", string("vpc-1")), ("internet_gateway_id", string("igw-1"))],
            ),
        ];

        let plan = create_plan(&[], &current, &schemas()).unwrap();
        let order: Vec<&str> = plan
            .effects()
            .iter()
            .map(|e| e.resource_id().name.as_str())
            .collect();

        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("attach") < pos("igw"));
        assert!(pos("attach") < pos("main"));
        assert!(pos("a") < pos("main"));
        assert!(plan.effects().iter().all(|e| matches!(e, Effect::Delete { .. })));
    }

    #[test]
    fn destroy_plan_uses_configured_timeouts() {
        let current = vec![existing("ec2_vpc", "main", "vpc-1", &[])];
        let timeouts = Timeouts {
            delete: Some(std::time::Duration::from_secs(60)),
            ..Default::default()
        };
        let desired = vec![Resource::new("ec2_vpc", "main").with_timeouts(timeouts)];

        let plan = create_destroy_plan(&current, &desired);
        match &plan.effects()[0] {
            Effect::Delete {
                identifier,
                timeouts: t,
                ..
            } => {
                assert_eq!(identifier, "vpc-1");
                assert_eq!(*t, timeouts);
            }
            other => panic!("Expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn refresh_plan_carries_read_timeouts() {
        let current = vec![
            existing("ec2_vpc", "main", "vpc-1", &[]),
            existing("ec2_subnet", "a", "subnet-1", &[]),
        ];
        let timeouts = Timeouts {
            read: Some(std::time::Duration::from_secs(5)),
            ..Default::default()
        };
        let desired = vec![Resource::new("ec2_vpc", "main").with_timeouts(timeouts)];

        let plan = create_refresh_plan(&current, &desired);
        let read_timeouts: Vec<Timeouts> = plan
            .effects()
            .iter()
            .map(|e| match e {
                Effect::Read { timeouts, .. } => *timeouts,
                other => panic!("Expected Read, got {:?}", other),
            })
            .collect();
        assert_eq!(read_timeouts, vec![timeouts, Timeouts::default()]);
    }
}
