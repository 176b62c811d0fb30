#![allow(dead_code)]

//! Shared fixtures: the Parent/Child pair used across the suites, with
//! plan-building helpers.

use pgbulk::{Entity, EntityBuilder, FieldAccessor, PlanCache, Value};
use uuid::Uuid;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub struct Parent {
    pub id: Uuid,
    pub name: String,
    pub children: Vec<Child>,
}

impl Parent {
    pub fn named(name: &str, children: Vec<Child>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.to_string(),
            children,
        }
    }
}

impl Entity for Parent {
    fn entity_name() -> &'static str {
        "Parent"
    }

    fn fields() -> Vec<FieldAccessor<Self>> {
        vec![
            FieldAccessor::new(
                "id",
                |p: &Parent| Value::Uuid(p.id),
                |p: &mut Parent, v| {
                    if let Value::Uuid(u) = v {
                        p.id = u;
                    }
                },
            ),
            FieldAccessor::new(
                "name",
                |p: &Parent| Value::from(p.name.as_str()),
                |p: &mut Parent, v| {
                    if let Value::Text(s) = v {
                        p.name = s;
                    }
                },
            ),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Child {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub value: String,
}

impl Child {
    pub fn valued(value: &str) -> Self {
        Self {
            id: Uuid::nil(),
            parent_id: Uuid::nil(),
            value: value.to_string(),
        }
    }
}

impl Entity for Child {
    fn entity_name() -> &'static str {
        "Child"
    }

    fn fields() -> Vec<FieldAccessor<Self>> {
        vec![
            FieldAccessor::new(
                "id",
                |c: &Child| Value::Uuid(c.id),
                |c: &mut Child, v| {
                    if let Value::Uuid(u) = v {
                        c.id = u;
                    }
                },
            ),
            FieldAccessor::new(
                "parent_id",
                |c: &Child| Value::Uuid(c.parent_id),
                |c: &mut Child, v| {
                    if let Value::Uuid(u) = v {
                        c.parent_id = u;
                    }
                },
            ),
            FieldAccessor::new(
                "value",
                |c: &Child| Value::from(c.value.as_str()),
                |c: &mut Child, v| {
                    if let Value::Text(s) = v {
                        c.value = s;
                    }
                },
            ),
        ]
    }
}

fn parent_children(p: &mut Parent) -> Option<&mut Vec<Child>> {
    Some(&mut p.children)
}

/// Build the Parent plan (auto id, one-to-many children) into `cache`.
pub fn build_parent_plan(cache: &PlanCache) {
    EntityBuilder::<Parent>::new()
        .map_uuid_generator("id")
        .map_one_to_many(
            "children",
            parent_children,
            |p: &Parent| Value::Uuid(p.id),
            |c: &mut Child, key: &Value| {
                if let Value::Uuid(u) = key {
                    c.parent_id = *u;
                }
            },
        )
        .build(cache)
        .unwrap();
}

/// Build the Child plan (auto id) into `cache`.
pub fn build_child_plan(cache: &PlanCache) {
    EntityBuilder::<Child>::new()
        .map_uuid_generator("id")
        .build(cache)
        .unwrap();
}

pub fn build_family_plans(cache: &PlanCache) {
    build_parent_plan(cache);
    build_child_plan(cache);
}
