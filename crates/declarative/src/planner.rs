//! Execution planner - builds resource execution plans

use crate::resource::{BoxedResource, Resource};
use anyhow::{Result, bail};

/// An ordered execution plan
///
/// Resource ids are unique within a plan, so one resource is never
/// reconciled twice (or concurrently) in the same run.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    /// Resources in declaration order
    pub resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource, rejecting a second declaration of the same id
    pub fn add_resource(&mut self, resource: BoxedResource) -> Result<()> {
        let id = resource.id();
        if let Some(existing) = self
            .resources
            .iter()
            .find(|r| r.resource_type() == resource.resource_type() && r.id() == id)
        {
            bail!(
                "{} '{}' is declared more than once ({} / {})",
                resource.resource_type(),
                id,
                existing.description(),
                resource.description()
            );
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            resources: self
                .resources
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Only the first dot separates, so names may themselves contain dots.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((resource_type, name)) if !resource_type.is_empty() => {
            (Some(resource_type.to_string()), Some(name.to_string()))
        }
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "rg" | "group" | "groups" => resource.resource_type() == "resource_group",
            _ => resource.resource_type() == rt || resource.resource_type().starts_with(rt),
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && resource.id() != n
    {
        return false;
    }

    true
}
