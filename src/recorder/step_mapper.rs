//! Event-to-step mapping
//!
//! Converts one captured interaction into one Gherkin step line. Mapping
//! never fails: unknown actions get a generic step and locator lookups fall
//! back to the literal selector.

use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

use super::session::ActionKind;
use crate::locator::LocatorResolver;

/// Prefixes marking a selector that is already concrete
const CONCRETE_PREFIXES: [&str; 3] = ["//", "css=", "xpath="];

/// Project and locator group an event is resolved against.
///
/// Passed explicitly with every event so resolution does not depend on
/// which task handles the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorContext {
    pub project: Option<String>,
    pub group: Option<String>,
}

impl LocatorContext {
    pub fn new(project: Option<String>, group: Option<String>) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            project: non_blank(project),
            group: non_blank(group),
        }
    }
}

/// Gherkin keyword of a step template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepKind {
    Given,
    When,
    Then,
}

/// Shape of a step the recorder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepTemplate {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub template: &'static str,
}

const STEP_CATALOG: [StepTemplate; 6] = [
    StepTemplate {
        kind: StepKind::Given,
        template: "Given I navigate to \"<url>\"",
    },
    StepTemplate {
        kind: StepKind::When,
        template: "When I click \"<target>\"",
    },
    StepTemplate {
        kind: StepKind::When,
        template: "When I type \"<text>\" into \"<target>\"",
    },
    StepTemplate {
        kind: StepKind::When,
        template: "When I submit the form \"<target>\"",
    },
    StepTemplate {
        kind: StepKind::When,
        template: "When I perform action \"<action>\" on \"<target>\"",
    },
    StepTemplate {
        kind: StepKind::Then,
        template: "Then I should see the text \"<text>\"",
    },
];

/// Maps raw events to step lines
#[derive(Clone)]
pub struct StepMapper {
    resolver: Option<Arc<dyn LocatorResolver>>,
}

impl StepMapper {
    pub fn new(resolver: Arc<dyn LocatorResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Mapper that uses selectors literally
    pub fn literal() -> Self {
        Self { resolver: None }
    }

    /// Step templates ordered Given, When, Then
    pub fn catalog() -> &'static [StepTemplate] {
        &STEP_CATALOG
    }

    pub fn map(
        &self,
        ctx: &LocatorContext,
        action: &ActionKind,
        selector: &str,
        text: &str,
        value: &str,
    ) -> String {
        match action {
            ActionKind::Click => {
                format!("When I click \"{}\"", self.resolve_target(ctx, selector))
            }
            ActionKind::Input | ActionKind::Change => {
                let typed = if value.is_empty() { text } else { value };
                format!(
                    "When I type \"{}\" into \"{}\"",
                    typed,
                    self.resolve_target(ctx, selector)
                )
            }
            ActionKind::Navigate => {
                let url = if value.trim().is_empty() {
                    selector
                } else {
                    value
                };
                format!("Given I navigate to \"{}\"", url)
            }
            ActionKind::Submit => format!(
                "When I submit the form \"{}\"",
                self.resolve_target(ctx, selector)
            ),
            ActionKind::Other(name) => format!(
                "When I perform action \"{}\" on \"{}\"",
                name,
                self.resolve_target(ctx, selector)
            ),
        }
    }

    /// Concrete selectors are kept as is; symbolic names are looked up in the
    /// context's locator group, falling back to the literal name.
    fn resolve_target(&self, ctx: &LocatorContext, selector: &str) -> String {
        let target = selector.trim();
        if CONCRETE_PREFIXES.iter().any(|p| target.starts_with(p)) {
            return target.to_string();
        }

        if let (Some(resolver), Some(group)) = (&self.resolver, &ctx.group) {
            let project = ctx.project.as_deref().unwrap_or_default();
            match resolver.resolve(project, group, target) {
                Ok(resolved) => {
                    debug!("Locator {} resolved to {}", target, resolved);
                    return resolved;
                }
                Err(e) => warn!("Could not resolve locator {}, using it literally: {}", target, e),
            }
        }
        target.to_string()
    }
}
