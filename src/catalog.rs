use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ─── Agent identity ──────────────────────────────────────────────────────────

/// Name + version pair identifying one remote capability.
///
/// Rendered as `name:version` everywhere an agent is referenced by string
/// (plan tasks, gateway endpoints, event payloads).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId {
    pub name: String,
    pub version: String,
}

impl AgentId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((name, version)) = value.split_once(':') else {
            return Err(format!("agent reference must be name:version, got {value}"));
        };
        if name.is_empty() || version.is_empty() {
            return Err(format!("agent reference must be name:version, got {value}"));
        }
        Ok(Self::new(name, version))
    }
}

impl TryFrom<String> for AgentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.to_string()
    }
}

// ─── Descriptors and catalog ─────────────────────────────────────────────────

/// One available capability: identity plus the description the planner
/// chooses agents by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub description: String,
}

impl AgentDescriptor {
    pub fn new(id: AgentId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// Descriptor reduced to the shape planning prompts consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
}

/// Immutable registry of the agents available to one plan.
///
/// Built once by the caller (or from configuration) and treated read-only
/// for the lifetime of a planning session.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: BTreeMap<AgentId, AgentDescriptor>,
}

impl AgentCatalog {
    pub fn new(descriptors: Vec<AgentDescriptor>) -> Self {
        let mut agents = BTreeMap::new();
        for descriptor in descriptors {
            agents.insert(descriptor.id.clone(), descriptor);
        }
        Self { agents }
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentDescriptor> {
        self.agents.get(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.values()
    }

    /// The `name:version` + description pairs handed to planning prompts.
    pub fn summaries(&self) -> Vec<AgentSummary> {
        self.agents
            .values()
            .map(|descriptor| AgentSummary {
                name: descriptor.id.to_string(),
                description: descriptor.description.clone(),
            })
            .collect()
    }
}
