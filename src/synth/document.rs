//! Typed configuration documents and the layers that build them.
//!
//! A [`ConfigDocument`] is what gets written to disk: a fixed set of known
//! sections plus an open `extensions` map for keys this crate does not model.
//! A [`ConfigLayer`] is one contribution to a document (a template, the type
//! defaults, or a project override). Known list sections in a layer are
//! [`ListPatch`]es: a bare array replaces, an `{"append": [...], "remove": [...]}`
//! object edits. Extension keys deep-merge; a `null` value deletes the key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The synthesized artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Event name → ordered callback registrations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, Vec<HookRegistration>>,
    /// Enabled service bindings.
    #[serde(rename = "enabledMcpjsonServers", default)]
    pub services: Vec<String>,
    /// Enabled capability/skill names.
    #[serde(rename = "skills", default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,
    /// Runtime permission decisions. Preserved across regeneration.
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// One entry in a hook event's callback list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRegistration {
    /// Tool-name matcher for tool events; absent means "all".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    pub hooks: Vec<HookCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookCommand {
    #[serde(rename = "type", default = "default_command_kind")]
    pub kind: String,
    pub command: String,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_command_kind() -> String {
    "command".into()
}

/// Allow/deny/ask lists plus any other keys the host runtime keeps there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub ask: Vec<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Replace a list or edit it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListPatch<T> {
    Replace(Vec<T>),
    Edit(ListEdit<T>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListEdit<T> {
    #[serde(default = "Vec::new")]
    pub append: Vec<T>,
    #[serde(default = "Vec::new")]
    pub remove: Vec<T>,
}

impl<T: PartialEq + Clone> ListPatch<T> {
    pub fn append(items: Vec<T>) -> Self {
        Self::Edit(ListEdit {
            append: items,
            remove: Vec::new(),
        })
    }

    /// Appends skip items already present; removes drop every occurrence and run
    /// after appends.
    pub fn apply(&self, target: &mut Vec<T>) {
        match self {
            Self::Replace(items) => *target = items.clone(),
            Self::Edit(edit) => {
                for item in &edit.append {
                    if !target.contains(item) {
                        target.push(item.clone());
                    }
                }
                target.retain(|item| !edit.remove.contains(item));
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<ListPatch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<ListPatch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<ListPatch<String>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One contribution to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, ListPatch<HookRegistration>>,
    #[serde(
        rename = "enabledMcpjsonServers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub services: Option<ListPatch<String>>,
    #[serde(rename = "skills", default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ListPatch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<ListPatch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsPatch>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ConfigDocument {
    /// Apply one layer on top of this document.
    pub fn apply(&mut self, layer: &ConfigLayer) {
        for (event, patch) in &layer.hooks {
            let entry = self.hooks.entry(event.clone()).or_default();
            patch.apply(entry);
        }
        self.hooks.retain(|_, registrations| !registrations.is_empty());

        if let Some(patch) = &layer.services {
            patch.apply(&mut self.services);
        }
        if let Some(patch) = &layer.capabilities {
            patch.apply(&mut self.capabilities);
        }
        if let Some(patch) = &layer.instructions {
            patch.apply(&mut self.instructions);
        }
        if let Some(patch) = &layer.permissions {
            self.permissions.apply(patch);
        }
        merge_map(&mut self.extensions, &layer.extensions);
    }
}

impl Permissions {
    pub fn apply(&mut self, patch: &PermissionsPatch) {
        if let Some(p) = &patch.allow {
            p.apply(&mut self.allow);
        }
        if let Some(p) = &patch.deny {
            p.apply(&mut self.deny);
        }
        if let Some(p) = &patch.ask {
            p.apply(&mut self.ask);
        }
        merge_map(&mut self.other, &patch.other);
    }
}

/// Deep-merge `patch` into `target`: objects recurse, `null` deletes, anything
/// else replaces.
pub fn merge_map(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
            continue;
        }
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (target.get_mut(key), value)
        {
            merge_map(existing, incoming);
            continue;
        }
        target.insert(key.clone(), strip_nulls(value));
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
