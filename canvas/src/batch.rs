//! AI-generated action batches, applied through the same path as local edits.
//!
//! A batch is what the AI command endpoint returns: a list of create /
//! update / delete / `fit_view` actions. Creates name their objects with
//! temporary ids so later entries in the same batch (connectors, updates)
//! can refer to them before real ids exist. Each entry mutates the store and
//! yields the same [`Action`]s a local gesture would, so the host broadcasts
//! them without a separate ingestion path.
//!
//! ERROR HANDLING
//! ==============
//! Entries that do not make sense (bad props, unknown ids) are skipped and
//! counted. The rest of the batch still applies.

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::doc::{BoardObject, ObjectId, ObjectKind, ObjectPatch};
use crate::engine::{Action, EngineCore};

/// One entry of an AI batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BatchAction {
    Create {
        object_type: ObjectKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        /// Geometry and variant fields. Connectors may name endpoints with
        /// `from_temp_id` / `to_temp_id` as well as `from_id` / `to_id`.
        #[serde(default)]
        props: Map<String, Value>,
    },
    Update {
        /// Real id, or a temp id created earlier in the batch.
        object_id: String,
        #[serde(default)]
        props: Map<String, Value>,
    },
    Delete {
        object_id: String,
    },
    FitView,
}

/// A full AI response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub actions: Vec<BatchAction>,
    /// Request a view fit even if nothing was created.
    #[serde(default)]
    pub fit_to_view: bool,
}

/// What applying a batch did.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub actions: Vec<Action>,
    /// Temp id to the real id it was given.
    pub resolved: HashMap<String, ObjectId>,
    /// Entries that were dropped.
    pub skipped: usize,
}

impl EngineCore {
    /// Apply a batch behind a single undo snapshot.
    pub fn apply_batch(&mut self, batch: &Batch) -> BatchOutcome {
        let mut out = BatchOutcome::default();
        if batch.actions.is_empty() && !batch.fit_to_view {
            return out;
        }
        self.doc.push_undo();

        let mut created = false;
        let mut fit = batch.fit_to_view;
        for entry in &batch.actions {
            let applied = match entry {
                BatchAction::Create { object_type, temp_id, props } => {
                    let ok = self.batch_create(*object_type, temp_id.as_deref(), props, &mut out);
                    created |= ok;
                    ok
                }
                BatchAction::Update { object_id, props } => self.batch_update(object_id, props, &mut out),
                BatchAction::Delete { object_id } => {
                    let id = resolve(&out.resolved, object_id);
                    if self.doc.contains(&id) {
                        out.actions.extend(self.remove_cascade(&[id]));
                        true
                    } else {
                        false
                    }
                }
                BatchAction::FitView => {
                    fit = true;
                    true
                }
            };
            if !applied {
                out.skipped += 1;
            }
        }

        if created || fit {
            out.actions.extend(self.request_fit());
        } else {
            out.actions.push(Action::RenderNeeded);
        }
        out
    }

    fn batch_create(
        &mut self,
        kind: ObjectKind,
        temp_id: Option<&str>,
        props: &Map<String, Value>,
        out: &mut BatchOutcome,
    ) -> bool {
        let mut props = props.clone();
        let mut obj = BoardObject::new(kind, self.board_id.clone(), 0.0, 0.0, self.ui.active_color.as_deref());

        if kind.is_connector() {
            let (Some(from), Some(to)) = (
                endpoint(&mut props, "from_temp_id", "from_id", &out.resolved),
                endpoint(&mut props, "to_temp_id", "to_id", &out.resolved),
            ) else {
                return false;
            };
            obj.props.insert("from_id".into(), Value::String(from));
            obj.props.insert("to_id".into(), Value::String(to));
        }

        let Ok(patch) = serde_json::from_value::<ObjectPatch>(Value::Object(props)) else {
            return false;
        };
        obj.apply(&patch);
        if kind.is_connector() {
            (obj.x, obj.y, obj.width, obj.height) = (0.0, 0.0, 0.0, 0.0);
        }
        if patch.z_index.is_none() {
            obj.z_index = self.doc.max_z_index() + 1;
        }
        obj.created_by.clone_from(&self.user_id);

        if let Some(temp) = temp_id {
            out.resolved.insert(temp.to_owned(), obj.id.clone());
        }
        self.doc.upsert(obj.clone());
        out.actions.push(Action::ObjectCreated(obj));
        true
    }

    fn batch_update(&mut self, object_id: &str, props: &Map<String, Value>, out: &mut BatchOutcome) -> bool {
        let id = resolve(&out.resolved, object_id);
        let Ok(patch) = serde_json::from_value::<ObjectPatch>(Value::Object(props.clone())) else {
            return false;
        };
        if !self.doc.patch(&id, &patch) {
            return false;
        }
        out.actions.push(Action::ObjectUpdated { id, patch });
        true
    }
}

fn resolve(resolved: &HashMap<String, ObjectId>, id: &str) -> ObjectId {
    resolved.get(id).cloned().unwrap_or_else(|| id.to_owned())
}

/// Pull a connector endpoint out of `props`, preferring the temp-id key.
///
/// A temp id that was never created in this batch is treated as a real id.
fn endpoint(
    props: &mut Map<String, Value>,
    temp_key: &str,
    id_key: &str,
    resolved: &HashMap<String, ObjectId>,
) -> Option<String> {
    let temp = props.remove(temp_key);
    let real = props.remove(id_key);
    let raw = temp.as_ref().and_then(Value::as_str).or_else(|| real.as_ref().and_then(Value::as_str))?;
    Some(resolve(resolved, raw))
}
