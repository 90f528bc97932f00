//! Derived story metrics echoed back by the narration backend
//!
//! The backend may append a structured block of numeric metrics to its
//! response. The block is loosely typed by nature - the backend can omit,
//! malform, or invent fields - so folding only accepts the known numeric
//! keys and ignores everything else. A malformed block never fails a turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Evolving story metrics attached to a room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub tension_level: f64,
    pub sync_score: f64,
    pub world_reactivity: f64,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            tension_level: 2.0,
            sync_score: 2.0,
            world_reactivity: 1.0,
        }
    }
}

impl WorldState {
    /// Fold recognized numeric fields from a metrics block; everything else
    /// is ignored.
    pub fn fold(&mut self, block: &Value) {
        let Some(obj) = block.as_object() else {
            return;
        };
        if let Some(v) = obj.get("tension_level").and_then(Value::as_f64) {
            self.tension_level = v;
        }
        if let Some(v) = obj.get("sync_score").and_then(Value::as_f64) {
            self.sync_score = v;
        }
        if let Some(v) = obj.get("world_reactivity").and_then(Value::as_f64) {
            self.world_reactivity = v;
        }
    }

    /// End-of-session predicate over the folded metrics.
    pub fn story_concluded(&self) -> bool {
        self.sync_score > 3.0 || self.tension_level >= 5.0
    }
}

/// Split narration text from an optional trailing JSON metrics block.
///
/// Returns the display text (block stripped) and the parsed block when one
/// is present and parses cleanly. Tolerates a trailing ```-fenced block.
/// Anything that does not parse is left in place and reported as absent.
pub fn split_trailing_metrics(text: &str) -> (String, Option<Value>) {
    let trimmed = text.trim_end();
    let mut body = trimmed;
    let fenced = body.ends_with("```");
    if fenced {
        body = body[..body.len() - 3].trim_end();
    }
    if !body.ends_with('}') {
        return (text.to_string(), None);
    }

    // Scan backward balancing braces to find the candidate object start.
    // Braces inside JSON strings break the balance; the parse below then
    // fails and the block is treated as absent.
    let bytes = body.as_bytes();
    let mut depth = 0i32;
    let mut start = None;
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'}' => depth += 1,
            b'{' => {
                depth -= 1;
                if depth == 0 {
                    start = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(start) = start else {
        return (text.to_string(), None);
    };

    match serde_json::from_str::<Value>(&body[start..]) {
        Ok(value) if value.is_object() => {
            let mut prefix = body[..start].trim_end();
            if fenced {
                if let Some(p) = prefix.strip_suffix("```json") {
                    prefix = p;
                } else if let Some(p) = prefix.strip_suffix("```") {
                    prefix = p;
                }
            }
            (prefix.trim_end().to_string(), Some(value))
        }
        _ => (text.to_string(), None),
    }
}
