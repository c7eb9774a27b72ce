use serde_json::json;
use sha2::{Digest, Sha256};

use crate::models::{DispatchPlan, Intent, SourceCall};

fn digest(canonical: &serde_json::Value) -> String {
    let hash = Sha256::digest(canonical.to_string().as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Key for a fully synthesized answer: normalized intent plus plan signature.
pub fn answer_key(intent: &Intent, plan: &DispatchPlan) -> String {
    format!(
        "answer:{}",
        digest(&json!({
            "intent": intent.normalized(),
            "plan": plan.signature(),
        }))
    )
}

/// Key for one source call's records. The call's label is not part of the
/// key; two plans asking the same endpoint the same thing share an entry.
pub fn call_key(call: &SourceCall) -> String {
    format!(
        "call:{}",
        digest(&json!({
            "source": call.source,
            "endpoint": call.endpoint,
            "params": call.params,
        }))
    )
}

/// Pre-resolution fast path: same session, same normalized text.
pub fn raw_query_key(session_id: &str, normalized_text: &str) -> String {
    format!(
        "raw:{}",
        digest(&json!({"session": session_id, "text": normalized_text}))
    )
}
