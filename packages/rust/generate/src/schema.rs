//! Parsing and validation of generation responses.
//!
//! Providers return free text that must parse into the expected JSON
//! shape. Items missing required fields are dropped; a response with too
//! few surviving items, or counts outside the effort-to-count policy,
//! fails validation and triggers the cascade's single-retry rule.

use serde::Deserialize;

use ideaforge_shared::{BuildStep, EffortLevel, IdeaOutline};

/// A parsed ideas response must keep at least this many valid items.
pub const MIN_IDEAS: usize = 5;

/// Per effort level, a generated set must have between these many ideas.
pub const IDEAS_PER_LEVEL_MIN: usize = 2;
pub const IDEAS_PER_LEVEL_MAX: usize = 4;

/// A build plan needs at least this many steps to be actionable.
pub const MIN_PLAN_STEPS: usize = 3;

// ---------------------------------------------------------------------------
// Draft shapes (no ids yet — the service assigns those)
// ---------------------------------------------------------------------------

/// A generated idea before id assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct IdeaDraft {
    pub title: String,
    pub summary: String,
    pub effort: EffortLevel,
    #[serde(default)]
    pub outline: IdeaOutline,
    #[serde(default)]
    pub inspired_by: Option<String>,
}

/// A generated build plan before it is tied to an idea id.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDraft {
    pub setup_script: String,
    pub folder_name: String,
    pub steps: Vec<BuildStep>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IdeasEnvelope {
    ideas: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IdeaEnvelope {
    idea: serde_json::Value,
}

/// Parse an ideas response. Invalid items are dropped; fewer than
/// [`MIN_IDEAS`] survivors is a schema failure.
pub fn parse_ideas(text: &str) -> Result<Vec<IdeaDraft>, String> {
    let json = extract_json(text).ok_or("no JSON object found in response")?;

    let envelope: IdeasEnvelope = serde_json::from_str(&json)
        .map_err(|e| format!("response did not match the ideas schema: {e}"))?;

    let total = envelope.ideas.len();
    let drafts: Vec<IdeaDraft> = envelope
        .ideas
        .into_iter()
        .filter_map(|value| serde_json::from_value::<IdeaDraft>(value).ok())
        .filter(|draft| !draft.title.trim().is_empty() && !draft.summary.trim().is_empty())
        .collect();

    if drafts.len() < MIN_IDEAS {
        return Err(format!(
            "only {} of {total} ideas were valid (minimum {MIN_IDEAS})",
            drafts.len()
        ));
    }

    Ok(drafts)
}

/// Parse a single-idea response (custom idea flow).
pub fn parse_idea(text: &str) -> Result<IdeaDraft, String> {
    let json = extract_json(text).ok_or("no JSON object found in response")?;

    // Accept either {"idea": {...}} or a bare idea object.
    if let Ok(envelope) = serde_json::from_str::<IdeaEnvelope>(&json) {
        return serde_json::from_value(envelope.idea)
            .map_err(|e| format!("idea did not match schema: {e}"));
    }

    serde_json::from_str(&json).map_err(|e| format!("idea did not match schema: {e}"))
}

/// Parse a build-plan response.
pub fn parse_plan(text: &str) -> Result<PlanDraft, String> {
    let json = extract_json(text).ok_or("no JSON object found in response")?;

    let plan: PlanDraft = serde_json::from_str(&json)
        .map_err(|e| format!("response did not match the plan schema: {e}"))?;

    if plan.steps.len() < MIN_PLAN_STEPS {
        return Err(format!(
            "plan has {} steps (minimum {MIN_PLAN_STEPS})",
            plan.steps.len()
        ));
    }

    Ok(plan)
}

/// Pull a JSON object out of a response that may be wrapped in markdown
/// fences or prose.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();

    // Strip a ```json … ``` fence when present
    let inner = if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        match after.find("```") {
            Some(end) => after[..end].trim(),
            None => after.trim(),
        }
    } else {
        trimmed
    };

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(inner[start..=end].to_string())
}

// ---------------------------------------------------------------------------
// Domain validation
// ---------------------------------------------------------------------------

/// Effort-to-count policy: every level present, each within range.
pub fn validate_idea_set(drafts: &[IdeaDraft]) -> Result<(), String> {
    for level in EffortLevel::all() {
        let count = drafts.iter().filter(|d| d.effort == level).count();
        if count < IDEAS_PER_LEVEL_MIN || count > IDEAS_PER_LEVEL_MAX {
            return Err(format!(
                "effort level {} has {count} ideas (expected {IDEAS_PER_LEVEL_MIN}-{IDEAS_PER_LEVEL_MAX})",
                level.as_str()
            ));
        }
    }
    Ok(())
}

/// A custom idea must actually reference the caller's description:
/// at least one significant word from it must appear in the title or
/// summary.
pub fn validate_custom_idea(draft: &IdeaDraft, description: &str) -> Result<(), String> {
    let haystack = format!("{} {}", draft.title, draft.summary).to_lowercase();

    let mut significant = description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 5)
        .peekable();

    if significant.peek().is_none() {
        return Ok(()); // nothing checkable to reference
    }

    if significant.any(|w| haystack.contains(&w.to_lowercase())) {
        Ok(())
    } else {
        Err("generated idea does not reference the requested description".into())
    }
}

/// Order ideas lowest effort first, stable within a level.
pub fn sort_by_effort(drafts: &mut [IdeaDraft]) {
    drafts.sort_by_key(|d| d.effort);
}
