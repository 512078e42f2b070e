/// Opening block used when the caller supplies no base instructions.
pub const DEFAULT_PERSONA: &str = "You are a helpful coding and research assistant. \
Answer precisely, prefer working examples over prose, and say so when you are unsure.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

impl AccessPolicy {
    /// Exactly three values are recognized; anything else is dropped by
    /// the composer without error.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "read-only" => Some(Self::ReadOnly),
            "workspace-write" => Some(Self::WorkspaceWrite),
            "danger-full-access" => Some(Self::DangerFullAccess),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadOnly => {
                "Sandbox policy: read-only. You may inspect files but must not modify anything."
            }
            Self::WorkspaceWrite => {
                "Sandbox policy: workspace-write. You may modify files inside the working directory only."
            }
            Self::DangerFullAccess => {
                "Sandbox policy: danger-full-access. All file and command operations are permitted."
            }
        }
    }
}

/// Assembles the system instruction from optional configuration fragments,
/// always in the same order: base (or default persona), working directory,
/// sandbox description, developer block.
pub fn compose(
    base: Option<&str>,
    working_directory: Option<&str>,
    sandbox: Option<&str>,
    developer_instructions: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);
    parts.push(base.unwrap_or(DEFAULT_PERSONA).to_string());
    if let Some(cwd) = working_directory {
        parts.push(format!("Working directory: {cwd}"));
    }
    if let Some(policy) = sandbox.and_then(AccessPolicy::parse) {
        parts.push(policy.description().to_string());
    }
    if let Some(dev) = developer_instructions {
        parts.push(format!("Developer instructions:\n{dev}"));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_optional_fields_yields_default_persona_exactly() {
        assert_eq!(compose(None, None, None, None), DEFAULT_PERSONA);
    }

    #[test]
    fn base_instructions_replace_the_persona_verbatim() {
        let composed = compose(Some("Be terse."), None, None, None);
        assert_eq!(composed, "Be terse.");
    }

    #[test]
    fn all_fields_appear_in_fixed_order() {
        let composed = compose(
            Some("Be terse."),
            Some("/srv/app"),
            Some("workspace-write"),
            Some("Always run the linter."),
        );
        let base_at = composed.find("Be terse.").unwrap();
        let cwd_at = composed.find("Working directory: /srv/app").unwrap();
        let policy_at = composed.find("Sandbox policy: workspace-write").unwrap();
        let dev_at = composed
            .find("Developer instructions:\nAlways run the linter.")
            .unwrap();
        assert!(base_at < cwd_at && cwd_at < policy_at && policy_at < dev_at);
    }

    #[test]
    fn unrecognized_sandbox_value_is_silently_dropped() {
        let composed = compose(None, None, Some("yolo"), None);
        assert_eq!(composed, DEFAULT_PERSONA);
    }

    #[test]
    fn sandbox_values_map_to_fixed_descriptions() {
        for (raw, needle) in [
            ("read-only", "read-only"),
            ("workspace-write", "workspace-write"),
            ("danger-full-access", "danger-full-access"),
        ] {
            let composed = compose(None, None, Some(raw), None);
            assert!(composed.contains(&format!("Sandbox policy: {needle}")));
        }
    }
}
