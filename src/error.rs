use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Taskweave.
///
/// One variant per subsystem, each wrapping that subsystem's own enum, so
/// callers can match to pick a recovery strategy. Internal plumbing stays on
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WeaveError {
    // ── Plan structure ──────────────────────────────────────────────────
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    // ── Plan generation ─────────────────────────────────────────────────
    #[error("planning: {0}")]
    Planning(#[from] PlanningError),

    // ── Agent gateway ───────────────────────────────────────────────────
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Team / manager mode ─────────────────────────────────────────────
    #[error("team: {0}")]
    Team(#[from] TeamError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Plan validation errors ──────────────────────────────────────────────────

/// Rejections raised before any task is dispatched.
///
/// Checks run in declaration order and short-circuit on the first failure, so
/// a malformed plan never produces partial side effects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate task id: {task_id}")]
    DuplicateTaskId { task_id: String },

    #[error("task {task_id} references unknown prerequisite: {prerequisite}")]
    UnknownPrerequisite {
        task_id: String,
        prerequisite: String,
    },

    #[error("task {task_id} lists itself as a prerequisite")]
    SelfReference { task_id: String },

    #[error("task {task_id} is assigned to unknown agent: {agent}")]
    UnknownAgent { task_id: String, agent: String },

    #[error(
        "task {task_id} in step {step} depends on {prerequisite} in step {prerequisite_step}"
    )]
    StepOrder {
        task_id: String,
        step: u32,
        prerequisite: String,
        prerequisite_step: u32,
    },
}

// ─── Planning errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlanningError {
    /// The planning collaborator declared the goal unreachable. Carries its
    /// stated reasoning verbatim; the builder does not retry.
    #[error("goal unreachable: {reasoning}")]
    Unreachable { reasoning: String },

    /// The collaborator said it could succeed but returned a structure the
    /// validator rejected.
    #[error("malformed plan: {0}")]
    Malformed(#[from] ValidationError),

    #[error("planner declared success but returned no steps")]
    MissingSteps,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ─── Gateway errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("agent {agent} request failed: {message}")]
    Request { agent: String, message: String },

    #[error("agent {agent} returned status {status_code}: {detail}")]
    Status {
        agent: String,
        status_code: u16,
        detail: String,
    },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("response decode failed: {0}")]
    Decode(String),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Team / manager mode errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("manager aborted: {reason}")]
    ManagerAborted { reason: String },

    #[error("manager exceeded {max_rounds} rounds without providing a result")]
    RoundsExhausted { max_rounds: u32 },

    #[error("manager assigned a task to unknown agent: {agent}")]
    UnknownAgent { agent: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ─── Convenience re-exports ──────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, WeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_offending_ids() {
        let err = ValidationError::UnknownPrerequisite {
            task_id: "write".into(),
            prerequisite: "research".into(),
        };
        assert_eq!(
            err.to_string(),
            "task write references unknown prerequisite: research"
        );
    }

    #[test]
    fn planning_unreachable_carries_reasoning() {
        let err = WeaveError::Planning(PlanningError::Unreachable {
            reasoning: "no agent can browse the web".into(),
        });
        assert!(err.to_string().contains("no agent can browse the web"));
    }

    #[test]
    fn malformed_plan_wraps_validation() {
        let err = PlanningError::from(ValidationError::SelfReference {
            task_id: "t1".into(),
        });
        assert!(matches!(err, PlanningError::Malformed(_)));
        assert!(err.to_string().contains("t1"));
    }

    #[test]
    fn gateway_status_displays_code_and_detail() {
        let err = GatewayError::Status {
            agent: "writer:0.1".into(),
            status_code: 502,
            detail: "upstream unavailable".into(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let weave_err: WeaveError = anyhow_err.into();
        assert!(weave_err.to_string().contains("something went wrong"));
    }
}
