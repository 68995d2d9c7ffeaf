//! Seam to the rules engine.
//!
//! The engine only sees the serialized [`Value`] tree, once per phase, and
//! answers with a [`Verdict`]. Anything from a closure to an out-of-process
//! WAF can sit behind [`RulesEngine`].

use std::fmt;

use crate::blocking::BlockSpec;
use crate::value::Value;

/// Transaction phase a snapshot was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Request headers are ready; nothing was forwarded yet.
    Request,
    /// The upstream response head is known.
    Response,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Request => f.write_str("request"),
            Phase::Response => f.write_str("response"),
        }
    }
}

/// Outcome of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Block(BlockSpec),
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block(_))
    }
}

/// Evaluates snapshots; shared by every connection task.
pub trait RulesEngine: Send + Sync {
    fn evaluate(&self, snapshot: &Value<'_>, phase: Phase) -> Verdict;
}

impl<F> RulesEngine for F
where
    F: Fn(&Value<'_>, Phase) -> Verdict + Send + Sync,
{
    fn evaluate(&self, snapshot: &Value<'_>, phase: Phase) -> Verdict {
        self(snapshot, phase)
    }
}

/// Engine that lets everything through.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl RulesEngine for PassThrough {
    fn evaluate(&self, _snapshot: &Value<'_>, _phase: Phase) -> Verdict {
        Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn test_closure_engine() {
        let engine = |snapshot: &Value<'_>, phase: Phase| {
            let blocked = phase == Phase::Request
                && snapshot
                    .as_map()
                    .get(b"method")
                    .is_some_and(|m| m.as_bytes() == b"TRACE");
            if blocked {
                Verdict::Block(BlockSpec::new(405))
            } else {
                Verdict::Pass
            }
        };

        let arena = Arena::new();
        let mut snapshot = Value::null();
        snapshot.make_map(1, &arena).push(b"method", Value::string(b"TRACE"));

        assert_eq!(
            engine.evaluate(&snapshot, Phase::Request),
            Verdict::Block(BlockSpec::new(405))
        );
        assert_eq!(engine.evaluate(&snapshot, Phase::Response), Verdict::Pass);
    }

    #[test]
    fn test_pass_through() {
        let verdict = PassThrough.evaluate(&Value::null(), Phase::Request);
        assert!(!verdict.is_block());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Request.to_string(), "request");
        assert_eq!(Phase::Response.to_string(), "response");
    }
}
