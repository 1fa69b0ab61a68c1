//! Message-exchange-pattern gate.
//!
//! Profiles with different MEPs are never compared: an IN_ONLY request cannot
//! be served by an OUT_ONLY advertisement no matter how their concepts relate.
//! The gate runs before any checklist is built or consulted.

use semreg_profile::{FunctionalProfile, Mep};

/// Outcome of gating one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Comparable(Mep),
    Incompatible { anchor: Mep, candidate: Mep },
}

impl Gate {
    pub fn check(anchor: &FunctionalProfile, candidate: &FunctionalProfile) -> Self {
        if anchor.mep() == candidate.mep() {
            Gate::Comparable(anchor.mep())
        } else {
            Gate::Incompatible {
                anchor: anchor.mep(),
                candidate: candidate.mep(),
            }
        }
    }

    pub fn is_comparable(self) -> bool {
        matches!(self, Gate::Comparable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, inputs: &[&str], outputs: &[&str]) -> FunctionalProfile {
        FunctionalProfile::from_uris(
            &format!("http://example.org/p#{id}"),
            "http://example.org/animals#Dog",
            inputs,
            outputs,
        )
        .unwrap()
    }

    #[test]
    fn same_mep_is_comparable() {
        let a = profile("A", &["http://example.org/m#Weight"], &[]);
        let b = profile("B", &["http://example.org/m#Height"], &[]);
        assert_eq!(Gate::check(&a, &b), Gate::Comparable(Mep::InOnly));
    }

    #[test]
    fn in_out_does_not_gate_through_in_only() {
        let a = profile("A", &["http://example.org/m#Weight"], &[]);
        let b = profile(
            "B",
            &["http://example.org/m#Weight"],
            &["http://example.org/m#Price"],
        );
        let gate = Gate::check(&a, &b);
        assert!(!gate.is_comparable());
        assert_eq!(
            gate,
            Gate::Incompatible {
                anchor: Mep::InOnly,
                candidate: Mep::InOut
            }
        );
    }
}
