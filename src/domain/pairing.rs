//! Pairing/connection transition table.
//!
//! ```text
//! Discovered --pair--> Bonding --bonded--> Paired --connect--> Connected
//!      |                  |                              ^
//!      |                  +--none--> Discovered          |
//!      +----------------------connect--------------------+
//! ```
//!
//! Paired and Connected never go back to Discovered, and nothing leaves
//! Connected. Closing channels is the gateway's teardown concern.

use crate::domain::models::{BondOutcome, PairingState};

/// Something that may move a device to another pairing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingTrigger {
    /// The native bond request was accepted
    PairRequested,
    /// The radio reported bonding in progress
    BondProgressing,
    /// The radio reported the bond as established
    BondConfirmed,
    /// The radio reported no bond
    BondRemoved,
    /// The radio returned an open channel
    ConnectEstablished,
}

impl From<BondOutcome> for PairingTrigger {
    fn from(outcome: BondOutcome) -> Self {
        match outcome {
            BondOutcome::None => Self::BondRemoved,
            BondOutcome::Bonding => Self::BondProgressing,
            BondOutcome::Bonded => Self::BondConfirmed,
        }
    }
}

impl PairingState {
    /// Target state for `trigger`, or `None` if the transition is not allowed.
    pub fn next(self, trigger: PairingTrigger) -> Option<PairingState> {
        use PairingState::*;
        use PairingTrigger::*;

        match (self, trigger) {
            (Discovered, PairRequested | BondProgressing) => Some(Bonding),
            (Discovered | Bonding, BondConfirmed) => Some(Paired),
            (Bonding, BondRemoved) => Some(Discovered),
            (Discovered | Paired, ConnectEstablished) => Some(Connected),
            _ => None,
        }
    }

    pub fn can_pair(self) -> bool {
        self.next(PairingTrigger::PairRequested).is_some()
    }

    pub fn can_connect(self) -> bool {
        self.next(PairingTrigger::ConnectEstablished).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PairingState::*;
    use PairingTrigger::*;

    const ALL_STATES: [PairingState; 4] = [Discovered, Bonding, Paired, Connected];
    const ALL_TRIGGERS: [PairingTrigger; 5] = [
        PairRequested,
        BondProgressing,
        BondConfirmed,
        BondRemoved,
        ConnectEstablished,
    ];

    #[test]
    fn test_happy_path() {
        let bonding = Discovered.next(PairRequested).unwrap();
        assert_eq!(bonding, Bonding);
        let paired = bonding.next(BondConfirmed).unwrap();
        assert_eq!(paired, Paired);
        assert_eq!(paired.next(ConnectEstablished), Some(Connected));
    }

    #[test]
    fn test_connected_is_final() {
        for trigger in ALL_TRIGGERS {
            assert_eq!(Connected.next(trigger), None, "{:?}", trigger);
        }
    }

    #[test]
    fn test_bonded_states_never_return_to_discovered() {
        for state in [Paired, Connected] {
            for trigger in ALL_TRIGGERS {
                assert_ne!(state.next(trigger), Some(Discovered));
            }
        }
    }

    #[test]
    fn test_bond_failure_rolls_back() {
        assert_eq!(Bonding.next(BondRemoved), Some(Discovered));
        assert_eq!(Paired.next(BondRemoved), None);
    }

    #[test]
    fn test_pair_and_connect_guards() {
        let pairable: Vec<_> = ALL_STATES.into_iter().filter(|s| s.can_pair()).collect();
        assert_eq!(pairable, vec![Discovered]);

        let connectable: Vec<_> = ALL_STATES.into_iter().filter(|s| s.can_connect()).collect();
        assert_eq!(connectable, vec![Discovered, Paired]);
    }

    #[test]
    fn test_bond_outcome_mapping() {
        assert_eq!(PairingTrigger::from(BondOutcome::Bonded), BondConfirmed);
        assert_eq!(PairingTrigger::from(BondOutcome::Bonding), BondProgressing);
        assert_eq!(PairingTrigger::from(BondOutcome::None), BondRemoved);
    }
}
