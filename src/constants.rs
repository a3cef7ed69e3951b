//! Workflow state enumerations
//!
//! Every state is stored and serialized by its short string code. Labels are
//! the human readable names shown by clients.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored code does not name a known state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: String,
}

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} code '{}'", self.kind, self.code)
    }
}

impl std::error::Error for UnknownCode {}

/// Declares a string coded enum with `as_str`, `label`, `ALL`, `Display` and `FromStr`.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($code:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownCode { kind: $kind, code: s.to_string() }),
                }
            }
        }
    };
}

coded_enum! {
    /// Lifecycle state of a source
    SourceState, "source state" {
        Voting => ("voting", "Voting"),
        Duplicity => ("duplicity", "Duplicated record"),
        Waiting => ("waiting", "Waiting for response"),
        Reevaluation => ("reevaluation", "Waiting for reevaluation"),
        TechnicalReview => ("technical", "Technical review"),
        Communicating => ("communication", "In communication"),
        AcceptedByStaff => ("vote_accepted", "Accepted by staff"),
        DeclinedByStaff => ("vote_declined", "Declined by staff"),
        /// Archiving accepted by the publisher
        Running => ("success", "Archiving accepted"),
        WithoutPublisher => ("forced", "Archiving without publisher consent"),
        DeclinedByPublisher => ("declined", "Declined by publisher"),
        PublisherIgnoredRequest => ("ignored", "Publisher ignored requests"),
        ContractExpired => ("expired", "Contract expired"),
        ContractTerminated => ("terminated", "Contract terminated"),
    }
}

impl Default for SourceState {
    fn default() -> Self {
        SourceState::Voting
    }
}

/// States in which a source may still end up archived
pub const STATES_WITH_POTENTIAL: &[SourceState] = &[
    SourceState::Voting,
    SourceState::Waiting,
    SourceState::Communicating,
    SourceState::ContractExpired,
];

/// States in which staff are expected to vote
pub const VOTE_STATES: &[SourceState] = &[SourceState::Voting, SourceState::Reevaluation];

/// States in which the source is being harvested
pub const ARCHIVING_STATES: &[SourceState] = &[SourceState::Running, SourceState::WithoutPublisher];

impl SourceState {
    /// Bootstrap-like color class used by clients
    pub fn color(&self) -> &'static str {
        use SourceState::*;
        match self {
            Running | WithoutPublisher => "success",
            Voting | Communicating | AcceptedByStaff | Waiting => "info",
            TechnicalReview | Reevaluation | Duplicity => "warning",
            DeclinedByPublisher | DeclinedByStaff | PublisherIgnoredRequest | ContractExpired
            | ContractTerminated => "danger",
        }
    }

    pub fn is_vote_state(&self) -> bool {
        VOTE_STATES.contains(self)
    }

    pub fn is_archiving(&self) -> bool {
        ARCHIVING_STATES.contains(self)
    }

    pub fn has_potential(&self) -> bool {
        STATES_WITH_POTENTIAL.contains(self)
    }
}

coded_enum! {
    /// State of a voting round; also the set of decisions it can resolve to
    VoteState, "voting round state" {
        Initial => ("initial", "Voting in progress"),
        Approve => ("approve", "Approved"),
        Decline => ("decline", "Declined"),
        Wait => ("wait", "Wait for reevaluation"),
        Technical => ("technical", "Needs technical review"),
    }
}

impl Default for VoteState {
    fn default() -> Self {
        VoteState::Initial
    }
}

impl VoteState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, VoteState::Initial)
    }
}

coded_enum! {
    /// A single staff member's vote
    VoteDecision, "vote decision" {
        Approve => ("approve", "Approve"),
        Decline => ("decline", "Decline"),
        Wait => ("wait", "Wait"),
        Technical => ("technical", "Technical review"),
    }
}

impl From<VoteDecision> for VoteState {
    fn from(decision: VoteDecision) -> Self {
        match decision {
            VoteDecision::Approve => VoteState::Approve,
            VoteDecision::Decline => VoteState::Decline,
            VoteDecision::Wait => VoteState::Wait,
            VoteDecision::Technical => VoteState::Technical,
        }
    }
}

coded_enum! {
    ContractState, "contract state" {
        Negotiation => ("NEGOTIATION", "Contract in negotiation"),
        Declined => ("DECLINED", "Publisher declined"),
        Valid => ("VALID", "Contract is valid"),
        Expired => ("EXPIRED", "Contract expired"),
    }
}

impl Default for ContractState {
    fn default() -> Self {
        ContractState::Negotiation
    }
}

coded_enum! {
    ContractType, "contract type" {
        CreativeCommons => ("CCOMMONS", "Creative commons"),
        Proprietary => ("PROPRIETARY", "Proprietary"),
    }
}

coded_enum! {
    SeedState, "seed state" {
        Include => ("inc", "Include in harvest"),
        Exclude => ("exc", "Exclude from harvest"),
        Old => ("old", "Seed is no longer published"),
    }
}

impl Default for SeedState {
    fn default() -> Self {
        SeedState::Include
    }
}

impl SeedState {
    pub fn color(&self) -> &'static str {
        match self {
            SeedState::Include => "info",
            SeedState::Exclude | SeedState::Old => "danger",
        }
    }
}

coded_enum! {
    /// Who suggested the source for archiving
    SuggestedBy, "suggestion origin" {
        Publisher => ("publisher", "Publisher"),
        Visitor => ("visitor", "Visitor"),
        Issn => ("issn", "ISSN"),
        Curator => ("curator", "Curator"),
    }
}

/// Harvest frequency, encoded as the number of harvests per year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Frequency {
    OnceOnly,
    Yearly,
    TwiceAYear,
    Quarterly,
    EveryTwoMonths,
    Monthly,
    Weekly,
    Daily,
}

impl Frequency {
    pub const ALL: &'static [Frequency] = &[
        Frequency::OnceOnly,
        Frequency::Yearly,
        Frequency::TwiceAYear,
        Frequency::Quarterly,
        Frequency::EveryTwoMonths,
        Frequency::Monthly,
        Frequency::Weekly,
        Frequency::Daily,
    ];

    pub fn code(&self) -> u16 {
        match self {
            Frequency::OnceOnly => 0,
            Frequency::Yearly => 1,
            Frequency::TwiceAYear => 2,
            Frequency::Quarterly => 4,
            Frequency::EveryTwoMonths => 6,
            Frequency::Monthly => 12,
            Frequency::Weekly => 52,
            Frequency::Daily => 365,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::OnceOnly => "Once only",
            Frequency::Yearly => "Once a year",
            Frequency::TwiceAYear => "Twice a year",
            Frequency::Quarterly => "Quarterly",
            Frequency::EveryTwoMonths => "Every two months",
            Frequency::Monthly => "Every month",
            Frequency::Weekly => "Weekly",
            Frequency::Daily => "Daily",
        }
    }

    /// Date of the harvest following one made at `from`, `None` for one-off harvests
    pub fn next_harvest(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Frequency::OnceOnly => None,
            Frequency::Yearly => from.checked_add_months(Months::new(12)),
            Frequency::TwiceAYear => from.checked_add_months(Months::new(6)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::EveryTwoMonths => from.checked_add_months(Months::new(2)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Frequency::Daily => from.checked_add_signed(Duration::days(1)),
        }
    }
}

impl From<Frequency> for u16 {
    fn from(frequency: Frequency) -> Self {
        frequency.code()
    }
}

impl TryFrom<u16> for Frequency {
    type Error = UnknownCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Frequency::ALL
            .iter()
            .copied()
            .find(|f| f.code() == code)
            .ok_or_else(|| UnknownCode {
                kind: "harvest frequency",
                code: code.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_state_codes_round_trip() {
        assert_eq!(SourceState::ALL.len(), 14);
        for state in SourceState::ALL {
            assert_eq!(state.as_str().parse::<SourceState>().unwrap(), *state);
        }
        assert_eq!(SourceState::Running.as_str(), "success");
        assert!("bogus".parse::<SourceState>().is_err());
    }

    #[test]
    fn test_source_state_groups() {
        assert!(SourceState::Voting.is_vote_state());
        assert!(SourceState::Reevaluation.is_vote_state());
        assert!(!SourceState::TechnicalReview.is_vote_state());
        assert!(SourceState::WithoutPublisher.is_archiving());
        assert!(SourceState::ContractExpired.has_potential());
        assert_eq!(SourceState::DeclinedByStaff.color(), "danger");
        assert_eq!(SourceState::Duplicity.color(), "warning");
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&ContractState::Negotiation).unwrap();
        assert_eq!(json, "\"NEGOTIATION\"");
        let state: SeedState = serde_json::from_str("\"exc\"").unwrap();
        assert_eq!(state, SeedState::Exclude);
        assert_eq!(state.color(), "danger");
        assert_eq!(serde_json::to_string(&Frequency::Weekly).unwrap(), "52");
        assert!(serde_json::from_str::<Frequency>("3").is_err());
    }

    #[test]
    fn test_next_harvest() {
        let from = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(Frequency::OnceOnly.next_harvest(from), None);
        assert_eq!(
            Frequency::Monthly.next_harvest(from),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Frequency::Yearly.next_harvest(from),
            Some(Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Frequency::Weekly.next_harvest(from),
            Some(Utc.with_ymd_and_hms(2024, 2, 7, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_vote_decision_maps_to_round_state() {
        assert_eq!(VoteState::from(VoteDecision::Wait), VoteState::Wait);
        assert!(!VoteState::Initial.is_resolved());
        assert!(VoteState::Decline.is_resolved());
    }
}
