//! Extension hook points
//!
//! Stages call [`run_hook`] at fixed points with a typed payload. The
//! extension host receives a tagged [`HookPayload`] and answers with one;
//! for read-write hooks the answer replaces the stage's data, read-only
//! hooks are observed only.
//!
//! ```text
//! stage data ──► HookPayload{hook, data} ──► ExtensionHost
//!     ▲                                          │
//!     └──────── replaced (read-write only) ◄─────┘
//! ```

use crate::candidates::{PayoutCandidate, PayoutCandidateWithBondAmount, PayoutCandidateWithBondAmountAndFee};
use bakepay_core::blueprint::CyclePayoutBlueprint;
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::recipe::PayoutRecipe;
use bakepay_core::report::PayoutReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Named hook points
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    AfterCandidatesGenerated,
    AfterBondsDistributed,
    OnFeesCollection,
    CheckBalance,
    AfterPayoutsBlueprintGenerated,
    AfterPayoutsPrepared,
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AfterCandidatesGenerated => "after_candidates_generated",
            Self::AfterBondsDistributed => "after_bonds_distributed",
            Self::OnFeesCollection => "on_fees_collection",
            Self::CheckBalance => "check_balance",
            Self::AfterPayoutsBlueprintGenerated => "after_payouts_blueprint_generated",
            Self::AfterPayoutsPrepared => "after_payouts_prepared",
        }
    }

    /// Payload schema version
    pub fn version(&self) -> &'static str {
        match self {
            Self::AfterBondsDistributed | Self::OnFeesCollection => "0.2",
            _ => "0.1",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::AfterPayoutsBlueprintGenerated)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfterCandidatesGeneratedData {
    pub cycle: i64,
    pub candidates: Vec<PayoutCandidate>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfterBondsDistributedData {
    pub cycle: i64,
    pub candidates: Vec<PayoutCandidateWithBondAmount>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnFeesCollectionData {
    pub cycle: i64,
    pub candidates: Vec<PayoutCandidateWithBondAmountAndFee>,
}

/// Balance check verdict; `message` carries the reason of a veto
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckBalanceData {
    pub is_sufficient: bool,
    pub skip_tez_check: bool,
    #[serde(default)]
    pub message: String,
    pub payouts: Vec<PayoutCandidateWithBondAmountAndFee>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfterPayoutsPreparedData {
    /// Every recipe of the prepared blueprints
    pub recipes: Vec<PayoutRecipe>,
    #[serde(rename = "payouts")]
    pub valid_payouts: Vec<PayoutRecipe>,
    pub invalid_payouts: Vec<PayoutRecipe>,
    pub reports_of_past_successful_payouts: Vec<PayoutReport>,
}

/// Payload sent to the extension host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "hook", content = "data", rename_all = "snake_case")]
pub enum HookPayload {
    AfterCandidatesGenerated(AfterCandidatesGeneratedData),
    AfterBondsDistributed(AfterBondsDistributedData),
    OnFeesCollection(OnFeesCollectionData),
    CheckBalance(CheckBalanceData),
    AfterPayoutsBlueprintGenerated(CyclePayoutBlueprint),
    AfterPayoutsPrepared(AfterPayoutsPreparedData),
}

impl HookPayload {
    pub fn hook(&self) -> Hook {
        match self {
            Self::AfterCandidatesGenerated(_) => Hook::AfterCandidatesGenerated,
            Self::AfterBondsDistributed(_) => Hook::AfterBondsDistributed,
            Self::OnFeesCollection(_) => Hook::OnFeesCollection,
            Self::CheckBalance(_) => Hook::CheckBalance,
            Self::AfterPayoutsBlueprintGenerated(_) => Hook::AfterPayoutsBlueprintGenerated,
            Self::AfterPayoutsPrepared(_) => Hook::AfterPayoutsPrepared,
        }
    }
}

/// Typed data of one hook point
pub trait HookData: Clone + Sized {
    const HOOK: Hook;

    fn into_payload(self) -> HookPayload;

    fn from_payload(payload: HookPayload) -> Option<Self>;
}

macro_rules! hook_data {
    ($($data:ty => $variant:ident),+ $(,)?) => {$(
        impl HookData for $data {
            const HOOK: Hook = Hook::$variant;

            fn into_payload(self) -> HookPayload {
                HookPayload::$variant(self)
            }

            fn from_payload(payload: HookPayload) -> Option<Self> {
                match payload {
                    HookPayload::$variant(data) => Some(data),
                    _ => None,
                }
            }
        }
    )+};
}

hook_data!(
    AfterCandidatesGeneratedData => AfterCandidatesGenerated,
    AfterBondsDistributedData => AfterBondsDistributed,
    OnFeesCollectionData => OnFeesCollection,
    CheckBalanceData => CheckBalance,
    CyclePayoutBlueprint => AfterPayoutsBlueprintGenerated,
    AfterPayoutsPreparedData => AfterPayoutsPrepared,
);

/// Receiver of hook payloads
pub trait ExtensionHost: Send + Sync {
    fn execute_hook(&self, payload: HookPayload) -> Result<HookPayload>;
}

/// Send `data` through the host; read-write hooks replace it with the answer
pub fn run_hook<D: HookData>(host: &dyn ExtensionHost, data: &mut D) -> Result<()> {
    let hook = D::HOOK;
    debug!(hook = hook.name(), version = hook.version(), "executing hook");
    let answer = host.execute_hook(data.clone().into_payload())?;
    if hook.is_read_only() {
        return Ok(());
    }

    let returned = answer.hook();
    *data = D::from_payload(answer).ok_or_else(|| PayoutError::HookPayloadMismatch {
        hook: hook.name().to_string(),
        returned: returned.name().to_string(),
    })?;
    Ok(())
}

type Handler = Box<dyn Fn(HookPayload) -> Result<HookPayload> + Send + Sync>;

/// In-process extension host. Handlers of one hook run in registration
/// order, each seeing the previous one's output. Empty registries pass
/// payloads through unchanged.
#[derive(Default)]
pub struct HookRegistry {
    handlers: HashMap<Hook, Vec<Handler>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for the hook of `D`
    pub fn on<D, F>(mut self, handler: F) -> Self
    where
        D: HookData + 'static,
        F: Fn(&mut D) -> Result<()> + Send + Sync + 'static,
    {
        let wrapped: Handler = Box::new(move |payload: HookPayload| {
            let returned = payload.hook();
            let mut data = D::from_payload(payload).ok_or_else(|| PayoutError::HookPayloadMismatch {
                hook: D::HOOK.name().to_string(),
                returned: returned.name().to_string(),
            })?;
            handler(&mut data).map_err(|e| match e {
                PayoutError::Hook { .. } => e,
                other => PayoutError::Hook {
                    hook: D::HOOK.name().to_string(),
                    message: other.to_string(),
                },
            })?;
            Ok(data.into_payload())
        });
        self.handlers.entry(D::HOOK).or_default().push(wrapped);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl ExtensionHost for HookRegistry {
    fn execute_hook(&self, payload: HookPayload) -> Result<HookPayload> {
        let Some(handlers) = self.handlers.get(&payload.hook()) else {
            return Ok(payload);
        };
        handlers.iter().try_fold(payload, |payload, handler| handler(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakepay_core::money::Mutez;

    struct Misbehaving;

    impl ExtensionHost for Misbehaving {
        fn execute_hook(&self, _payload: HookPayload) -> Result<HookPayload> {
            Ok(HookPayload::CheckBalance(CheckBalanceData::default()))
        }
    }

    #[test]
    fn test_empty_registry_passes_through() {
        let registry = HookRegistry::new();
        let mut data = AfterCandidatesGeneratedData {
            cycle: 5,
            candidates: vec![PayoutCandidate::default()],
        };
        run_hook(&registry, &mut data).unwrap();
        assert_eq!(data.cycle, 5);
        assert_eq!(data.candidates.len(), 1);
    }

    #[test]
    fn test_read_write_hook_replaces_data() {
        let registry = HookRegistry::new()
            .on(|data: &mut AfterBondsDistributedData| {
                for candidate in &mut data.candidates {
                    candidate.bonds_amount = Mutez::new(42);
                }
                Ok(())
            })
            .on(|data: &mut AfterBondsDistributedData| {
                data.candidates[0].bonds_amount += Mutez::new(1);
                Ok(())
            });
        let mut data = AfterBondsDistributedData {
            cycle: 1,
            candidates: vec![PayoutCandidate::default().with_bond_amount(Mutez::new(7))],
        };
        run_hook(&registry, &mut data).unwrap();
        assert_eq!(data.candidates[0].bonds_amount, Mutez::new(43));
    }

    #[test]
    fn test_read_only_hook_cannot_mutate() {
        let registry = HookRegistry::new().on(|blueprint: &mut CyclePayoutBlueprint| {
            blueprint.cycle = 999;
            Ok(())
        });
        let mut blueprint = CyclePayoutBlueprint {
            cycle: 3,
            ..Default::default()
        };
        run_hook(&registry, &mut blueprint).unwrap();
        assert_eq!(blueprint.cycle, 3);
    }

    #[test]
    fn test_hook_error_is_wrapped() {
        let registry = HookRegistry::new().on(|_: &mut OnFeesCollectionData| {
            Err(PayoutError::Configuration("refused".into()))
        });
        let mut data = OnFeesCollectionData::default();
        let err = run_hook(&registry, &mut data).unwrap_err();
        match err {
            PayoutError::Hook { hook, message } => {
                assert_eq!(hook, "on_fees_collection");
                assert!(message.contains("refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_answer_is_rejected() {
        let mut data = AfterCandidatesGeneratedData::default();
        let err = run_hook(&Misbehaving, &mut data).unwrap_err();
        assert!(matches!(err, PayoutError::HookPayloadMismatch { .. }));
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = AfterCandidatesGeneratedData {
            cycle: 9,
            candidates: vec![],
        }
        .into_payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["hook"], "after_candidates_generated");
        assert_eq!(json["data"]["cycle"], 9);
        assert_eq!(Hook::OnFeesCollection.version(), "0.2");
    }
}
