// ABOUTME: Property tests for fail-mode accounting and the termination policy.
// ABOUTME: Uses proptest to drive resource states with arbitrary failure sequences.

use proptest::prelude::*;
use rolltrack::multitrack::{
    FailMode, FailureOutcome, LifecycleStatus, NEVER_PULL_MARKER, Registry, ResourceState,
    TerminationDecision, TrackSpec, TrackTerminationMode,
};
use rolltrack::types::{ResourceKind, ResourceName};
use tokio_util::sync::CancellationToken;

fn reason() -> impl Strategy<Value = String> {
    "[a-z ]{1,20}"
}

fn termination_mode() -> impl Strategy<Value = TrackTerminationMode> {
    prop_oneof![
        Just(TrackTerminationMode::WaitUntilResourceReady),
        Just(TrackTerminationMode::NonBlocking),
    ]
}

fn kind() -> impl Strategy<Value = ResourceKind> {
    prop::sample::select(ResourceKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn fail_whole_aborts_exactly_after_allowed_failures(
        allowed in 0u32..6,
        reasons in prop::collection::vec(reason(), 1..10),
    ) {
        let mut state = ResourceState::new();
        let mut previous = 0;

        for (i, reason) in reasons.iter().enumerate() {
            let outcome = state
                .on_failure(FailMode::FailWholeDeployProcessImmediately, allowed, reason, &[])
                .unwrap();
            prop_assert!(state.failures_count > previous);
            previous = state.failures_count;

            let nth = i as u32 + 1;
            if nth <= allowed {
                prop_assert!(matches!(outcome, FailureOutcome::Tolerated(_)));
                prop_assert_eq!(state.status, LifecycleStatus::Active);
            } else {
                prop_assert!(matches!(outcome, FailureOutcome::Abort(_)));
                prop_assert_eq!(state.status, LifecycleStatus::Failed);
                prop_assert_eq!(state.failed_reason.as_deref(), Some(reason.as_str()));
                break;
            }
        }
    }

    #[test]
    fn never_pull_aborts_on_first_failure(allowed in 0u32..100, prefix in reason()) {
        let mut state = ResourceState::new();
        let reason = format!("{prefix}: {NEVER_PULL_MARKER}");

        let outcome = state
            .on_failure(FailMode::FailWholeDeployProcessImmediately, allowed, &reason, &[])
            .unwrap();

        prop_assert!(matches!(outcome, FailureOutcome::Abort(_)));
        prop_assert_eq!(state.status, LifecycleStatus::Failed);
        prop_assert_eq!(state.failures_count, 1);
    }

    #[test]
    fn hoping_never_counts_while_others_are_active(
        allowed in 0u32..3,
        reasons in prop::collection::vec(reason(), 1..20),
    ) {
        let mut state = ResourceState::new();
        let others = vec!["sts/db".to_string()];

        for reason in &reasons {
            let outcome = state
                .on_failure(FailMode::HopeUntilEndOfDeployProcess, allowed, reason, &others)
                .unwrap();
            prop_assert!(matches!(outcome, FailureOutcome::Tolerated(_)));
        }

        prop_assert_eq!(state.status, LifecycleStatus::Hoping);
        prop_assert_eq!(state.failures_count, 0);
        prop_assert_eq!(state.hoping_failures_count, reasons.len() as u32);
    }

    #[test]
    fn hoping_counts_once_alone(
        allowed in 0u32..4,
        hoped in 0usize..5,
        reasons in prop::collection::vec(reason(), 1..10),
    ) {
        let mut state = ResourceState::new();
        let others = vec!["deploy/api".to_string()];

        for _ in 0..hoped {
            state
                .on_failure(FailMode::HopeUntilEndOfDeployProcess, allowed, "early", &others)
                .unwrap();
        }

        for (i, reason) in reasons.iter().enumerate() {
            let outcome = state
                .on_failure(FailMode::HopeUntilEndOfDeployProcess, allowed, reason, &[])
                .unwrap();
            let nth = i as u32 + 1;
            prop_assert_eq!(state.failures_count, nth);
            if nth > allowed {
                prop_assert!(matches!(outcome, FailureOutcome::Abort(_)));
                prop_assert_eq!(state.status, LifecycleStatus::Failed);
                break;
            }
            prop_assert_eq!(state.status, LifecycleStatus::ActiveAfterHoping);
        }
    }

    #[test]
    fn ignore_mode_never_fails(
        allowed in 0u32..3,
        reasons in prop::collection::vec(
            prop_oneof![reason(), Just(NEVER_PULL_MARKER.to_string())],
            1..30,
        ),
    ) {
        let mut state = ResourceState::new();

        for reason in &reasons {
            let outcome = state
                .on_failure(FailMode::IgnoreAndContinueDeployProcess, allowed, reason, &[])
                .unwrap();
            prop_assert!(matches!(outcome, FailureOutcome::Tolerated(_)));
        }

        prop_assert_eq!(state.status, LifecycleStatus::Active);
        prop_assert_eq!(state.failures_count, reasons.len() as u32);
        prop_assert!(state.failed_reason.is_none());
    }

    #[test]
    fn canaries_never_tolerate_failures(kind in kind(), requested in prop::option::of(0u32..50)) {
        let mut spec = TrackSpec::new(ResourceName::new("front").unwrap());
        if let Some(count) = requested {
            spec = spec.allow_failures_count(count);
        }

        let resolved = spec.resolve(kind);
        match kind {
            ResourceKind::Canary => prop_assert_eq!(resolved.allow_failures_count, 0),
            _ => prop_assert_eq!(resolved.allow_failures_count, requested.unwrap_or(1)),
        }
    }

    #[test]
    fn termination_fires_iff_every_in_flight_resource_is_non_blocking(
        resources in prop::collection::vec((termination_mode(), any::<bool>()), 1..8),
    ) {
        let mut registry = Registry::new();
        let mut in_flight = Vec::new();

        for (i, (mode, running)) in resources.iter().enumerate() {
            let spec = TrackSpec::new(ResourceName::new(&format!("r{i}")).unwrap())
                .termination_mode(*mode)
                .resolve(ResourceKind::Deployment);
            let cancel = CancellationToken::new();
            let key = registry.insert(ResourceKind::Deployment, spec, cancel.clone());
            if *running {
                in_flight.push((key, *mode, cancel));
            } else {
                registry.release(&key);
            }
        }

        let expect_termination = in_flight
            .iter()
            .all(|(_, mode, _)| *mode == TrackTerminationMode::NonBlocking);

        match registry.apply_termination_mode() {
            TerminationDecision::Terminated { cancelled } => {
                prop_assert!(expect_termination);
                prop_assert_eq!(cancelled.len(), in_flight.len());
                prop_assert!(in_flight.iter().all(|(_, _, cancel)| cancel.is_cancelled()));
                prop_assert!(registry.is_terminating());
                prop_assert_eq!(
                    registry.apply_termination_mode(),
                    TerminationDecision::AlreadyTerminating
                );
            }
            TerminationDecision::Continue { blocking } => {
                prop_assert!(!expect_termination);
                prop_assert!(registry.is_in_flight(&blocking));
                prop_assert!(in_flight.iter().all(|(_, _, cancel)| !cancel.is_cancelled()));
            }
            TerminationDecision::AlreadyTerminating => {
                prop_assert!(false, "fresh registry reported prior termination");
            }
        }
    }
}
