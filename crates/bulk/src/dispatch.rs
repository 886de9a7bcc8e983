//! Bounded fan-out of per-entity backend calls.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rostra_api::{CourseBackend, OperationDescriptor, RostraError, RostraResult};
use rostra_core::{BulkVerb, EntityId, ItemOutcome};

/// Detail recorded for items the cancellation token kept from being dispatched.
pub const CANCELLED_DETAIL: &str = "cancelled before dispatch";

/// Issue one backend call per entity, at most `concurrency` in flight at a
/// time, and settle every item before returning.
///
/// Outcomes come back in selection order regardless of completion order. A
/// failing call never affects any other call in the batch: HTTP and transport
/// errors are captured per item. The returned `Err` is reserved for contract
/// violations that escape that boundary (a panicking worker, a closed pool).
///
/// Cancelling the token stops admitting not-yet-started items; each of those
/// is reported as a failed outcome with [`CANCELLED_DETAIL`] so that the batch
/// still accounts for the whole selection. Calls already in flight run to
/// completion and report their real outcome.
pub async fn dispatch(
    backend: Arc<dyn CourseBackend>,
    ids: Vec<EntityId>,
    descriptor: &OperationDescriptor,
    concurrency: usize,
    cancel: CancellationToken,
) -> RostraResult<Vec<ItemOutcome>> {
    descriptor.validate()?;
    let total = ids.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let t0 = Instant::now();
    let cap = concurrency.max(1).min(total);
    info!(verb = %descriptor.verb, total, cap, "bulk: dispatch start");

    let semaphore = Arc::new(Semaphore::new(cap));
    let mut join_set: JoinSet<(usize, ItemOutcome)> = JoinSet::new();
    let mut slots: Vec<Option<ItemOutcome>> = (0..total).map(|_| None).collect();

    let verb = descriptor.verb;
    let course = descriptor.course_id.clone();
    let options = descriptor.options.clone();

    for (idx, id) in ids.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => {
                Some(permit.map_err(|_| RostraError::Internal("dispatch pool closed".into()))?)
            }
        };
        let Some(permit) = permit else {
            slots[idx] = Some(ItemOutcome::failure(id, CANCELLED_DETAIL));
            continue;
        };

        let backend = Arc::clone(&backend);
        let course = course.clone();
        let options = options.clone();
        join_set.spawn(async move {
            let _permit = permit;
            let res = match (verb, course.as_deref()) {
                (BulkVerb::Enroll, Some(c)) => backend.enroll_student(c, &id, &options).await,
                (BulkVerb::Remove, Some(c)) => backend.remove_student(c, &id).await,
                (BulkVerb::Delete, _) => backend.delete_student(&id).await,
                _ => Err(RostraError::Validation(format!("{verb} requires a course id"))),
            };
            let outcome = match res {
                Ok(()) => ItemOutcome::success(id),
                Err(e) => {
                    warn!(student = %id, error = %e, "bulk: item failed");
                    ItemOutcome::failure(id, e.to_string())
                }
            };
            (idx, outcome)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(e) => {
                join_set.abort_all();
                return Err(RostraError::Internal(format!("dispatch worker failed: {e}")));
            }
        }
    }

    let outcomes: Vec<ItemOutcome> = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| RostraError::Internal(format!("missing outcome for item {idx}")))
        })
        .collect::<RostraResult<_>>()?;

    let ok = outcomes.iter().filter(|o| o.succeeded).count();
    info!(
        ok,
        failed = total - ok,
        took_ms = %t0.elapsed().as_millis(),
        "bulk: dispatch settled"
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rostra_api::{EnrollOptions, MockBackend};
    use std::time::Duration;

    fn ids(n: usize) -> Vec<EntityId> {
        (1..=n).map(|i| format!("s{i}")).collect()
    }

    #[tokio::test]
    async fn settles_every_item_in_selection_order() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_with("s2", "already enrolled");
        let descriptor = OperationDescriptor::enroll("c1", EnrollOptions::default());
        let outcomes = dispatch(backend.clone(), ids(5), &descriptor, 8, CancellationToken::new())
            .await
            .expect("dispatch");
        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.entity_id, format!("s{}", i + 1));
        }
        assert_eq!(backend.calls(), 5);
    }

    #[tokio::test]
    async fn one_failure_never_affects_the_others() {
        let descriptor = OperationDescriptor::enroll("c1", EnrollOptions::default());

        let clean = Arc::new(MockBackend::new());
        let baseline = dispatch(clean, ids(4), &descriptor, 4, CancellationToken::new())
            .await
            .expect("dispatch");

        let faulty = Arc::new(MockBackend::new());
        faulty.fail_with("s3", "boom");
        let injected = dispatch(faulty, ids(4), &descriptor, 4, CancellationToken::new())
            .await
            .expect("dispatch");

        for (base, inj) in baseline.iter().zip(injected.iter()) {
            if inj.entity_id == "s3" {
                assert!(!inj.succeeded);
                assert_eq!(inj.error_detail.as_deref(), Some("boom"));
            } else {
                assert_eq!(base, inj);
            }
        }
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let backend =
            Arc::new(MockBackend::new().with_latency(Duration::from_millis(30)));
        let descriptor = OperationDescriptor::delete();
        let outcomes = dispatch(backend.clone(), ids(12), &descriptor, 3, CancellationToken::new())
            .await
            .expect("dispatch");
        assert_eq!(outcomes.len(), 12);
        assert!(
            backend.peak_in_flight() <= 3,
            "peak in flight was {}",
            backend.peak_in_flight()
        );
    }

    #[tokio::test]
    async fn cancel_stops_admitting_but_settles_the_batch() {
        let backend =
            Arc::new(MockBackend::new().with_latency(Duration::from_millis(100)));
        let descriptor = OperationDescriptor::delete();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let outcomes = dispatch(backend.clone(), ids(6), &descriptor, 2, cancel)
            .await
            .expect("dispatch");
        assert_eq!(outcomes.len(), 6, "conservation holds under cancellation");
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| o.error_detail.as_deref() == Some(CANCELLED_DETAIL))
            .count();
        assert_eq!(succeeded, 2, "in-flight calls run to completion");
        assert_eq!(cancelled, 4, "unstarted items are reported, not dropped");
    }

    #[tokio::test]
    async fn worker_panic_is_a_contract_violation() {
        let backend = Arc::new(MockBackend::new());
        backend.panic_on("s2");
        let descriptor = OperationDescriptor::delete();
        let err = dispatch(backend, ids(3), &descriptor, 2, CancellationToken::new())
            .await
            .expect_err("panic must escape item capture");
        assert!(matches!(err, RostraError::Internal(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_course_scope_fails_before_any_call() {
        let backend = Arc::new(MockBackend::new());
        let mut descriptor = OperationDescriptor::remove("c1");
        descriptor.course_id = None;
        let err = dispatch(backend.clone(), ids(3), &descriptor, 2, CancellationToken::new())
            .await
            .expect_err("validation");
        assert!(matches!(err, RostraError::Validation(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let backend = Arc::new(MockBackend::new());
        let descriptor = OperationDescriptor::delete();
        let outcomes = dispatch(backend.clone(), Vec::new(), &descriptor, 4, CancellationToken::new())
            .await
            .expect("dispatch");
        assert!(outcomes.is_empty());
        assert_eq!(backend.calls(), 0);
    }
}
