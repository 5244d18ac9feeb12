//! Reconciliation worker - applies module diffs to a set
//!
//! Diffs of one set are applied strictly in order, one remote mutation per
//! diff (plus a template read for additions), and the run stops at the
//! first failure. Nothing is rolled back: a failed run leaves the diffs
//! before the failure converged and the rest untouched, and re-running the
//! sync with a fresh diff picks up where it stopped.

use crate::client::TopoClient;
use crate::context::{NoProgress, ProgressCallback, RequestContext};
use crate::diff::{ModuleAction, ModuleDiff};
use crate::error::{Error, Result};
use crate::types::{CreateModule, SetInst, SyncOutcome, SyncSummary, UpdateModule};

/// Applies module diffs through a [`TopoClient`]
///
/// The worker keeps no state between calls; it can be shared across
/// threads to sync different sets concurrently. Callers must not run two
/// syncs of the same set at once.
#[derive(Debug, Clone)]
pub struct BackendWorker<C> {
    client: C,
}

impl<C: TopoClient> BackendWorker<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Apply a single module diff to `set`
    ///
    /// Errors are wrapped in [`Error::Sync`] naming the set, the diff and
    /// the request id.
    pub fn apply(
        &self,
        ctx: &RequestContext,
        set: &SetInst,
        diff: &ModuleDiff,
    ) -> Result<SyncOutcome> {
        self.apply_at(ctx, set, 0, diff)
    }

    /// Apply `diffs` in order, stopping at the first error
    ///
    /// Diffs after a failing one are never attempted.
    pub fn apply_all(
        &self,
        ctx: &RequestContext,
        set: &SetInst,
        diffs: &[ModuleDiff],
    ) -> Result<SyncSummary> {
        self.apply_all_with_progress(ctx, set, diffs, &mut NoProgress)
    }

    /// Same as [`apply_all`](Self::apply_all), reporting each diff to `progress`
    pub fn apply_all_with_progress<P: ProgressCallback>(
        &self,
        ctx: &RequestContext,
        set: &SetInst,
        diffs: &[ModuleDiff],
        progress: &mut P,
    ) -> Result<SyncSummary> {
        log::info!(
            "syncing {} module diffs for {}, rid: {}",
            diffs.len(),
            set,
            ctx.rid()
        );
        progress.on_set_start(set, diffs.len());

        let mut summary = SyncSummary::default();
        for (index, diff) in diffs.iter().enumerate() {
            progress.on_diff_start(index, diff);
            let result = self.apply_at(ctx, set, index, diff);
            progress.on_diff_complete(index, diff, &result);

            match result {
                Ok(outcome) => summary.add_outcome(outcome),
                Err(err) => {
                    progress.on_set_complete(set);
                    return Err(err);
                }
            }
        }

        progress.on_set_complete(set);
        log::info!(
            "synced {}: {} created, {} updated, {} removed, {} unchanged, rid: {}",
            set,
            summary.created,
            summary.updated,
            summary.removed,
            summary.unchanged,
            ctx.rid()
        );
        Ok(summary)
    }

    fn apply_at(
        &self,
        ctx: &RequestContext,
        set: &SetInst,
        index: usize,
        diff: &ModuleDiff,
    ) -> Result<SyncOutcome> {
        self.execute(ctx, set, diff).map_err(|source| {
            log::error!(
                "module sync failed, set: {}, diff #{}: {}, err: {}, rid: {}",
                set,
                index,
                diff,
                source,
                ctx.rid()
            );
            Error::Sync {
                biz_id: set.biz_id,
                set_id: set.set_id,
                index,
                diff_type: diff.diff_type.clone(),
                module_id: diff.target_module(),
                rid: ctx.rid().to_string(),
                source: Box::new(source),
            }
        })
    }

    fn execute(&self, ctx: &RequestContext, set: &SetInst, diff: &ModuleDiff) -> Result<SyncOutcome> {
        match diff.action()? {
            ModuleAction::Remove { module_id } => {
                call(ctx, "delete module", || {
                    self.client
                        .delete_module(ctx, set.biz_id, set.set_id, module_id)
                })?
                .into_result()?;
                Ok(SyncOutcome::Removed)
            }
            ModuleAction::Add {
                service_template_id,
                service_template_name,
            } => {
                let template = call(ctx, "read service template", || {
                    self.client.read_service_template(ctx, service_template_id)
                })?;

                let payload = CreateModule {
                    module_name: service_template_name,
                    service_category_id: template.service_category_id,
                    service_template_id,
                    parent_id: set.set_id,
                    set_template_id: set.set_template_id,
                };
                call(ctx, "create module", || {
                    self.client
                        .create_module(ctx, set.biz_id, set.set_id, &payload)
                })?
                .into_result()?;
                Ok(SyncOutcome::Created)
            }
            ModuleAction::Changed {
                module_id,
                module_name,
            } => {
                let payload = UpdateModule { module_name };
                call(ctx, "update module", || {
                    self.client
                        .update_module(ctx, set.biz_id, set.set_id, module_id, &payload)
                })?
                .into_result()?;
                Ok(SyncOutcome::Updated)
            }
            ModuleAction::Unchanged => Ok(SyncOutcome::Unchanged),
        }
    }
}

/// Run one remote call under `ctx`
///
/// A transport failure while the context is done is reported as the
/// cancellation, not as a network error. A call that completes after the
/// context was cancelled still fails the batch.
fn call<T>(ctx: &RequestContext, op: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    ctx.check()?;
    log::debug!("{}, rid: {}", op, ctx.rid());

    match f() {
        Err(err @ Error::Transport { .. }) => Err(ctx.check().err().unwrap_or(err)),
        Ok(value) => {
            ctx.check()?;
            Ok(value)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Call, MockClient, Reply};
    use crate::error::ErrorCategory;
    use crate::types::{ApiResponse, ServiceTemplate};
    use std::time::Instant;

    fn set() -> SetInst {
        SetInst::new(2, 10, 5)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("rid-test")
    }

    fn worker() -> (BackendWorker<MockClient>, MockClient) {
        let mock = MockClient::new();
        mock.add_template(ServiceTemplate {
            id: 9,
            name: "web".to_string(),
            service_category_id: 31,
        });
        (BackendWorker::new(mock.clone()), mock)
    }

    fn failed() -> Reply {
        Reply::Response(ApiResponse::failed(7, "denied"))
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_set_start(&mut self, set: &SetInst, count: usize) {
            self.events.push(format!("start {} {}", set.set_id, count));
        }
        fn on_diff_start(&mut self, index: usize, _diff: &ModuleDiff) {
            self.events.push(format!("diff {index}"));
        }
        fn on_diff_complete(&mut self, index: usize, _diff: &ModuleDiff, result: &Result<SyncOutcome>) {
            self.events.push(format!("done {index} {}", result.is_ok()));
        }
        fn on_set_complete(&mut self, set: &SetInst) {
            self.events.push(format!("end {}", set.set_id));
        }
    }

    #[test]
    fn test_unchanged_makes_no_calls() {
        let (worker, mock) = worker();
        let outcome = worker.apply(&ctx(), &set(), &ModuleDiff::unchanged()).unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_remove_deletes_module() {
        let (worker, mock) = worker();
        let outcome = worker.apply(&ctx(), &set(), &ModuleDiff::remove(100)).unwrap();
        assert_eq!(outcome, SyncOutcome::Removed);
        assert_eq!(
            mock.calls(),
            vec![Call::DeleteModule {
                biz_id: 2,
                set_id: 10,
                module_id: 100
            }]
        );
    }

    #[test]
    fn test_add_reads_template_then_creates() {
        let (worker, mock) = worker();
        let outcome = worker.apply(&ctx(), &set(), &ModuleDiff::add(9, "web")).unwrap();
        assert_eq!(outcome, SyncOutcome::Created);
        assert_eq!(
            mock.calls(),
            vec![
                Call::ReadServiceTemplate { template_id: 9 },
                Call::CreateModule {
                    biz_id: 2,
                    set_id: 10,
                    payload: CreateModule {
                        module_name: "web".to_string(),
                        service_category_id: 31,
                        service_template_id: 9,
                        parent_id: 10,
                        set_template_id: 5,
                    },
                },
            ]
        );
    }

    #[test]
    fn test_changed_updates_name_only() {
        let (worker, mock) = worker();
        let outcome = worker
            .apply(&ctx(), &set(), &ModuleDiff::changed(200, "db"))
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(
            mock.calls(),
            vec![Call::UpdateModule {
                biz_id: 2,
                set_id: 10,
                module_id: 200,
                payload: UpdateModule {
                    module_name: "db".to_string()
                },
            }]
        );
    }

    #[test]
    fn test_unknown_tag_is_rejected_without_calls() {
        let (worker, mock) = worker();
        let diff = ModuleDiff {
            diff_type: "moved".to_string(),
            module_id: Some(100),
            ..Default::default()
        };
        let err = worker.apply(&ctx(), &set(), &diff).unwrap_err();
        assert!(matches!(err.root(), Error::UnexpectedDiffType(t) if t == "moved"));
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_missing_field_is_rejected_without_calls() {
        let (worker, mock) = worker();
        let diff = ModuleDiff {
            diff_type: "remove".to_string(),
            ..Default::default()
        };
        let err = worker.apply(&ctx(), &set(), &diff).unwrap_err();
        assert!(matches!(err.root(), Error::MissingField { field: "bk_module_id", .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_add_template_failure_skips_create() {
        let (worker, mock) = worker();
        mock.reply_read(9, Reply::Transport("connection refused".to_string()));

        let err = worker.apply(&ctx(), &set(), &ModuleDiff::add(9, "web")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(mock.calls(), vec![Call::ReadServiceTemplate { template_id: 9 }]);
    }

    #[test]
    fn test_add_unknown_template_skips_create() {
        let (worker, mock) = worker();
        let err = worker
            .apply(&ctx(), &set(), &ModuleDiff::add(404, "ghost"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_application_failure_is_an_error_for_every_mutation() {
        let (worker, mock) = worker();
        mock.reply_create(9, failed());
        mock.reply_update(200, failed());
        mock.reply_delete(100, failed());

        for diff in [
            ModuleDiff::add(9, "web"),
            ModuleDiff::changed(200, "db"),
            ModuleDiff::remove(100),
        ] {
            let err = worker.apply(&ctx(), &set(), &diff).unwrap_err();
            assert!(
                matches!(err.root(), Error::Remote { code: 7, .. }),
                "{diff} should fail, got {err}"
            );
        }
    }

    #[test]
    fn test_result_flag_alone_is_not_success() {
        let (worker, mock) = worker();
        mock.reply_delete(
            100,
            Reply::Response(ApiResponse {
                result: true,
                code: 7,
                message: "partial".to_string(),
            }),
        );
        assert!(worker.apply(&ctx(), &set(), &ModuleDiff::remove(100)).is_err());
    }

    #[test]
    fn test_apply_all_scenario() {
        let mock = MockClient::new();
        mock.add_template(ServiceTemplate {
            id: 9,
            name: "web".to_string(),
            service_category_id: 1,
        });
        let worker = BackendWorker::new(mock.clone());

        let diffs = vec![
            ModuleDiff::remove(100),
            ModuleDiff::add(9, "web"),
            ModuleDiff::unchanged(),
        ];
        let summary = worker.apply_all(&ctx(), &set(), &diffs).unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.unchanged, 1);

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], Call::DeleteModule { module_id: 100, .. }));
        assert_eq!(calls[1], Call::ReadServiceTemplate { template_id: 9 });
        match &calls[2] {
            Call::CreateModule { payload, .. } => {
                assert_eq!(payload.module_name, "web");
                assert_eq!(payload.service_category_id, 1);
                assert_eq!(payload.service_template_id, 9);
            }
            other => panic!("Expected CreateModule, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_all_stops_at_first_failure() {
        let (worker, mock) = worker();
        mock.reply_update(200, Reply::Response(ApiResponse::failed(1, "denied")));

        let diffs = vec![ModuleDiff::changed(200, "db"), ModuleDiff::remove(100)];
        let err = worker.apply_all(&ctx(), &set(), &diffs).unwrap_err();

        assert_eq!(err.module_id(), Some(200));
        assert_eq!(err.diff_type(), Some("changed"));
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert!(err.to_string().contains("rid-test"));
        assert_eq!(mock.calls().len(), 1);
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, Call::DeleteModule { .. })));
    }

    #[test]
    fn test_apply_all_fail_fast_middle_entry() {
        let (worker, mock) = worker();
        mock.reply_delete(101, Reply::Transport("reset by peer".to_string()));

        let diffs = vec![
            ModuleDiff::remove(100),
            ModuleDiff::remove(101),
            ModuleDiff::remove(102),
        ];
        let err = worker.apply_all(&ctx(), &set(), &diffs).unwrap_err();

        match &err {
            Error::Sync { index, .. } => assert_eq!(*index, 1),
            other => panic!("Expected Error::Sync, got {other:?}"),
        }
        let deleted: Vec<i64> = mock
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::DeleteModule { module_id, .. } => Some(*module_id),
                _ => None,
            })
            .collect();
        assert_eq!(deleted, vec![100, 101]);
    }

    #[test]
    fn test_rerun_after_fix_converges() {
        let (worker, mock) = worker();
        mock.reply_delete(101, failed());
        let diffs = vec![ModuleDiff::remove(100), ModuleDiff::remove(101)];
        assert!(worker.apply_all(&ctx(), &set(), &diffs).is_err());

        // the server recomputes the diff: 100 is gone, 101 remains
        mock.reply_delete(101, Reply::Response(ApiResponse::ok()));
        let rerun = vec![ModuleDiff::unchanged(), ModuleDiff::remove(101)];
        let summary = worker.apply_all(&ctx(), &set(), &rerun).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.unchanged, 1);
    }

    #[test]
    fn test_cancelled_context_makes_no_calls() {
        let (worker, mock) = worker();
        let ctx = ctx();
        ctx.cancel();

        let err = worker
            .apply_all(&ctx, &set(), &[ModuleDiff::remove(100)])
            .unwrap_err();
        assert!(matches!(err.root(), Error::Cancelled));
        assert!(err.is_cancelled());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_expired_deadline_makes_no_calls() {
        let (worker, mock) = worker();
        let ctx = ctx().with_deadline(Instant::now());

        let err = worker
            .apply(&ctx, &set(), &ModuleDiff::add(9, "web"))
            .unwrap_err();
        assert!(matches!(err.root(), Error::DeadlineExceeded));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_cancel_in_flight_aborts_batch() {
        let (worker, mock) = worker();
        mock.reply_delete(100, Reply::CancelInFlight);

        let diffs = vec![ModuleDiff::remove(100), ModuleDiff::changed(200, "db")];
        let err = worker.apply_all(&ctx(), &set(), &diffs).unwrap_err();

        assert!(matches!(err.root(), Error::Cancelled));
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_cancel_during_successful_call_fails_batch() {
        let (worker, mock) = worker();
        mock.reply_delete(100, Reply::CancelThenRespond(ApiResponse::ok()));

        let ctx = ctx();
        let err = worker
            .apply_all(&ctx, &set(), &[ModuleDiff::remove(100)])
            .unwrap_err();

        assert!(matches!(err.root(), Error::Cancelled));
        assert_eq!(err.module_id(), Some(100));
        assert!(ctx.is_done());
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_progress_reports_through_failure() {
        let (worker, mock) = worker();
        mock.reply_delete(100, failed());
        let mut recorder = Recorder::default();

        let diffs = vec![
            ModuleDiff::unchanged(),
            ModuleDiff::remove(100),
            ModuleDiff::remove(101),
        ];
        let result = worker.apply_all_with_progress(&ctx(), &set(), &diffs, &mut recorder);

        assert!(result.is_err());
        assert_eq!(
            recorder.events,
            vec![
                "start 10 3",
                "diff 0",
                "done 0 true",
                "diff 1",
                "done 1 false",
                "end 10",
            ]
        );
    }
}
