//! Failover orchestration.
//!
//! When a node is declared offline the manager moves every production
//! workload the dead node owned to a surviving host:
//!
//! 1. every live, non-backup host is asked for its view of HA workloads;
//! 2. reports whose parent is the dead node are kept;
//! 3. reports are deduplicated per workload, keeping the freshest snapshot,
//!    whose current host becomes the new owner;
//! 4. the strategy action (`cireset` or `change-parent`) and then `start` are
//!    issued on that host.
//!
//! Failures are isolated per host and per workload and are never retried.
//! The dead node is removed from the registry afterwards, so a workload whose
//! actions failed stays down until an operator intervenes; every such failure
//! is logged at `error` and listed in the returned [`FailoverReport`].

use super::coordinator::ClusterCoordinator;
use crate::observability;
use crate::types::{
    FailoverStrategy, HostEntry, Node, WorkloadAction, WorkloadKind, WorkloadReport,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Planned move of one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverAction {
    pub kind: WorkloadKind,
    pub workload: String,
    pub strategy: FailoverStrategy,
    pub latest_snapshot: String,
    /// Host that will run the workload, with its credentials.
    pub target: Node,
}

impl FailoverAction {
    /// Remote calls issued for this action, in order.
    pub fn steps(&self) -> [WorkloadAction; 2] {
        let prepare = match (self.kind, self.strategy) {
            (WorkloadKind::Vm, FailoverStrategy::CiReset) => WorkloadAction::CiReset,
            _ => WorkloadAction::ChangeParent,
        };
        [prepare, WorkloadAction::Start]
    }

    pub fn target_host(&self) -> &str {
        &self.target.hostname
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    pub kind: WorkloadKind,
    pub workload: String,
    pub target_host: String,
    pub step: WorkloadAction,
    pub error: String,
}

/// Outcome of one failover invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailoverReport {
    pub dead_host: String,
    /// This node is not the manager; nothing was done.
    pub not_manager: bool,
    /// Planned only, no remote calls issued.
    pub dry_run: bool,
    pub planned: Vec<FailoverAction>,
    /// Workloads started on their new host.
    pub started: Vec<String>,
    pub failed: Vec<FailedAction>,
}

/// Keep one report per workload: the one with the greatest snapshot.
///
/// Snapshot identifiers are timestamps and compare lexicographically. On a
/// tie the first report wins. Output is ordered by kind, then name.
pub fn dedupe_latest(reports: Vec<WorkloadReport>) -> Vec<WorkloadReport> {
    let mut latest: BTreeMap<(WorkloadKind, String), WorkloadReport> = BTreeMap::new();

    for report in reports {
        let key = (report.kind, report.name.clone());
        match latest.get(&key) {
            Some(existing) if existing.latest_snapshot >= report.latest_snapshot => {}
            _ => {
                latest.insert(key, report);
            }
        }
    }

    latest.into_values().collect()
}

/// Turn the reports gathered from live hosts into failover actions for the
/// workloads owned by `dead`.
pub fn plan_failover(
    dead: &HostEntry,
    reports: Vec<WorkloadReport>,
    live_hosts: &[HostEntry],
) -> Vec<FailoverAction> {
    let owned: Vec<WorkloadReport> = reports
        .into_iter()
        .filter(|r| r.parent_host == dead.node.hostname)
        .collect();

    dedupe_latest(owned)
        .into_iter()
        .filter_map(|report| {
            let Some(target) = live_hosts
                .iter()
                .find(|h| h.node.hostname == report.current_host)
            else {
                warn!(
                    workload = %report.name,
                    host = %report.current_host,
                    "Failover target is not a live host, skipping"
                );
                return None;
            };

            Some(FailoverAction {
                kind: report.kind,
                strategy: report
                    .failover_strategy
                    .unwrap_or(dead.node.failover_strategy),
                latest_snapshot: report.latest_snapshot,
                workload: report.name,
                target: target.node.clone(),
            })
        })
        .collect()
}

/// Hosts that may receive workloads from `dead`.
fn failover_hosts(snapshot: Vec<HostEntry>, dead: &str) -> Vec<HostEntry> {
    snapshot
        .into_iter()
        .filter(|h| h.node.hostname != dead && !h.node.backup_node)
        .collect()
}

/// Ask every host for its VM and jail reports. Unreachable hosts are skipped.
async fn collect_reports(coordinator: &ClusterCoordinator, hosts: &[HostEntry]) -> Vec<WorkloadReport> {
    let client = coordinator.client();

    let queries = hosts.iter().map(|host| async move {
        let mut reports: Vec<WorkloadReport> = Vec::new();

        match client.vm_list(&host.node).await {
            Ok(vms) => reports.extend(vms.into_iter().map(WorkloadReport::from)),
            Err(e) => warn!(host = %host.node.hostname, error = %e, "Failed to fetch VM list"),
        }
        match client.jail_list(&host.node).await {
            Ok(jails) => reports.extend(jails.into_iter().map(WorkloadReport::from)),
            Err(e) => warn!(host = %host.node.hostname, error = %e, "Failed to fetch jail list"),
        }

        reports
    });

    join_all(queries).await.into_iter().flatten().collect()
}

/// Move the workloads of `dead` to surviving hosts. A no-op unless this node
/// is the manager.
pub async fn failover(coordinator: &ClusterCoordinator, dead: &HostEntry) -> FailoverReport {
    let mut report = FailoverReport {
        dead_host: dead.node.hostname.clone(),
        dry_run: coordinator.config().debug,
        ..Default::default()
    };

    if !coordinator.is_manager() {
        debug!(host = %dead.node.hostname, "Not the manager, leaving failover to it");
        report.not_manager = true;
        return report;
    }

    info!(host = %dead.node.hostname, "Starting failover");

    let hosts = failover_hosts(coordinator.registry().snapshot(), &dead.node.hostname);
    let reports = collect_reports(coordinator, &hosts).await;
    report.planned = plan_failover(dead, reports, &hosts);

    if report.planned.is_empty() {
        info!(host = %dead.node.hostname, "No production workloads to fail over");
        return report;
    }

    for action in report.planned.clone() {
        if report.dry_run {
            info!(
                kind = %action.kind,
                workload = %action.workload,
                target = %action.target_host(),
                strategy = %action.strategy,
                snapshot = %action.latest_snapshot,
                "Debug mode, would fail over workload"
            );
            continue;
        }

        match execute(coordinator, &action).await {
            Ok(()) => {
                info!(
                    kind = %action.kind,
                    workload = %action.workload,
                    target = %action.target_host(),
                    "Workload failed over"
                );
                observability::record_failover_action("started");
                report.started.push(action.workload.clone());
            }
            Err(failed) => {
                error!(
                    kind = %failed.kind,
                    workload = %failed.workload,
                    target = %failed.target_host,
                    step = %failed.step,
                    error = %failed.error,
                    "Failover action failed, workload needs manual recovery"
                );
                observability::record_failover_action("failed");
                report.failed.push(failed);
            }
        }
    }

    report
}

async fn execute(coordinator: &ClusterCoordinator, action: &FailoverAction) -> Result<(), FailedAction> {
    for step in action.steps() {
        coordinator
            .client()
            .workload_action(&action.target, action.kind, step, &action.workload)
            .await
            .map_err(|e| FailedAction {
                kind: action.kind,
                workload: action.workload.clone(),
                target_host: action.target.hostname.clone(),
                step,
                error: e.to_string(),
            })?;
    }
    Ok(())
}
