//! Property-based tests for chainsim-flow invariants.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use proptest::prelude::*;

use chainsim_core::{JobId, ScenarioId};
use chainsim_flow::compute::RemoteRunState;
use chainsim_flow::compute::memory::ScriptedComputeClient;
use chainsim_flow::estimate::{ResultEstimator, perturb};
use chainsim_flow::job::{JobStatus, SimulationJob};
use chainsim_flow::orchestrator::{Collaborators, JobOrchestrator};
use chainsim_flow::poll::PollConfig;
use chainsim_flow::result::ResultSource;
use chainsim_flow::scenario::{AdjustmentKind, DateRange, InventoryAdjustment, Scenario, SupplierDelay};
use chainsim_flow::store::ScenarioStore;
use chainsim_flow::store::memory::InMemoryStore;
use chainsim_flow::warehouse::{
    DemandRecord, InventoryRecord, SupplierRecord, Warehouse, WarehouseSnapshot,
};

fn day(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .checked_add_days(chrono::Days::new(u64::from(offset)))
        .unwrap()
}

/// Generates a product identifier from a small pool so perturbations match.
fn arb_product() -> impl Strategy<Value = String> {
    (1u32..=4).prop_map(|i| format!("PROD-{i:03}"))
}

fn arb_inventory() -> impl Strategy<Value = InventoryRecord> {
    (arb_product(), 0i64..5_000).prop_map(|(product_id, current_inventory)| InventoryRecord {
        product_id,
        current_inventory,
        reorder_point: 200,
        safety_stock: 100,
    })
}

fn arb_supplier() -> impl Strategy<Value = SupplierRecord> {
    ((1u32..=3), arb_product(), 1i32..30, 0.5f64..50.0).prop_map(
        |(i, product_id, lead_time_days, cost_per_unit)| SupplierRecord {
            supplier_id: format!("SUPPLIER-{i:03}"),
            supplier_name: format!("Supplier {i}"),
            product_id,
            lead_time_days,
            cost_per_unit,
        },
    )
}

fn arb_demand() -> impl Strategy<Value = DemandRecord> {
    (arb_product(), 0u32..120, 0.0f64..1_000.0).prop_map(|(product_id, offset, demand)| {
        DemandRecord {
            product_id,
            date: day(offset),
            demand,
        }
    })
}

/// Generates a snapshot; any collection may be empty.
fn arb_snapshot() -> impl Strategy<Value = WarehouseSnapshot> {
    (
        prop::collection::vec(arb_inventory(), 0..8),
        prop::collection::vec(arb_supplier(), 0..6),
        prop::collection::vec(arb_demand(), 0..40),
    )
        .prop_map(|(inventory, suppliers, demand)| WarehouseSnapshot {
            inventory,
            suppliers,
            demand,
        })
}

fn arb_window() -> impl Strategy<Value = DateRange> {
    (0u32..120, 0u32..60).prop_map(|(start, len)| DateRange::new(day(start), day(start + len)))
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (
        prop::collection::vec(((1u32..=3), 0i32..60, arb_window()), 0..3),
        prop::collection::vec(
            (arb_product(), 0u32..3_000, any::<bool>(), arb_window()),
            0..3,
        ),
    )
        .prop_map(|(delays, adjustments)| {
            let mut scenario = Scenario::new("generated");
            for (i, delay_days, window) in delays {
                scenario = scenario.with_supplier_delay(SupplierDelay {
                    supplier_id: format!("SUPPLIER-{i:03}"),
                    supplier_name: format!("Supplier {i}"),
                    delay_days,
                    window,
                });
            }
            for (product_id, quantity, increase, window) in adjustments {
                scenario = scenario.with_inventory_adjustment(InventoryAdjustment {
                    product_name: product_id.clone(),
                    product_id,
                    quantity,
                    kind: if increase {
                        AdjustmentKind::Increase
                    } else {
                        AdjustmentKind::Decrease
                    },
                    window,
                });
            }
            scenario
        })
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Complete,
    Fail,
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop::sample::select(vec![Step::Start, Step::Complete, Step::Fail]),
        0..8,
    )
}

#[derive(Debug, Clone, Copy)]
enum Submit {
    Accept,
    NotConfigured,
    Unavailable,
}

fn arb_run_states() -> impl Strategy<Value = Vec<RemoteRunState>> {
    prop::collection::vec(
        prop::sample::select(vec![
            RemoteRunState::Pending,
            RemoteRunState::Running,
            RemoteRunState::Unknown,
            RemoteRunState::Terminated,
            RemoteRunState::Skipped,
            RemoteRunState::InternalError,
        ]),
        0..6,
    )
}

fn arb_submit() -> impl Strategy<Value = Submit> {
    prop::sample::select(vec![Submit::Accept, Submit::NotConfigured, Submit::Unavailable])
}

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Asserts that each job exposes a result exactly when it is COMPLETED,
/// through both `get_result` and `compare_results`.
async fn assert_results_track_completion(
    orchestrator: &JobOrchestrator,
    jobs: &[(ScenarioId, JobId)],
) -> Result<bool, TestCaseError> {
    let scenario_ids: Vec<ScenarioId> = jobs.iter().map(|(scenario_id, _)| *scenario_id).collect();
    let compared = orchestrator.compare_results(&scenario_ids).await.unwrap();

    let mut all_terminal = true;
    for (_, job_id) in jobs {
        let status = orchestrator.get_job_status(*job_id).await.unwrap();
        all_terminal &= status.is_terminal();

        let completed = status == JobStatus::Completed;
        prop_assert_eq!(orchestrator.get_result(*job_id).await.is_ok(), completed);
        let listed = compared.iter().any(|r| r.job_id == Some(*job_id));
        prop_assert_eq!(listed, completed, "compare_results for {} in {}", job_id, status);
    }
    Ok(all_terminal)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the remote service reports, a result is observable exactly
    /// when its job is COMPLETED, before and after every terminal transition.
    #[test]
    fn results_exist_only_for_completed_jobs(
        states in arb_run_states(),
        submit in arb_submit(),
        max_attempts in 1u32..5,
        reject_results in any::<bool>(),
        job_count in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            if reject_results {
                store.reject_result_writes();
            }
            let compute = match submit {
                Submit::Accept => ScriptedComputeClient::new(states),
                Submit::NotConfigured => ScriptedComputeClient::not_configured(),
                Submit::Unavailable => ScriptedComputeClient::unavailable("503"),
            };
            let estimator = ResultEstimator::new(Warehouse::synthetic_only()).with_seed(3);
            let orchestrator = JobOrchestrator::new(
                Collaborators::with_store(Arc::clone(&store), Arc::new(compute), estimator),
                PollConfig::new(POLL_INTERVAL, max_attempts).unwrap(),
            );

            let mut jobs = Vec::with_capacity(job_count);
            for i in 0..job_count {
                let scenario = Scenario::new(format!("generated {i}"));
                store.save_scenario(&scenario).await.unwrap();
                let job_id = orchestrator.start_simulation(scenario.id).await.unwrap();
                jobs.push((scenario.id, job_id));
            }

            // Observe at half-interval steps until every job is terminal.
            while !assert_results_track_completion(&orchestrator, &jobs).await? {
                tokio::time::sleep(POLL_INTERVAL / 2).await;
            }

            for (_, job_id) in &jobs {
                let status = orchestrator.wait_for_job(*job_id).await.unwrap();
                if reject_results {
                    prop_assert_eq!(status, JobStatus::Failed);
                }
            }
            assert_results_track_completion(&orchestrator, &jobs).await?;
            Ok::<(), TestCaseError>(())
        })?;
    }
}

proptest! {
    /// Whatever the warehouse holds, the estimate is either rejected (so the
    /// baseline answers) or satisfies every result invariant.
    #[test]
    fn warehouse_estimates_are_consistent(scenario in arb_scenario(), snapshot in arb_snapshot(), seed in any::<u64>()) {
        let estimator = ResultEstimator::new(Warehouse::synthetic_only()).with_seed(seed);
        let perturbed = perturb::apply(&scenario, snapshot.clone());

        match estimator.estimate_from_snapshot(&scenario, &perturbed) {
            Ok(result) => {
                prop_assert!(result.is_consistent(), "inconsistent: {result:?}");
                prop_assert_eq!(result.source, ResultSource::Warehouse);
                prop_assert!(!snapshot.inventory.is_empty() && !snapshot.demand.is_empty());
            }
            Err(_) => {
                prop_assert!(snapshot.inventory.is_empty() || snapshot.demand.is_empty());
            }
        }
    }

    /// A fixed seed makes tier 2 a pure function of its inputs.
    #[test]
    fn seeded_estimates_are_deterministic(snapshot in arb_snapshot(), seed in any::<u64>()) {
        let scenario = Scenario::new("repeat");
        let a = ResultEstimator::new(Warehouse::synthetic_only()).with_seed(seed);
        let b = ResultEstimator::new(Warehouse::synthetic_only()).with_seed(seed);

        let first = a.estimate_from_snapshot(&scenario, &snapshot);
        let second = b.estimate_from_snapshot(&scenario, &snapshot);
        prop_assert_eq!(first, second);
    }

    /// The synthetic baseline stays inside its documented ranges.
    #[test]
    fn baseline_stays_in_range(seed in any::<u64>()) {
        let scenario = Scenario::new("baseline");
        let result = ResultEstimator::new(Warehouse::synthetic_only())
            .with_seed(seed)
            .baseline(&scenario);

        prop_assert!(result.is_consistent());
        prop_assert_eq!(result.source, ResultSource::Baseline);
        prop_assert!((100_000.0..150_000.0).contains(&result.total_cost));
        prop_assert!((90.0..=100.0).contains(&result.service_level));
        prop_assert!(result.metrics.stockout_events < 20);
        prop_assert_eq!(result.metrics.total_orders, 1000);
    }

    /// Perturbations never produce negative inventory or shorter lead times.
    #[test]
    fn perturbations_respect_floors(scenario in arb_scenario(), snapshot in arb_snapshot()) {
        let perturbed = perturb::apply(&scenario, snapshot.clone());

        prop_assert!(perturbed.inventory.iter().all(|i| i.current_inventory >= 0));
        for (before, after) in snapshot.suppliers.iter().zip(&perturbed.suppliers) {
            prop_assert!(after.lead_time_days >= before.lead_time_days);
        }
        prop_assert_eq!(perturbed.demand, snapshot.demand);
    }

    /// Terminal jobs never change status, and only table transitions succeed.
    #[test]
    fn job_state_machine_holds(steps in arb_steps()) {
        let mut job = SimulationJob::new(ScenarioId::generate());

        for step in steps {
            let before = job.status;
            let target = match step {
                Step::Start => JobStatus::Running,
                Step::Complete => JobStatus::Completed,
                Step::Fail => JobStatus::Failed,
            };
            let outcome = match step {
                Step::Fail => job.fail("generated failure"),
                _ => job.transition_to(target),
            };

            prop_assert_eq!(outcome.is_ok(), before.can_transition_to(target));
            if before.is_terminal() {
                prop_assert_eq!(job.status, before);
            }
            if job.is_terminal() {
                prop_assert!(job.completed_at.is_some());
            }
            prop_assert_eq!(job.status == JobStatus::Failed, job.error_message.is_some());
        }
    }
}
