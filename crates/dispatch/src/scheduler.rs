//! Dispatch scheduler: the recurring background tick.

use std::time::Instant;

use chrono::Utc;
use common::AggregateId;
use domain::{Aggregate, Drone, DroneStatus, ErrorKind, FlightStep, OrderService};
use event_store::EventStore;
use projections::{FleetRosterView, OrderBoardView, OrderSummary, ProjectionProcessor};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::{FleetConfig, SchedulerConfig};
use crate::error::Result;
use crate::fleet::{Assignment, FleetManager};

/// What one tick did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub assigned: Vec<Assignment>,
    /// Ready orders no drone could take; retried next tick.
    pub infeasible: Vec<AggregateId>,
    /// Infeasible orders that have waited past the alert threshold.
    pub overdue: Vec<AggregateId>,
    pub delivered: Vec<AggregateId>,
    /// Drones that reached base this tick.
    pub landed: Vec<AggregateId>,
    pub charging_started: Vec<AggregateId>,
    /// Drones that finished charging this tick.
    pub charged: Vec<AggregateId>,
    /// Orders in delivery whose drone no longer carries them.
    pub stranded: Vec<AggregateId>,
    pub moved: usize,
    pub errors: usize,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.assigned.is_empty()
            && self.infeasible.is_empty()
            && self.delivered.is_empty()
            && self.landed.is_empty()
            && self.charging_started.is_empty()
            && self.charged.is_empty()
            && self.moved == 0
            && self.errors == 0
    }
}

/// Assigns ready orders, flies drones and charges batteries, once per tick.
///
/// Reads the dispatch queue from [`OrderBoardView`]; every write goes
/// through the aggregates, so a lagging view only delays work by a tick.
/// A failure on one order or drone is logged and counted, never fatal to
/// the tick.
pub struct DispatchScheduler<S: EventStore> {
    fleet: FleetManager<S>,
    orders: OrderService<S>,
    processor: ProjectionProcessor<S>,
    board: OrderBoardView,
    roster: FleetRosterView,
    config: SchedulerConfig,
}

impl<S: EventStore + Clone> DispatchScheduler<S> {
    pub fn new(store: S, fleet_config: FleetConfig, config: SchedulerConfig) -> Self {
        let board = OrderBoardView::new();
        let roster = FleetRosterView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(board.clone()));
        processor.register(Box::new(roster.clone()));

        Self {
            fleet: FleetManager::new(store.clone(), fleet_config),
            orders: OrderService::new(store),
            processor,
            board,
            roster,
            config,
        }
    }

    pub fn fleet(&self) -> &FleetManager<S> {
        &self.fleet
    }

    pub fn board(&self) -> &OrderBoardView {
        &self.board
    }

    pub fn roster(&self) -> &FleetRosterView {
        &self.roster
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Brings the read models up to date with the event log.
    pub async fn catch_up(&self) -> Result<u64> {
        Ok(self.processor.run_catch_up().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        let started = Instant::now();
        let mut report = TickReport::default();

        self.catch_up().await?;

        for summary in self.board.ready_without_drone().await {
            self.assign(&summary, &mut report).await;
        }

        let fleet = self.fleet.list().await?;
        self.find_stranded(&fleet, &mut report).await;

        let step = self.fleet.config().flight_step(self.config.tick);
        for drone in &fleet {
            let Some(drone_id) = drone.id() else { continue };
            let outcome = match drone.status() {
                DroneStatus::InUse | DroneStatus::Returning => {
                    self.fly(drone_id, step, &mut report).await
                }
                DroneStatus::Charging => self.charge(drone_id, &mut report).await,
                DroneStatus::Idle => self.maybe_start_charging(drone, &mut report).await,
                DroneStatus::Maintenance => Ok(()),
            };
            if let Err(e) = outcome {
                report.errors += 1;
                tracing::warn!(%drone_id, error = %e, "drone step failed");
            }
        }

        metrics::counter!("dispatch_ticks_total").increment(1);
        metrics::histogram!("dispatch_tick_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if !report.is_quiet() {
            tracing::debug!(
                assigned = report.assigned.len(),
                infeasible = report.infeasible.len(),
                delivered = report.delivered.len(),
                moved = report.moved,
                errors = report.errors,
                "dispatch tick"
            );
        }
        Ok(report)
    }

    /// Ticks every `config.tick` until `shutdown` flips to true or its
    /// sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(tick = ?self.config.tick, "dispatch scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "dispatch tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("dispatch scheduler stopped");
    }

    async fn assign(&self, summary: &OrderSummary, report: &mut TickReport) {
        let order_id = summary.order_id;
        match self.fleet.assign(order_id).await {
            Ok(assignment) => report.assigned.push(assignment),
            Err(e) if e.kind() == ErrorKind::Infeasible => {
                tracing::warn!(%order_id, error = %e, "no drone for ready order");
                report.infeasible.push(order_id);

                let since = summary.ready_since.unwrap_or(summary.updated_at);
                let overdue = (Utc::now() - since)
                    .to_std()
                    .is_ok_and(|waited| waited >= self.config.infeasible_alert);
                if overdue {
                    tracing::error!(%order_id, %since, "ready order overdue for a drone");
                    report.overdue.push(order_id);
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::StaleState | ErrorKind::InvalidTransition) => {
                tracing::debug!(%order_id, error = %e, "order moved before assignment");
            }
            Err(e) => {
                report.errors += 1;
                tracing::warn!(%order_id, error = %e, "assignment failed");
            }
        }
    }

    async fn find_stranded(&self, fleet: &[Drone], report: &mut TickReport) {
        for summary in self.board.in_delivery().await {
            let carried = fleet.iter().any(|d| {
                d.status() == DroneStatus::InUse && d.order_id() == Some(summary.order_id)
            });
            if !carried {
                tracing::warn!(order_id = %summary.order_id, drone_id = ?summary.drone_id, "order in delivery has no drone");
                report.stranded.push(summary.order_id);
            }
        }
    }

    async fn fly(
        &self,
        drone_id: AggregateId,
        step: FlightStep,
        report: &mut TickReport,
    ) -> Result<()> {
        let drones = self.fleet.drones();
        let result = drones.fly(drone_id, step).await?;
        if !result.events.is_empty() {
            report.moved += 1;
        }

        let drone = result.aggregate;
        match drone.status() {
            DroneStatus::Idle => {
                tracing::info!(%drone_id, battery = drone.battery_level(), "drone landed");
                report.landed.push(drone_id);
            }
            DroneStatus::InUse if drone.has_arrived() => {
                let Some(order_id) = drone.order_id() else { return Ok(()) };
                match self.orders.complete_delivery(order_id).await {
                    Ok(_) => {
                        tracing::info!(%order_id, %drone_id, "order delivered");
                        report.delivered.push(order_id);
                    }
                    Err(e) if e.kind() == ErrorKind::InvalidTransition => {
                        tracing::warn!(%order_id, error = %e, "order left delivery mid-flight");
                    }
                    Err(e) => return Err(e.into()),
                }
                drones.release_after_delivery(drone_id, order_id).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn charge(&self, drone_id: AggregateId, report: &mut TickReport) -> Result<()> {
        let amount = self.fleet.config().charge_per_tick;
        let result = self.fleet.drones().charge_tick(drone_id, amount).await?;
        if result.aggregate.status() == DroneStatus::Idle {
            tracing::info!(%drone_id, "drone fully charged");
            report.charged.push(drone_id);
        }
        Ok(())
    }

    async fn maybe_start_charging(&self, drone: &Drone, report: &mut TickReport) -> Result<()> {
        let low = drone.battery_level() < self.fleet.config().auto_charge_below;
        let Some(drone_id) = drone.id().filter(|_| low && drone.is_at_base()) else {
            return Ok(());
        };
        self.fleet.drones().charge(drone_id).await?;
        tracing::info!(%drone_id, battery = drone.battery_level(), "low battery, charging");
        report.charging_started.push(drone_id);
        Ok(())
    }
}
