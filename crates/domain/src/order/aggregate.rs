//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{Actor, AggregateId, CustomerId, GeoPoint, RestaurantId, Role};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::payment::{PaymentMethod, PaymentStatus};

use super::{
    Money, OrderError, OrderEvent, OrderItem, OrderStatus, PlaceOrder, TransitionRequest,
    events::{OrderPlacedData, PaymentRecordedData, StatusChangedData},
};

/// Preconditions that depend on deployment settings.
#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    /// How long a restaurant may take to confirm a new order.
    pub confirmation_window: Duration,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            confirmation_window: Duration::minutes(30),
        }
    }
}

/// One audited status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: OrderStatus,
    pub actor_role: Role,
    pub changed_by: u64,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Latest payment state mirrored from the payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayment {
    pub payment_id: AggregateId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Order aggregate root.
///
/// Owns one order's items, status and append-only history. The total is
/// always derived from the items; there is no stored total to drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    checkout_id: Option<AggregateId>,
    customer_id: Option<CustomerId>,
    restaurant_id: Option<RestaurantId>,
    items: Vec<OrderItem>,
    status: OrderStatus,
    delivery_address: String,
    delivery_location: Option<GeoPoint>,
    restaurant_location: Option<GeoPoint>,
    notes: Option<String>,
    drone_id: Option<AggregateId>,
    distance_km: f64,
    rejection_reason: Option<String>,
    history: Vec<HistoryEntry>,
    payment: Option<OrderPayment>,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::OrderStatusChanged(data) => self.apply_status_changed(data),
            OrderEvent::OrderPaymentRecorded(data) => self.apply_payment_recorded(data),
        }
    }
}

// Query methods
impl Order {
    pub fn checkout_id(&self) -> Option<AggregateId> {
        self.checkout_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn delivery_location(&self) -> Option<GeoPoint> {
        self.delivery_location
    }

    pub fn restaurant_location(&self) -> Option<GeoPoint> {
        self.restaurant_location
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn drone_id(&self) -> Option<AggregateId> {
        self.drone_id
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn payment(&self) -> Option<&OrderPayment> {
        self.payment.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Σ unit_price × quantity.
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn total_weight_kg(&self) -> f64 {
        self.items.iter().map(OrderItem::line_weight_kg).sum()
    }

    /// Distance × 2 minutes plus 20 minutes of preparation.
    pub fn estimated_delivery_minutes(&self) -> i64 {
        (self.distance_km * 2.0 + 20.0).round() as i64
    }

    /// Whether `actor` is allowed to see this order.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin | Role::Scheduler => true,
            Role::Customer => self.customer_id.map(|c| c.get()) == Some(actor.user_id),
            Role::Restaurant => self.restaurant_id.map(|r| r.get()) == Some(actor.user_id),
        }
    }
}

// Command methods
impl Order {
    pub fn place(&self, cmd: PlaceOrder, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if cmd.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &cmd.items {
            let product_id = item.product_id.get();
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id,
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id,
                    price: item.unit_price.minor(),
                });
            }
            if !(item.weight_kg >= 0.0) {
                return Err(OrderError::InvalidWeight {
                    product_id,
                    weight_kg: item.weight_kg,
                });
            }
        }

        let distance_km = cmd.restaurant_location.distance_km(&cmd.delivery_location);

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            checkout_id: cmd.checkout_id,
            customer_id: cmd.customer_id,
            restaurant_id: cmd.restaurant_id,
            items: cmd.items,
            delivery_address: cmd.delivery_address,
            delivery_location: cmd.delivery_location,
            restaurant_location: cmd.restaurant_location,
            notes: cmd.notes,
            distance_km,
            placed_at: now,
        })])
    }

    /// Takes one edge of the state machine.
    ///
    /// Checks, in order: the expected prior status, ownership, the role's
    /// edge table, then edge preconditions. Admins skip ownership and
    /// preconditions.
    pub fn transition(
        &self,
        request: TransitionRequest,
        policy: &OrderPolicy,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }

        if let Some(expected) = request.expected
            && expected != self.status
        {
            return Err(OrderError::StaleStatus {
                expected,
                actual: self.status,
            });
        }

        self.ensure_owner(&request.actor)?;

        let from = self.status;
        let to = request.to;
        if !from.permits(to, request.actor.role) {
            return Err(OrderError::InvalidTransition {
                from,
                to,
                role: request.actor.role,
            });
        }

        let rejection_reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        if !request.actor.is_admin() {
            match to {
                OrderStatus::Confirmed => self.ensure_unexpired(policy, request.at)?,
                OrderStatus::Rejected if rejection_reason.is_none() => {
                    return Err(OrderError::ReasonRequired);
                }
                OrderStatus::InDelivery if request.drone_id.is_none() => {
                    return Err(OrderError::DroneRequired);
                }
                _ => {}
            }
        }

        let changed_at = match self.history.last() {
            Some(last) if last.changed_at > request.at => last.changed_at,
            _ => request.at,
        };

        Ok(vec![OrderEvent::OrderStatusChanged(StatusChangedData {
            from,
            to,
            actor: request.actor,
            note: request.note,
            rejection_reason: rejection_reason.filter(|_| to == OrderStatus::Rejected),
            drone_id: request.drone_id.filter(|_| to == OrderStatus::InDelivery),
            changed_at,
        })])
    }

    /// Mirrors the ledger's payment state. Re-recording the same state is a
    /// no-op.
    pub fn record_payment(
        &self,
        payment: OrderPayment,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        if let Some(current) = &self.payment {
            let downgrade = current.payment_id == payment.payment_id
                && current.status == PaymentStatus::Completed
                && payment.status != PaymentStatus::Completed;
            if current == &payment || downgrade {
                return Ok(vec![]);
            }
        }

        Ok(vec![OrderEvent::OrderPaymentRecorded(PaymentRecordedData {
            payment_id: payment.payment_id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            transaction_id: payment.transaction_id,
            recorded_at: now,
        })])
    }

    fn ensure_owner(&self, actor: &Actor) -> Result<(), OrderError> {
        let owns = match actor.role {
            Role::Admin | Role::Scheduler => true,
            Role::Customer | Role::Restaurant => self.is_visible_to(actor),
        };
        if owns {
            Ok(())
        } else {
            Err(OrderError::NotOwner {
                role: actor.role,
                user_id: actor.user_id,
            })
        }
    }

    fn ensure_unexpired(&self, policy: &OrderPolicy, at: DateTime<Utc>) -> Result<(), OrderError> {
        match self.created_at {
            Some(created) if at - created > policy.confirmation_window => {
                Err(OrderError::ConfirmationExpired {
                    window_minutes: policy.confirmation_window.num_minutes(),
                })
            }
            _ => Ok(()),
        }
    }
}

// Event application
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.checkout_id = data.checkout_id;
        self.customer_id = Some(data.customer_id);
        self.restaurant_id = Some(data.restaurant_id);
        self.items = data.items;
        self.status = OrderStatus::WaitingConfirmation;
        self.delivery_address = data.delivery_address;
        self.delivery_location = Some(data.delivery_location);
        self.restaurant_location = Some(data.restaurant_location);
        self.notes = data.notes.clone();
        self.distance_km = data.distance_km;
        self.created_at = Some(data.placed_at);
        self.history.push(HistoryEntry {
            status: OrderStatus::WaitingConfirmation,
            actor_role: Role::Customer,
            changed_by: data.customer_id.get(),
            note: data.notes,
            changed_at: data.placed_at,
        });
    }

    fn apply_status_changed(&mut self, data: StatusChangedData) {
        self.status = data.to;
        if data.to.carries_drone() {
            if let Some(drone_id) = data.drone_id {
                self.drone_id = Some(drone_id);
            }
        } else {
            self.drone_id = None;
        }
        if let Some(reason) = data.rejection_reason {
            self.rejection_reason = Some(reason);
        }
        self.history.push(HistoryEntry {
            status: data.to,
            actor_role: data.actor.role,
            changed_by: data.actor.user_id,
            note: data.note,
            changed_at: data.changed_at,
        });
    }

    fn apply_payment_recorded(&mut self, data: PaymentRecordedData) {
        self.payment = Some(OrderPayment {
            payment_id: data.payment_id,
            amount: data.amount,
            method: data.method,
            status: data.status,
            transaction_id: data.transaction_id,
        });
    }
}
