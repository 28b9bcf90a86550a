//! Order-driven reserve / fulfill / cancel / return, plus expiry.
//!
//! Quantity changes go through the ledger's compare-and-swap loop. Changes to
//! an existing reservation are claimed on the reservation record first (also
//! by CAS) so that two callers can never both release or ship the same
//! units; if the ledger write then fails, the claim is rolled back.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use stockledger_core::{DomainError, DomainResult, OrderId, ProductId, ReservationId, UserId, Versioned};
use stockledger_inventory::{
    AuditLogEntry, InventoryEvent, OperationType, ReleaseReason, StockRecord, StockReservation,
};

use crate::alerts::ReorderAlertEngine;
use crate::audit_trail::AuditTrail;
use crate::config::{DuplicateReservationPolicy, InventoryConfig};
use crate::ledger::{LedgerUpdate, StockLedger};
use crate::notify::Notifier;
use crate::query::{Page, ReservationQuery};
use crate::retry::with_retry;
use crate::store::{ReservationStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationReceipt {
    pub reservation: StockReservation,
    pub available_after: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub released_units: i64,
    pub failed: Vec<(ReservationId, String)>,
}

pub struct ReservationManager {
    ledger: Arc<StockLedger>,
    reservations: Arc<dyn ReservationStore>,
    alerts: Arc<ReorderAlertEngine>,
    audit: AuditTrail,
    notifier: Notifier,
    config: InventoryConfig,
}

impl ReservationManager {
    pub fn new(
        ledger: Arc<StockLedger>,
        reservations: Arc<dyn ReservationStore>,
        alerts: Arc<ReorderAlertEngine>,
        audit: AuditTrail,
        notifier: Notifier,
        config: InventoryConfig,
    ) -> Self {
        Self {
            ledger,
            reservations,
            alerts,
            audit,
            notifier,
            config,
        }
    }

    /// Earmark `quantity` units of a product for an order.
    ///
    /// A second reservation for an order that already holds an active one is
    /// handled by the configured [`DuplicateReservationPolicy`], including when
    /// the two requests race.
    pub fn reserve(
        &self,
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        actor: UserId,
    ) -> DomainResult<ReservationReceipt> {
        if quantity <= 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        let now = self.ledger.now();
        let expires_at = now + self.ttl()?;

        with_retry(self.ledger.retry_policy(), "reserve", || {
            match self.reservations.find_active(product_id, order_id)? {
                Some(existing) => self.reserve_again(existing, quantity, expires_at, actor),
                None => self.reserve_new(product_id, order_id, quantity, now, expires_at, actor),
            }
        })
    }

    fn reserve_new(
        &self,
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        actor: UserId,
    ) -> DomainResult<ReservationReceipt> {
        let reservation = StockReservation::open(product_id, order_id, quantity, now, expires_at)?;
        let update = self.ledger.update_with_retry(product_id, "reserve", |record| {
            ensure_reservable(record, quantity, now)?;
            Ok((0, quantity))
        })?;

        if let Err(e) = self.reservations.insert_active(reservation.clone()) {
            self.compensate(product_id, -quantity, "reserve");
            return Err(match e {
                // Another request opened the order's reservation first; the
                // retry re-reads it and applies the duplicate policy.
                StoreError::Duplicate(_) => DomainError::concurrent_modification(format!(
                    "order {order_id} reserved product {product_id} concurrently"
                )),
                other => other.into(),
            });
        }

        info!(
            product_id = %product_id,
            order_id = %order_id,
            quantity,
            available = update.after.available_stock(),
            "stock reserved"
        );
        self.audit.record(
            AuditLogEntry::transition(OperationType::Reservation, quantity, &update.before, &update.after, actor, now)
                .with_order(order_id)
                .with_reservation(reservation.id),
        );
        self.notifier.publish(
            InventoryEvent::StockReserved {
                product_id,
                order_id,
                reservation_id: reservation.id,
                quantity,
                available_after: update.after.available_stock(),
                occurred_at: now,
            },
            update.after.version(),
        );
        self.alerts.evaluate_after_change(product_id);

        Ok(ReservationReceipt {
            reservation,
            available_after: update.after.available_stock(),
        })
    }

    fn reserve_again(
        &self,
        existing: StockReservation,
        quantity: i64,
        expires_at: DateTime<Utc>,
        actor: UserId,
    ) -> DomainResult<ReservationReceipt> {
        let (product_id, order_id) = (existing.product_id, existing.order_id);
        match self.config.duplicate_reservation {
            DuplicateReservationPolicy::Reject => Err(DomainError::already_processed(format!(
                "order {order_id} already holds reservation {} for product {product_id}",
                existing.id
            ))),
            DuplicateReservationPolicy::Idempotent if existing.quantity_reserved == quantity => {
                let available_after = self.ledger.get_stock(product_id)?.available_stock();
                Ok(ReservationReceipt {
                    reservation: existing,
                    available_after,
                })
            }
            DuplicateReservationPolicy::Idempotent => Err(DomainError::already_processed(format!(
                "order {order_id} already reserved {} units of product {product_id}, not {quantity}",
                existing.quantity_reserved
            ))),
            DuplicateReservationPolicy::Merge => {
                let now = self.ledger.now();
                let merged = existing.merge(quantity, expires_at)?;
                let update = self.ledger.update_with_retry(product_id, "reserve.merge", |record| {
                    ensure_reservable(record, quantity, now)?;
                    Ok((0, quantity))
                })?;
                if let Err(e) = self.reservations.compare_and_swap(existing.version(), merged.clone()) {
                    // A lost race surfaces as a conflict, so the caller's
                    // retry merges into the fresh row.
                    self.compensate(product_id, -quantity, "reserve.merge");
                    return Err(e.into());
                }

                info!(product_id = %product_id, order_id = %order_id, quantity, total = merged.quantity_reserved, "reservation merged");
                self.audit.record(
                    AuditLogEntry::transition(OperationType::Reservation, quantity, &update.before, &update.after, actor, now)
                        .with_order(order_id)
                        .with_reservation(merged.id)
                        .with_notes("merged into active reservation"),
                );
                self.notifier.publish(
                    InventoryEvent::StockReserved {
                        product_id,
                        order_id,
                        reservation_id: merged.id,
                        quantity,
                        available_after: update.after.available_stock(),
                        occurred_at: now,
                    },
                    update.after.version(),
                );
                self.alerts.evaluate_after_change(product_id);

                Ok(ReservationReceipt {
                    reservation: merged,
                    available_after: update.after.available_stock(),
                })
            }
        }
    }

    /// Ship `quantity` units of the order's active reservation. Physical and
    /// reserved stock drop together; available stock is unchanged.
    pub fn fulfill(
        &self,
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        actor: UserId,
    ) -> DomainResult<StockReservation> {
        if quantity <= 0 {
            return Err(DomainError::validation("fulfillment quantity must be positive"));
        }
        let now = self.ledger.now();
        let (before, claimed) = self.claim_active(product_id, order_id, "fulfill", |r| r.fulfill(quantity, now))?;
        let update = self.settle(&before, &claimed, "fulfill", |_| Ok((-quantity, -quantity)))?;

        info!(
            product_id = %product_id,
            order_id = %order_id,
            quantity,
            outstanding = claimed.outstanding(),
            "reservation fulfilled"
        );
        self.audit.record(
            AuditLogEntry::transition(OperationType::Fulfillment, quantity, &update.before, &update.after, actor, now)
                .with_order(order_id)
                .with_reservation(claimed.id),
        );
        self.notifier.publish(
            InventoryEvent::ReservationFulfilled {
                product_id,
                order_id,
                reservation_id: claimed.id,
                quantity,
                fully_fulfilled: !claimed.is_active(),
                occurred_at: now,
            },
            update.after.version(),
        );
        self.alerts.evaluate_after_change(product_id);
        Ok(claimed)
    }

    /// Release whatever the order's active reservation still holds.
    pub fn cancel(&self, product_id: ProductId, order_id: OrderId, actor: UserId) -> DomainResult<StockReservation> {
        let now = self.ledger.now();
        let (before, claimed) = self.claim_active(product_id, order_id, "cancel", |r| r.cancel(now))?;
        self.release(before, claimed, ReleaseReason::Cancelled, actor, now)
    }

    /// Put returned units back on the shelf. The reservations they shipped
    /// under stay in their terminal state; only their returned tallies move.
    ///
    /// A return may span several reservations of the order. It is booked
    /// against the newest shipments first.
    pub fn return_stock(
        &self,
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        reason: &str,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        if quantity <= 0 {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::validation("return reason cannot be empty"));
        }
        let now = self.ledger.now();

        let claims = with_retry(self.ledger.retry_policy(), "return.claim", || {
            let rows = self.reservations.for_order(product_id, order_id)?;
            if rows.is_empty() {
                return Err(DomainError::not_found("reservation", format!("{product_id}/{order_id}")));
            }
            let returnable: i64 = rows.iter().map(StockReservation::returnable).sum();
            if returnable < quantity {
                return Err(DomainError::validation(format!(
                    "return of {quantity} exceeds shipped-and-unreturned quantity {returnable}"
                )));
            }

            let mut claims = Vec::new();
            let mut remaining = quantity;
            for row in rows.iter().rev() {
                let take = row.returnable().min(remaining);
                if take == 0 {
                    continue;
                }
                let claimed = row.record_return(take).and_then(|next| {
                    self.reservations.compare_and_swap(row.version(), next.clone())?;
                    Ok(next)
                });
                match claimed {
                    Ok(next) => claims.push((row.clone(), next)),
                    Err(e) => {
                        self.restore_all(&claims);
                        return Err(e);
                    }
                }
                remaining -= take;
                if remaining == 0 {
                    break;
                }
            }
            Ok(claims)
        })?;

        let update = self
            .ledger
            .update_with_retry(product_id, "return", |_| Ok((quantity, 0)))
            .inspect_err(|e| {
                warn!(product_id = %product_id, order_id = %order_id, error = %e, "ledger refused return, restoring reservations");
                self.restore_all(&claims);
            })?;

        info!(
            product_id = %product_id,
            order_id = %order_id,
            quantity,
            reservations = claims.len(),
            reason,
            "customer return booked"
        );
        let mut entry =
            AuditLogEntry::transition(OperationType::CustomerReturn, quantity, &update.before, &update.after, actor, now)
                .with_order(order_id)
                .with_notes(reason);
        if let Some((_, newest)) = claims.first() {
            entry = entry.with_reservation(newest.id);
        }
        self.audit.record(entry);
        self.notifier.publish(
            InventoryEvent::StockReturned {
                product_id,
                order_id,
                quantity,
                reason: reason.to_string(),
                occurred_at: now,
            },
            update.after.version(),
        );
        self.alerts.evaluate_after_change(product_id);
        Ok(update.after)
    }

    /// Expire every active reservation whose deadline is at or before `now`.
    pub fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<SweepReport> {
        let mut report = SweepReport::default();
        for due in self.reservations.due_for_expiry(now)? {
            match self.expire_one(due.id, now) {
                Ok(Some(expired)) => {
                    report.expired += 1;
                    report.released_units += expired.quantity_reserved - expired.quantity_fulfilled;
                }
                // Fulfilled or cancelled since the scan.
                Ok(None) => {}
                Err(e) => {
                    warn!(reservation_id = %due.id, error = %e, "reservation expiry failed");
                    report.failed.push((due.id, e.to_string()));
                }
            }
        }
        if report.expired > 0 || !report.failed.is_empty() {
            info!(
                expired = report.expired,
                released_units = report.released_units,
                failed = report.failed.len(),
                "reservation expiry sweep finished"
            );
        }
        Ok(report)
    }

    fn expire_one(&self, id: ReservationId, now: DateTime<Utc>) -> DomainResult<Option<StockReservation>> {
        let claim = with_retry(self.ledger.retry_policy(), "expire.claim", || {
            let current = self.get(id)?;
            if !current.is_due_for_expiry(now) {
                return Ok(None);
            }
            let next = current.expire(now)?;
            self.reservations.compare_and_swap(current.version(), next.clone())?;
            Ok(Some((current, next)))
        })?;

        match claim {
            Some((before, claimed)) => self
                .release(before, claimed, ReleaseReason::Expired, UserId::system(), now)
                .map(Some),
            None => Ok(None),
        }
    }

    fn release(
        &self,
        before: StockReservation,
        claimed: StockReservation,
        reason: ReleaseReason,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<StockReservation> {
        let (product_id, order_id) = (claimed.product_id, claimed.order_id);
        let quantity = before.outstanding();
        let label = match reason {
            ReleaseReason::Cancelled => "cancel",
            ReleaseReason::Expired => "expire",
        };
        let update = self.settle(&before, &claimed, label, |_| Ok((0, -quantity)))?;

        info!(product_id = %product_id, order_id = %order_id, quantity, reason = ?reason, "reservation released");
        let operation = match reason {
            ReleaseReason::Cancelled => OperationType::ReservationCancelled,
            ReleaseReason::Expired => OperationType::ReservationExpired,
        };
        self.audit.record(
            AuditLogEntry::transition(operation, quantity, &update.before, &update.after, actor, now)
                .with_order(order_id)
                .with_reservation(claimed.id),
        );
        self.notifier.publish(
            InventoryEvent::ReservationReleased {
                product_id,
                order_id,
                reservation_id: claimed.id,
                quantity,
                reason,
                occurred_at: now,
            },
            update.after.version(),
        );
        self.alerts.evaluate_after_change(product_id);
        Ok(claimed)
    }

    /// CAS-claim the active reservation for (product, order).
    fn claim_active(
        &self,
        product_id: ProductId,
        order_id: OrderId,
        label: &str,
        change: impl Fn(&StockReservation) -> DomainResult<StockReservation>,
    ) -> DomainResult<(StockReservation, StockReservation)> {
        with_retry(self.ledger.retry_policy(), label, || {
            let current = self
                .reservations
                .find_active(product_id, order_id)?
                .ok_or_else(|| DomainError::not_found("reservation", format!("{product_id}/{order_id}")))?;
            let next = change(&current)?;
            self.reservations.compare_and_swap(current.version(), next.clone())?;
            Ok((current, next))
        })
    }

    /// Apply the ledger side of a claimed reservation change, undoing the
    /// claim if the ledger refuses.
    fn settle(
        &self,
        before: &StockReservation,
        claimed: &StockReservation,
        label: &str,
        plan: impl FnMut(&StockRecord) -> DomainResult<(i64, i64)>,
    ) -> DomainResult<LedgerUpdate> {
        self.ledger
            .update_with_retry(claimed.product_id, label, plan)
            .inspect_err(|e| {
                warn!(reservation_id = %claimed.id, operation = label, error = %e, "ledger refused change, restoring reservation");
                self.restore(before, claimed);
            })
    }

    /// Roll a claimed reservation back to its pre-claim contents.
    fn restore(&self, before: &StockReservation, claimed: &StockReservation) {
        let restored = StockReservation {
            version: claimed.version() + 1,
            ..before.clone()
        };
        if let Err(e) = self.reservations.compare_and_swap(claimed.version(), restored) {
            error!(reservation_id = %claimed.id, error = %e, "could not restore reservation after ledger failure");
        }
    }

    fn restore_all(&self, claims: &[(StockReservation, StockReservation)]) {
        for (before, claimed) in claims {
            self.restore(before, claimed);
        }
    }

    /// Undo a ledger reservation whose reservation record could not be kept.
    fn compensate(&self, product_id: ProductId, reserved_delta: i64, label: &str) {
        if let Err(e) = self
            .ledger
            .update_with_retry(product_id, label, |_| Ok((0, reserved_delta)))
        {
            error!(product_id = %product_id, reserved_delta, error = %e, "could not compensate ledger reservation");
        }
    }

    fn ttl(&self) -> DomainResult<ChronoDuration> {
        let ttl = ChronoDuration::from_std(self.config.reservation_ttl)
            .map_err(|_| DomainError::validation("reservation ttl out of range"))?;
        if ttl <= ChronoDuration::zero() {
            return Err(DomainError::validation("reservation ttl must be positive"));
        }
        Ok(ttl)
    }

    pub fn get(&self, id: ReservationId) -> DomainResult<StockReservation> {
        self.reservations
            .get(id)?
            .ok_or_else(|| DomainError::not_found("reservation", id))
    }

    pub fn list(&self, query: &ReservationQuery) -> DomainResult<Page<StockReservation>> {
        Ok(query.run(self.reservations.list()?))
    }
}

fn ensure_reservable(record: &StockRecord, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
    if let Some(hold) = record.active_hold(now) {
        return Err(DomainError::validation(format!("stock on hold: {}", hold.reason)));
    }
    if record.available_stock() < quantity {
        return Err(DomainError::insufficient_stock(quantity, record.available_stock()));
    }
    Ok(())
}
