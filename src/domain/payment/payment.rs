use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::order::value_objects::Currency;
use super::errors::PaymentError;
use super::value_objects::PaymentState;

// ============================================================================
// Payment Entity - Independent Funding Sub-State-Machine
// ============================================================================
//
// Created Pending by Order::add_payment, then driven by gateway callbacks
// that may arrive duplicated or out of order. Guards therefore distinguish
// three cases: a legal transition, a terminal-equivalent repeat (returns
// Ok so client retries are safe), and a genuinely invalid move (rejected).
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount_cents: i64,
    pub currency: Currency,
    pub payment_method_id: Uuid,
    pub state: PaymentState,

    /// Gateway-side reference for the authorization.
    pub transaction_ref: Option<String>,
    /// Client-supplied token recognizing retried requests as duplicates.
    pub idempotency_key: Option<String>,
    /// Total refunded so far, never exceeding `amount_cents`.
    pub refunded_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_id: Uuid,
        amount_cents: i64,
        currency: Currency,
        payment_method_id: Uuid,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount_cents,
            currency,
            payment_method_id,
            state: PaymentState::Pending,
            transaction_ref: None,
            idempotency_key,
            refunded_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this attempt still counts toward covering the order total.
    pub fn counts_toward_total(&self) -> bool {
        self.state.counts_toward_total()
    }

    /// Reconcile a callback's idempotency key with the stored one.
    ///
    /// A differing key means a different logical request is being replayed
    /// onto this payment; a key arriving when none is stored is adopted.
    fn check_idempotency(&mut self, key: Option<&str>) -> Result<(), PaymentError> {
        match (key, self.idempotency_key.as_deref()) {
            (Some(incoming), Some(stored)) if incoming != stored => {
                Err(PaymentError::IdempotencyKeyConflict)
            }
            (Some(incoming), None) => {
                self.idempotency_key = Some(incoming.to_string());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Gateway authorized the funds.
    pub fn authorize(
        &mut self,
        transaction_ref: impl Into<String>,
        idempotency_key: Option<&str>,
    ) -> Result<(), PaymentError> {
        self.check_idempotency(idempotency_key)?;

        match self.state {
            PaymentState::Pending | PaymentState::Authorizing => {
                self.state = PaymentState::Authorized;
                self.transaction_ref = Some(transaction_ref.into());
                self.touch();
                Ok(())
            }
            // Duplicate callback for an authorization already recorded.
            PaymentState::Authorized => Ok(()),
            from => Err(PaymentError::InvalidTransition {
                from,
                action: "authorize",
            }),
        }
    }

    /// Gateway captured the authorized funds.
    pub fn capture(&mut self, idempotency_key: Option<&str>) -> Result<(), PaymentError> {
        self.check_idempotency(idempotency_key)?;

        match self.state {
            PaymentState::Authorized | PaymentState::Capturing => {
                self.state = PaymentState::Completed;
                self.touch();
                Ok(())
            }
            PaymentState::Completed => Ok(()),
            from => Err(PaymentError::InvalidTransition {
                from,
                action: "capture",
            }),
        }
    }

    /// Release an uncaptured authorization. Captured funds must be
    /// refunded instead.
    pub fn void(&mut self) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::Pending | PaymentState::Authorizing | PaymentState::Authorized => {
                self.state = PaymentState::Void;
                self.touch();
                Ok(())
            }
            PaymentState::Void => Ok(()),
            from => Err(PaymentError::InvalidTransition {
                from,
                action: "void",
            }),
        }
    }

    /// Return captured funds, accumulating until fully refunded.
    pub fn refund(&mut self, amount_cents: i64) -> Result<(), PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::InvalidRefundAmount(amount_cents));
        }

        match self.state {
            PaymentState::Completed | PaymentState::PartiallyRefunded => {
                let remaining = self.amount_cents - self.refunded_cents;
                if amount_cents > remaining {
                    return Err(PaymentError::RefundExceedsCaptured {
                        requested_cents: amount_cents,
                        remaining_cents: remaining,
                    });
                }

                self.refunded_cents += amount_cents;
                self.state = if self.refunded_cents == self.amount_cents {
                    PaymentState::Refunded
                } else {
                    PaymentState::PartiallyRefunded
                };
                self.touch();
                Ok(())
            }
            from => Err(PaymentError::InvalidTransition {
                from,
                action: "refund",
            }),
        }
    }

    /// Gateway reported the attempt failed.
    pub fn mark_failed(&mut self) -> Result<(), PaymentError> {
        if self.state == PaymentState::Failed {
            return Ok(());
        }
        if !self.state.can_fail() {
            return Err(PaymentError::InvalidTransition {
                from: self.state,
                action: "fail",
            });
        }

        self.state = PaymentState::Failed;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
