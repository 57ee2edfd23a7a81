use std::collections::HashMap;

use ulid::Ulid;

use crate::model::{BookingStatus, Ms};

use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub at: Ms,
    pub label: &'static str,
}

/// Aggregate funnel over all bookings (Blocked self-reservations excluded).
/// Rates are 0.0 for an empty funnel.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelMetrics {
    pub total: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub policy_issued: usize,
    pub sla_breached: usize,
    pub confirmation_rate: f64,
    pub completion_rate: f64,
    pub issue_rate: f64,
    pub sla_breach_rate: f64,
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl Engine {
    /// Lifecycle timestamps of a booking in chronological order.
    pub async fn timeline(&self, id: Ulid) -> Result<Vec<TimelineEntry>, EngineError> {
        let booking = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        let mut entries = vec![TimelineEntry {
            at: booking.created_at,
            label: "created",
        }];
        if let Some(at) = booking.responded_at {
            entries.push(TimelineEntry {
                at,
                label: "agent responded",
            });
        }
        if let Some(at) = booking.completed_at {
            entries.push(TimelineEntry {
                at,
                label: "completed",
            });
        }
        if let Some(at) = booking.reviewed_at {
            entries.push(TimelineEntry {
                at,
                label: match booking.status {
                    BookingStatus::PolicyIssued => "policy issued",
                    BookingStatus::Rejected => "rejected",
                    _ => "reviewed",
                },
            });
        }
        entries.sort_by_key(|e| e.at);
        Ok(entries)
    }

    /// Booking counts per current status.
    pub async fn stats_by_status(&self) -> Result<HashMap<BookingStatus, usize>, EngineError> {
        let mut stats: HashMap<BookingStatus, usize> = HashMap::new();
        for booking in self.store.all().await? {
            *stats.entry(booking.status).or_default() += 1;
        }
        Ok(stats)
    }

    /// Request → confirmed → completed → policy-issued funnel. Each stage
    /// counts bookings that reached it, judged by current status.
    pub async fn funnel_metrics(&self) -> Result<FunnelMetrics, EngineError> {
        use BookingStatus::*;
        let mut total = 0usize;
        let mut confirmed = 0usize;
        let mut completed = 0usize;
        let mut policy_issued = 0usize;
        let mut sla_breached = 0usize;

        for booking in self.store.all().await? {
            if booking.status == Blocked {
                continue;
            }
            total += 1;
            if booking.sla_breached {
                sla_breached += 1;
            }
            match booking.status {
                Confirmed => confirmed += 1,
                Completed | PendingAdminApproval => {
                    confirmed += 1;
                    completed += 1;
                }
                PolicyIssued => {
                    confirmed += 1;
                    completed += 1;
                    policy_issued += 1;
                }
                _ => {}
            }
        }

        Ok(FunnelMetrics {
            total,
            confirmed,
            completed,
            policy_issued,
            sla_breached,
            confirmation_rate: rate(confirmed, total),
            completion_rate: rate(completed, total),
            issue_rate: rate(policy_issued, total),
            sla_breach_rate: rate(sla_breached, total),
        })
    }
}
