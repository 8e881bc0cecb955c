// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue statistics over open tickets.

use chrono::{DateTime, Utc};
use handoff_core::{PriorityLevel, QueueStats, Ticket, TicketStatus};

/// Summarizes the waiting and assigned tickets in `tickets`.
///
/// Wait times are measured from ticket creation to `now`, over waiting
/// tickets only. Tickets in terminal states are ignored.
pub fn compute_stats(tickets: &[Ticket], now: DateTime<Utc>) -> QueueStats {
    let mut stats = QueueStats {
        waiting_by_priority: PriorityLevel::all().into_iter().map(|l| (l, 0)).collect(),
        ..QueueStats::default()
    };

    let mut total_wait_secs = 0i64;
    for ticket in tickets {
        match ticket.status {
            TicketStatus::Waiting => {
                stats.waiting += 1;
                *stats
                    .waiting_by_priority
                    .entry(ticket.priority_level)
                    .or_insert(0) += 1;
                let wait = (now - ticket.created_at).num_seconds().max(0);
                total_wait_secs += wait;
                stats.longest_wait_secs = stats.longest_wait_secs.max(wait);
            }
            TicketStatus::Assigned => stats.assigned += 1,
            TicketStatus::Resolved | TicketStatus::Cancelled => {}
        }
    }

    stats.total = stats.waiting + stats.assigned;
    if stats.waiting > 0 {
        stats.average_wait_secs = total_wait_secs as f64 / stats.waiting as f64;
    }
    stats
}

/// Number of waiting tickets served before `ticket`.
pub fn queue_position(ticket: &Ticket, tickets: &[Ticket]) -> usize {
    tickets
        .iter()
        .filter(|other| {
            other.id != ticket.id && other.status == TicketStatus::Waiting && other.is_ahead_of(ticket)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use handoff_core::{SlaRecord, TicketId};

    fn ticket(id: &str, priority: u8, status: TicketStatus, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: TicketId::from(id),
            user_id: "u".into(),
            conversation_id: "c".into(),
            status,
            priority,
            priority_level: PriorityLevel::from_priority(priority),
            reason: "help".into(),
            context: Vec::new(),
            sla: SlaRecord {
                response_deadline: created_at,
                resolution_deadline: created_at,
                escalation_level: 0,
                is_overdue: false,
            },
            assignment_history: Vec::new(),
            assigned_agent: None,
            escalation_history: Vec::new(),
            resolution_notes: None,
            resolved_at: None,
            resolution_time_ms: None,
            feedback: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn stats_over_mixed_statuses() {
        let now = Utc::now();
        let tickets = vec![
            ticket("a", 5, TicketStatus::Waiting, now - Duration::seconds(30)),
            ticket("b", 3, TicketStatus::Waiting, now - Duration::seconds(90)),
            ticket("c", 3, TicketStatus::Assigned, now - Duration::seconds(600)),
            ticket("d", 1, TicketStatus::Resolved, now - Duration::seconds(900)),
        ];

        let stats = compute_stats(&tickets, now);
        assert_eq!(stats.waiting, 2);
        assert_eq!(stats.assigned, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.longest_wait_secs, 90);
        assert!((stats.average_wait_secs - 60.0).abs() < f64::EPSILON);
        assert_eq!(stats.waiting_by_priority[&PriorityLevel::Emergency], 1);
        assert_eq!(stats.waiting_by_priority[&PriorityLevel::Medium], 1);
        assert_eq!(stats.waiting_by_priority[&PriorityLevel::Low], 0);
    }

    #[test]
    fn empty_queue_has_zero_wait() {
        let stats = compute_stats(&[], Utc::now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_wait_secs, 0.0);
        assert_eq!(stats.waiting_by_priority.len(), 4);
    }

    #[test]
    fn position_orders_by_priority_then_age() {
        let now = Utc::now();
        let old_low = ticket("old-low", 2, TicketStatus::Waiting, now - Duration::seconds(300));
        let new_high = ticket("new-high", 4, TicketStatus::Waiting, now);
        let older_high = ticket("older-high", 4, TicketStatus::Waiting, now - Duration::seconds(10));
        let assigned = ticket("busy", 5, TicketStatus::Assigned, now - Duration::seconds(500));
        let all = vec![old_low.clone(), new_high.clone(), older_high.clone(), assigned];

        assert_eq!(queue_position(&older_high, &all), 0);
        assert_eq!(queue_position(&new_high, &all), 1);
        assert_eq!(queue_position(&old_low, &all), 2);
    }
}
