//! Dense per-column order index for tasks
//!
//! Within one status column the `order` values of the tasks are always
//! `0..n`. A move takes the task out of its column (closing the gap it
//! leaves), opens a gap at the target position and drops the task into it.
//! The board is kept sorted by `(status, order)`, comparing statuses by
//! their wire names.

use super::collection::Collection;
use crate::models::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A column and a position inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub status: TaskStatus,
    pub order: u32,
}

impl Placement {
    pub fn of(task: &Task) -> Self {
        Self {
            status: task.status,
            order: task.order,
        }
    }
}

/// Result of [`move_task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Placement,
    /// Target placement after clamping
    pub to: Placement,
}

/// Number of tasks in `status`, not counting `except`
pub fn bucket_len(items: &Collection<Task>, status: TaskStatus, except: Option<&str>) -> usize {
    items.count_where(|t| t.status == status && Some(t.id.as_str()) != except)
}

/// Shift every task after `order` in `status` one slot up
pub fn close_gap(items: &mut Collection<Task>, status: TaskStatus, order: u32, except: &str) {
    items.shift_where(
        |t| t.status == status && t.order > order && t.id != except,
        |t| t.order -= 1,
    );
}

/// Shift every task at or after `order` in `status` one slot down
pub fn open_gap(items: &mut Collection<Task>, status: TaskStatus, order: u32, except: &str) {
    items.shift_where(
        |t| t.status == status && t.order >= order && t.id != except,
        |t| t.order += 1,
    );
}

pub fn sort_board(items: &mut Collection<Task>) {
    items.sort_by(|a, b| {
        a.status
            .as_str()
            .cmp(b.status.as_str())
            .then(a.order.cmp(&b.order))
    });
}

/// Sort the board and renumber every column to `0..n`.
///
/// Only tasks whose order actually changes are written.
pub fn compact(items: &mut Collection<Task>) {
    sort_board(items);
    let mut column: Option<TaskStatus> = None;
    let mut next = 0u32;
    for index in 0..items.len() {
        let Some((status, order)) = items.at(index).map(|t| (t.status, t.order)) else {
            break;
        };
        if column != Some(status) {
            column = Some(status);
            next = 0;
        }
        if order != next {
            let expected = next;
            items.shift_at(index, |t| t.order = expected);
        }
        next += 1;
    }
}

/// Move task `id` to `order` inside `status`.
///
/// `order` is clamped to the size of the target column. Returns `None` when
/// the task is not in the collection.
pub fn move_task(
    items: &mut Collection<Task>,
    id: &str,
    status: TaskStatus,
    order: u32,
    now: DateTime<Utc>,
) -> Option<Move> {
    let from = Placement::of(items.get(id)?);
    let order = order.min(bucket_len(items, status, Some(id)) as u32);

    close_gap(items, from.status, from.order, id);
    open_gap(items, status, order, id);
    items.update(id, |t| {
        t.status = status;
        t.order = order;
        t.updated_at = now;
    });
    sort_board(items);

    Some(Move {
        from,
        to: Placement { status, order },
    })
}

/// Whether every column in `tasks` is numbered exactly `0..n`
pub fn is_dense(tasks: &[Task]) -> bool {
    TaskStatus::ALL.iter().all(|status| {
        let mut orders: Vec<u32> = tasks
            .iter()
            .filter(|t| t.status == *status)
            .map(|t| t.order)
            .collect();
        orders.sort_unstable();
        orders.iter().enumerate().all(|(i, o)| *o == i as u32)
    })
}

/// The columns touched by a move, as they were before it.
///
/// Taken before the move and sealed right after it; a rollback restores the
/// old placements only if nobody wrote to those columns in between.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    statuses: Vec<TaskStatus>,
    placements: Vec<(String, Placement)>,
    moved: Option<(String, DateTime<Utc>)>,
    revisions: Vec<(String, u64)>,
    generation: u64,
}

impl BoardSnapshot {
    /// Record the placements of every task in `statuses`
    pub fn capture(items: &Collection<Task>, statuses: &[TaskStatus]) -> Self {
        let mut unique: Vec<TaskStatus> = Vec::new();
        for status in statuses {
            if !unique.contains(status) {
                unique.push(*status);
            }
        }
        let placements = items
            .iter()
            .filter(|t| unique.contains(&t.status))
            .map(|t| (t.id.clone(), Placement::of(t)))
            .collect();
        Self {
            statuses: unique,
            placements,
            moved: None,
            revisions: Vec::new(),
            generation: items.generation(),
        }
    }

    /// Remember the moving task's previous `updatedAt`
    pub fn with_moved(mut self, id: &str, updated_at: DateTime<Utc>) -> Self {
        self.moved = Some((id.to_string(), updated_at));
        self
    }

    /// Stamp the revisions the columns carry right after the local move
    pub fn seal(&mut self, items: &Collection<Task>) {
        self.revisions = items
            .iter()
            .filter(|t| self.statuses.contains(&t.status))
            .filter_map(|t| items.revision(&t.id).map(|r| (t.id.clone(), r)))
            .collect();
    }

    /// Whether the columns still hold exactly what the move left there
    pub fn is_current(&self, items: &Collection<Task>) -> bool {
        if items.generation() != self.generation {
            return false;
        }
        let members: HashSet<&str> = items
            .iter()
            .filter(|t| self.statuses.contains(&t.status))
            .map(|t| t.id.as_str())
            .collect();
        members.len() == self.revisions.len()
            && self
                .revisions
                .iter()
                .all(|(id, rev)| members.contains(id.as_str()) && items.revision(id) == Some(*rev))
    }

    /// Put every captured task back where it was
    pub fn restore(&self, items: &mut Collection<Task>) {
        for (id, placement) in &self.placements {
            items.shift(id, |t| {
                t.status = placement.status;
                t.order = placement.order;
            });
        }
        if let Some((id, updated_at)) = &self.moved {
            items.update(id, |t| t.updated_at = *updated_at);
        }
        sort_board(items);
    }
}
