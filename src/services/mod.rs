//! Engine services: recurrence, lifecycle, sweeping, calendar and the live board.

pub mod calendar;
pub mod lifecycle;
pub mod recurrence;
pub mod sweeper;
pub mod task_board;

pub use calendar::{CalendarIndex, DaySummary, MonthView, StatusBreakdown};
pub use lifecycle::{InFlightGuard, InFlightTicket, TaskLifecycleService};
pub use recurrence::{RecurrenceGenerator, MONTHLY_HARD_CAP, WEEKLY_HARD_CAP};
pub use sweeper::{
    MissedTaskSweeper, SweeperDaemon, SweeperDaemonConfig, SweeperEvent, SweeperHandle, SweeperStatus,
};
pub use task_board::{BoardState, TaskBoard, TaskStats};
