//! Structured pipeline events and the sinks that receive them.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Source table an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Table {
    Needs,
    Calls,
    Auctions,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Needs => "needs",
            Table::Calls => "calls",
            Table::Auctions => "auctions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event emitted by a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    /// Requested range passed the precondition checks.
    RangeValidated {
        start: NaiveDate,
        end: NaiveDate,
        utc_offset_secs: i32,
    },
    /// Raw rows returned by the source.
    RowsFetched { table: Table, rows: usize },
    /// Rows converted to canonical records.
    RowsParsed { table: Table, rows: usize },
    /// Overlapping rows removed.
    DuplicatesDropped { table: Table, dropped: usize },
    /// Needs aggregated onto the call grid.
    WindowsAligned {
        windows: usize,
        ignored_samples: usize,
        backfilled_minutes: usize,
    },
    /// Call windows redistributed to minutes.
    MinutesApproximated { minutes: usize, max_residual_mw: f64 },
    /// Marginal prices resolved.
    MinutesPriced { minutes: usize, unpriced: usize },
    /// Full run completed.
    RunFinished { minutes: usize, priced: usize },
}

/// Receiver of pipeline events.
pub trait EventSink {
    fn emit(&self, event: &PipelineEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Sink that forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RangeValidated {
                start,
                end,
                utc_offset_secs,
            } => tracing::info!(%start, %end, utc_offset_secs, "range validated"),
            PipelineEvent::RowsFetched { table, rows } => {
                tracing::info!(%table, rows, "rows fetched")
            }
            PipelineEvent::RowsParsed { table, rows } => {
                tracing::debug!(%table, rows, "rows parsed")
            }
            PipelineEvent::DuplicatesDropped { table, dropped } => {
                tracing::debug!(%table, dropped, "duplicates dropped")
            }
            PipelineEvent::WindowsAligned {
                windows,
                ignored_samples,
                backfilled_minutes,
            } => {
                if *backfilled_minutes > 0 {
                    tracing::warn!(windows, ignored_samples, backfilled_minutes, "minutes without needs samples back-filled");
                } else {
                    tracing::info!(windows, ignored_samples, "windows aligned");
                }
            }
            PipelineEvent::MinutesApproximated {
                minutes,
                max_residual_mw,
            } => tracing::info!(minutes, max_residual_mw, "minutes approximated"),
            PipelineEvent::MinutesPriced { minutes, unpriced } => {
                tracing::info!(minutes, unpriced, "minutes priced")
            }
            PipelineEvent::RunFinished { minutes, priced } => {
                tracing::info!(minutes, priced, "run finished")
            }
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, event: &PipelineEvent) {
        (**self).emit(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&self, event: &PipelineEvent) {
        (**self).emit(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<PipelineEvent>>);

    impl EventSink for Recorder {
        fn emit(&self, event: &PipelineEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let recorder = Recorder::default();
        {
            let boxed: Box<dyn EventSink + '_> = Box::new(&recorder);
            boxed.emit(&PipelineEvent::RowsFetched {
                table: Table::Calls,
                rows: 96,
            });
        }
        assert_eq!(recorder.0.borrow().len(), 1);
    }

    #[test]
    fn test_table_display() {
        assert_eq!(Table::Auctions.to_string(), "auctions");
    }
}
