#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use leadform_kernel_contracts::event::{TrackingEvent, TrackingEventKind};
use leadform_kernel_contracts::form::{FormField, FormRecord};
use leadform_kernel_contracts::ContractViolation;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRejection {
    pub reason: String,
}

impl SinkRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDeliveryFailure {
    Rejected { sink_id: String, reason: String },
    Panicked { sink_id: String },
}

impl SinkDeliveryFailure {
    pub fn sink_id(&self) -> &str {
        match self {
            Self::Rejected { sink_id, .. } | Self::Panicked { sink_id } => sink_id,
        }
    }
}

impl fmt::Display for SinkDeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { sink_id, reason } => write!(f, "sink '{sink_id}' rejected: {reason}"),
            Self::Panicked { sink_id } => write!(f, "sink '{sink_id}' panicked during delivery"),
        }
    }
}

impl std::error::Error for SinkDeliveryFailure {}

/// External tracking collaborator (analytics SDK, beacon, log writer).
pub trait TrackingSink {
    fn sink_id(&self) -> &str;
    fn deliver(&mut self, event: &TrackingEvent) -> Result<(), SinkRejection>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub event: TrackingEvent,
    pub delivered: Vec<String>,
    pub failures: Vec<SinkDeliveryFailure>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans committed snapshots out to registered sinks, isolating each one.
pub struct EventNotifier {
    sinks: Vec<Box<dyn TrackingSink>>,
    max_sinks: usize,
    next_sequence: u64,
}

impl EventNotifier {
    pub fn new(max_sinks: usize) -> Self {
        Self {
            sinks: Vec::new(),
            max_sinks,
            next_sequence: 1,
        }
    }

    pub fn register(&mut self, sink: Box<dyn TrackingSink>) -> Result<(), ContractViolation> {
        if self.sinks.len() >= self.max_sinks {
            return Err(ContractViolation::InvalidValue {
                field: "event_notifier.sinks",
                reason: "max_sinks exceeded",
            });
        }
        if sink.sink_id().trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_sink.sink_id",
                reason: "must not be empty",
            });
        }
        if self.sinks.iter().any(|s| s.sink_id() == sink.sink_id()) {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_sink.sink_id",
                reason: "must be unique per notifier",
            });
        }
        self.sinks.push(sink);
        Ok(())
    }

    pub fn sink_ids(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.sink_id()).collect()
    }

    /// Builds the snapshot and delivers it to every sink in registration order.
    pub fn notify(
        &mut self,
        kind: TrackingEventKind,
        changed_field: Option<FormField>,
        record: &FormRecord,
    ) -> Result<DeliveryReport, ContractViolation> {
        let event = TrackingEvent::from_record_v1(self.next_sequence, kind, changed_field, record)?;
        self.next_sequence = self.next_sequence.saturating_add(1);

        let mut delivered = Vec::with_capacity(self.sinks.len());
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            let sink_id = sink.sink_id().to_string();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(&event)));
            let failure = match outcome {
                Ok(Ok(())) => {
                    delivered.push(sink_id);
                    continue;
                }
                Ok(Err(rejection)) => SinkDeliveryFailure::Rejected {
                    sink_id,
                    reason: rejection.reason,
                },
                Err(_) => SinkDeliveryFailure::Panicked { sink_id },
            };
            warn!(
                sink_id = failure.sink_id(),
                sequence = event.sequence,
                error = %failure,
                "tracking sink delivery failed; skipping sink"
            );
            failures.push(failure);
        }

        Ok(DeliveryReport {
            event,
            delivered,
            failures,
        })
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("sinks", &self.sink_ids())
            .field("max_sinks", &self.max_sinks)
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

/// Writes each snapshot to the `tracing` log; submissions at info, the rest at debug.
#[derive(Debug, Clone)]
pub struct LogSink {
    sink_id: String,
}

impl LogSink {
    pub fn new(sink_id: impl Into<String>) -> Self {
        Self {
            sink_id: sink_id.into(),
        }
    }
}

impl TrackingSink for LogSink {
    fn sink_id(&self) -> &str {
        &self.sink_id
    }

    fn deliver(&mut self, event: &TrackingEvent) -> Result<(), SinkRejection> {
        if event.kind == TrackingEventKind::Submit {
            info!(
                sequence = event.sequence,
                hashed_email = %event.email_hash,
                last_name = %event.last_name,
                first_name = %event.first_name,
                title = %event.title,
                company = %event.company,
                country_code = %event.country_code,
                "form submit detected"
            );
        } else {
            debug!(
                sequence = event.sequence,
                kind = ?event.kind,
                changed_field = ?event.changed_field,
                "form snapshot committed"
            );
        }
        Ok(())
    }
}

/// Shared view over what a [`RecordingSink`] has captured.
#[derive(Debug, Clone, Default)]
pub struct RecordedEvents {
    events: Rc<RefCell<Vec<TrackingEvent>>>,
}

impl RecordedEvents {
    pub fn snapshot(&self) -> Vec<TrackingEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn last(&self) -> Option<TrackingEvent> {
        self.events.borrow().last().cloned()
    }
}

#[derive(Debug)]
pub struct RecordingSink {
    sink_id: String,
    events: RecordedEvents,
}

impl RecordingSink {
    pub fn new(sink_id: impl Into<String>) -> (Self, RecordedEvents) {
        let events = RecordedEvents::default();
        let sink = Self {
            sink_id: sink_id.into(),
            events: events.clone(),
        };
        (sink, events)
    }
}

impl TrackingSink for RecordingSink {
    fn sink_id(&self) -> &str {
        &self.sink_id
    }

    fn deliver(&mut self, event: &TrackingEvent) -> Result<(), SinkRejection> {
        self.events.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
