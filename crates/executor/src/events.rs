// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Execution events. Call events stream to the transaction sink as frames
//! complete; log events buffer on their frame and reach the sink only when
//! the frame chain syncs to the root.

use warren_types::{Address, Bytes, Word256, U256};
use warren_vm_types::{CallType, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub call_type: CallType,
    pub origin: Address,
    pub caller: Address,
    pub callee: Address,
    pub input: Bytes,
    pub value: U256,
    pub gas: u64,
    pub stack_depth: u64,
    pub return_data: Bytes,
    pub exception: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub address: Address,
    pub topics: Vec<Word256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Call(CallEvent),
    Log(LogEvent),
}

/// Ordered consumer of execution events. Implementations must preserve
/// submission order.
pub trait EventSink {
    fn call(&mut self, event: CallEvent) -> Result<()>;
    fn log(&mut self, event: LogEvent) -> Result<()>;
}

/// Collects every event in order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    pub events: Vec<Event>,
}

impl CollectingEventSink {
    pub fn new() -> Self { Self::default() }

    pub fn call_events(&self) -> impl Iterator<Item = &CallEvent> {
        self.events.iter().filter_map(|event| match event {
            Event::Call(call) => Some(call),
            _ => None,
        })
    }

    pub fn log_events(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter().filter_map(|event| match event {
            Event::Log(log) => Some(log),
            _ => None,
        })
    }
}

impl EventSink for CollectingEventSink {
    fn call(&mut self, event: CallEvent) -> Result<()> {
        self.events.push(Event::Call(event));
        Ok(())
    }

    fn log(&mut self, event: LogEvent) -> Result<()> {
        self.events.push(Event::Log(event));
        Ok(())
    }
}

/// Passes call events through and rejects log emission; the sink variant
/// for static contexts.
pub struct LogFreeEventSink<'a> {
    inner: &'a mut dyn EventSink,
}

impl<'a> LogFreeEventSink<'a> {
    pub fn new(inner: &'a mut dyn EventSink) -> Self {
        LogFreeEventSink { inner }
    }
}

impl EventSink for LogFreeEventSink<'_> {
    fn call(&mut self, event: CallEvent) -> Result<()> {
        self.inner.call(event)
    }

    fn log(&mut self, _event: LogEvent) -> Result<()> {
        Err(Error::MutableCallInStaticContext)
    }
}

/// Swallows everything.
#[derive(Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn call(&mut self, _event: CallEvent) -> Result<()> { Ok(()) }

    fn log(&mut self, _event: LogEvent) -> Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_event() -> LogEvent {
        LogEvent {
            address: Address::zero(),
            topics: vec![],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn collecting_sink_preserves_order() {
        let mut sink = CollectingEventSink::new();
        sink.log(log_event()).unwrap();
        sink.call(CallEvent {
            call_type: CallType::Call,
            origin: Address::zero(),
            caller: Address::zero(),
            callee: Address::zero(),
            input: vec![],
            value: U256::zero(),
            gas: 0,
            stack_depth: 1,
            return_data: vec![],
            exception: None,
        })
        .unwrap();
        assert!(matches!(sink.events[0], Event::Log(_)));
        assert!(matches!(sink.events[1], Event::Call(_)));
    }

    #[test]
    fn log_free_sink_rejects_logs() {
        let mut inner = CollectingEventSink::new();
        let mut sink = LogFreeEventSink::new(&mut inner);
        assert_eq!(
            sink.log(log_event()),
            Err(Error::MutableCallInStaticContext)
        );
        assert!(inner.events.is_empty());
    }
}
