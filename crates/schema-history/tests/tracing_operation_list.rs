#![forbid(unsafe_code)]

//! Structured logging emitted by the operation log.
//!
//! Run:
//!   cargo test -p schema-history --test tracing_operation_list

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use schema_history::{HistoryConfig, MemoryModel, OperationKind, OperationList};

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    fields: HashMap<String, String>,
}

struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.fields.get("message").cloned())
            .collect()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

fn with_captured_tracing<F: FnOnce()>(f: F) -> CaptureHandle {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = Capture {
        spans: Arc::clone(&spans),
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { spans, events }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn registration_logs_structured_fields() {
    let handle = with_captured_tracing(|| {
        let mut model = MemoryModel::new();
        let t = model.add_table("invoices");
        let mut list = OperationList::new(HistoryConfig::new(4)).unwrap();
        list.register_object(&model, &t, OperationKind::Modified, None, None)
            .unwrap();
    });

    let events = handle.events();
    let registered = events
        .iter()
        .find(|e| e.fields.get("message").map(String::as_str) == Some("operation registered"))
        .expect("registration event");
    assert_eq!(registered.level, tracing::Level::DEBUG);
    assert_eq!(registered.target, "schema_history.oplog");
    assert_eq!(registered.fields["object"], "invoices");
    assert_eq!(registered.fields["kind"], "modified");
}

#[test]
fn undo_and_redo_open_spans_with_step_count() {
    let handle = with_captured_tracing(|| {
        let mut model = MemoryModel::new();
        let a = model.add_table("a");
        let b = model.add_table("b");
        let mut list = OperationList::new(HistoryConfig::new(4)).unwrap();
        list.start_chain();
        list.register_object(&model, &a, OperationKind::Modified, None, None)
            .unwrap();
        list.register_object(&model, &b, OperationKind::Modified, None, None)
            .unwrap();
        list.finish_chain().unwrap();
        list.undo_operation(&mut model).unwrap();
        list.redo_operation(&mut model).unwrap();
    });

    let spans = handle.spans();
    let undo = spans
        .iter()
        .find(|s| s.name == "oplog.undo")
        .expect("undo span");
    assert_eq!(undo.fields["steps"], "2");
    assert!(spans.iter().any(|s| s.name == "oplog.redo"));
}

#[test]
fn eviction_and_misuse_are_logged() {
    let handle = with_captured_tracing(|| {
        let mut model = MemoryModel::new();
        let a = model.add_table("a");
        let mut list = OperationList::new(HistoryConfig::new(1)).unwrap();
        list.register_object(&model, &a, OperationKind::Modified, None, None)
            .unwrap();
        list.register_object(&model, &a, OperationKind::Moved, None, None)
            .unwrap();
        list.start_chain();
        list.start_chain();
    });

    let messages = handle.messages();
    assert!(messages.iter().any(|m| m == "oldest operation evicted"));

    let warnings: Vec<_> = handle
        .events()
        .into_iter()
        .filter(|e| e.level == tracing::Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 1);
}
