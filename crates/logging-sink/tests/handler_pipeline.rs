//! Integration tests combining sinks: asynchronous wrapping, cleanup filters
//! and file output.

use std::sync::Arc;

use logging_sink::{
    AsyncHandler, CleanupFilter, FileConfig, FileHandler, FilterElement, Handler, Level,
    MemoryHandler, OverflowAction, PatternFormatter, Record, RotationPolicy,
};

fn record(level: Level, category: &str, message: &str) -> Record {
    Record::new(level, category, message)
}

// ============================================================================
// Overflow
// ============================================================================

/// Verifies that with a single slot and discard-oldest only the newest of two
/// undrained records is delivered.
#[test]
fn discard_oldest_with_single_slot_delivers_newest() {
    let memory = Arc::new(MemoryHandler::new());
    let wrapper = AsyncHandler::new(1, OverflowAction::DiscardOldest).unwrap();
    wrapper.add_handler(memory.clone());

    wrapper.suspend();
    wrapper.publish(&record(Level::Info, "io", "first"));
    wrapper.publish(&record(Level::Info, "io", "second"));
    assert_eq!(wrapper.pending(), 1);
    wrapper.resume();
    wrapper.flush();

    assert_eq!(memory.messages(), vec!["second"]);
    wrapper.close();
}

/// Verifies that a blocking queue delivers everything once drained.
#[test]
fn blocking_queue_loses_nothing() {
    let memory = Arc::new(MemoryHandler::new());
    let wrapper = AsyncHandler::new(2, OverflowAction::Block).unwrap();
    wrapper.add_handler(memory.clone());

    for index in 0..50 {
        wrapper.publish(&record(Level::Info, "io", &index.to_string()));
    }
    wrapper.close();

    let expected: Vec<String> = (0..50).map(|index| index.to_string()).collect();
    assert_eq!(memory.messages(), expected);
    assert!(memory.core().is_closed());
}

// ============================================================================
// Filter and File
// ============================================================================

/// Verifies that a filtered asynchronous file handler writes only accepted
/// records and that closing drains the queue to disk.
#[test]
fn filtered_async_file_handler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("app.log");
    let file = FileHandler::open(
        FileConfig {
            path: path.clone(),
            append: false,
            rotation: RotationPolicy::disabled(),
        },
        Arc::new(PatternFormatter::new("%-5p %c %s%n")),
    )
    .unwrap();
    let wrapper = AsyncHandler::new(16, OverflowAction::Block).unwrap();
    wrapper.add_handler(Arc::new(file));
    wrapper.set_filter(Some(Arc::new(CleanupFilter::new([FilterElement::new(
        "io.noisy",
        Level::Warn,
        true,
    )]))));

    wrapper.publish(&record(Level::Info, "io.noisy.cache", "miss"));
    wrapper.publish(&record(Level::Error, "io.noisy.cache", "evicted"));
    wrapper.publish(&record(Level::Info, "io.app", "ready"));
    wrapper.close();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "ERROR io.noisy.cache evicted\nINFO  io.app ready\n");
}
