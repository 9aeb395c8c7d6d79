//! Decoded CAN signal access.
//!
//! Bit-level frame decoding happens upstream; this module only deals with the
//! resulting table of named signal values per message id.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

/// Latest decoded value of every signal, keyed by message id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTable {
    messages: HashMap<u32, BTreeMap<String, f64>>,
}

impl SignalTable {
    /// Creates an empty `SignalTable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last decoded value of `name` in message `id`, if it was ever received.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::can::parser::SignalTable;
    ///
    /// let mut table = SignalTable::new();
    /// table.set(0x210, "LONG_DIST", 42.5);
    /// assert_eq!(table.value(0x210, "LONG_DIST"), Some(42.5));
    /// assert_eq!(table.value(0x210, "LAT_DIST"), None);
    /// ```
    pub fn value(&self, id: u32, name: &str) -> Option<f64> {
        self.messages.get(&id).and_then(|m| m.get(name)).copied()
    }

    /// Stores a decoded signal value.
    pub fn set(&mut self, id: u32, name: &str, value: f64) {
        self.messages
            .entry(id)
            .or_default()
            .insert(name.to_string(), value);
    }
}

/// Source of decoded CAN messages.
pub trait CanParser {
    /// Waits up to `timeout` for the next batch of decoded messages and
    /// applies it to the signal table.
    ///
    /// Returns the ids refreshed by the batch, or an empty set on timeout.
    fn update(&mut self, timeout: Duration) -> BTreeSet<u32>;

    /// Whether every checked message arrived fresh and passed its checksum.
    fn can_valid(&self) -> bool;

    /// Latest decoded values.
    fn table(&self) -> &SignalTable;
}

/// One decoded message: id plus named signal values.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub id: u32,
    pub signals: Vec<(String, f64)>,
}

impl DecodedMessage {
    /// Creates a `DecodedMessage` from `(name, value)` pairs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::can::parser::DecodedMessage;
    ///
    /// let msg = DecodedMessage::new(0x220, &[("SCORE", 80.0)]);
    /// assert_eq!(msg.signals.len(), 1);
    /// ```
    pub fn new(id: u32, signals: &[(&str, f64)]) -> Self {
        DecodedMessage {
            id,
            signals: signals
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }
}

/// In-memory parser replaying queued batches of decoded messages.
///
/// Each call to [`CanParser::update`] consumes exactly one queued batch. When
/// the queue is empty the call sleeps for the timeout and reports nothing,
/// like a live bus that went quiet.
#[derive(Debug)]
pub struct QueuedCanParser {
    table: SignalTable,
    batches: VecDeque<Vec<DecodedMessage>>,
    can_valid: bool,
}

impl QueuedCanParser {
    /// Creates an empty parser that reports a valid bus.
    pub fn new() -> Self {
        QueuedCanParser {
            table: SignalTable::new(),
            batches: VecDeque::new(),
            can_valid: true,
        }
    }

    /// Queues a batch of messages to be delivered by one `update` call.
    pub fn push_batch(&mut self, batch: Vec<DecodedMessage>) {
        self.batches.push_back(batch);
    }

    /// Overrides the bus validity reported by [`CanParser::can_valid`].
    pub fn set_can_valid(&mut self, can_valid: bool) {
        self.can_valid = can_valid;
    }

    /// Number of batches still waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.batches.len()
    }
}

impl Default for QueuedCanParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CanParser for QueuedCanParser {
    fn update(&mut self, timeout: Duration) -> BTreeSet<u32> {
        let Some(batch) = self.batches.pop_front() else {
            std::thread::sleep(timeout);
            return BTreeSet::new();
        };

        let mut updated = BTreeSet::new();
        for msg in batch {
            for (name, value) in &msg.signals {
                self.table.set(msg.id, name, *value);
            }
            updated.insert(msg.id);
        }
        updated
    }

    fn can_valid(&self) -> bool {
        self.can_valid
    }

    fn table(&self) -> &SignalTable {
        &self.table
    }
}
