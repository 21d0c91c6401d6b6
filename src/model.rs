use std::fmt;

/// One-second resolution over a single 24-hour day.
pub const SLOTS_PER_DAY: usize = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Plan,
    Field,
    Engine,
}

impl RecordKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(RecordKind::Plan),
            0x02 => Some(RecordKind::Field),
            0x03 => Some(RecordKind::Engine),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            RecordKind::Plan => 0x01,
            RecordKind::Field => 0x02,
            RecordKind::Engine => 0x03,
        }
    }
}

/// The Atomic Unit of the archive stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp_ms: i64,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

/// Deterministic content digest over raw bytes, rendered as 16 hex digits.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:016x}", seahash::hash(bytes))
}

/// The finished in-memory timeline: one plan, one day anchor, and a dense
/// second-of-day slot pair. Writable only by the indexer during the single
/// ingestion pass; read-only for the rest of the process lifetime.
pub struct DayModel {
    plan: Option<String>,
    plan_digest: Option<String>,
    day_start_ms: Option<i64>,
    field_slots: Vec<Option<String>>,
    engine_slots: Vec<Vec<Vec<u8>>>,
}

impl fmt::Debug for DayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DayModel")
            .field("has_plan", &self.plan.is_some())
            .field("day_start_ms", &self.day_start_ms)
            .field("field_count", &self.field_slots.iter().filter(|s| s.is_some()).count())
            .field(
                "engine_count",
                &self.engine_slots.iter().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl DayModel {
    pub(crate) fn new() -> Self {
        Self {
            plan: None,
            plan_digest: None,
            day_start_ms: None,
            field_slots: vec![None; SLOTS_PER_DAY],
            engine_slots: vec![Vec::new(); SLOTS_PER_DAY],
        }
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    pub fn plan_digest(&self) -> Option<&str> {
        self.plan_digest.as_deref()
    }

    pub fn day_start_ms(&self) -> Option<i64> {
        self.day_start_ms
    }

    pub fn field(&self, second: usize) -> Option<&str> {
        self.field_slots.get(second)?.as_deref()
    }

    pub fn engines(&self, second: usize) -> &[Vec<u8>] {
        self.engine_slots.get(second).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Maps an absolute timestamp onto the day grid. `None` until the day is
    /// anchored, and for any offset outside `[0, 86399]`.
    pub fn second_index(&self, timestamp_ms: i64) -> Option<usize> {
        let start = self.day_start_ms?;
        // Floor division so pre-midnight timestamps land below zero instead
        // of being truncated into slot 0.
        let offset = timestamp_ms.checked_sub(start)?.div_euclid(1000);
        usize::try_from(offset).ok().filter(|&i| i < SLOTS_PER_DAY)
    }

    // Mutation is confined to the ingestion pass.

    pub(crate) fn set_plan(&mut self, text: String, digest: String) {
        self.plan = Some(text);
        self.plan_digest = Some(digest);
    }

    pub(crate) fn anchor_day(&mut self, day_start_ms: i64) {
        self.day_start_ms = Some(day_start_ms);
    }

    pub(crate) fn put_field(&mut self, second: usize, text: String) {
        self.field_slots[second] = Some(text);
    }

    pub(crate) fn push_engine(&mut self, second: usize, payload: Vec<u8>) {
        self.engine_slots[second].push(payload);
    }
}
