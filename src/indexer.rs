use chrono::{Local, LocalResult, TimeZone};
use tracing::{debug, info};

use crate::error::{ArchiveError, IngestError};
use crate::model::{content_digest, DayModel, Record, RecordKind};

/// Epoch milliseconds of local midnight for the calendar day containing
/// `timestamp_ms`. `None` when the instant cannot be placed on the local
/// calendar (out of chrono's range, or midnight erased by a DST jump).
fn local_midnight_ms(timestamp_ms: i64) -> Option<i64> {
    let dt = Local.timestamp_millis_opt(timestamp_ms).single()?;
    let midnight = dt.date_naive().and_hms_opt(0, 0, 0)?;
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(m) => Some(m.timestamp_millis()),
        LocalResult::Ambiguous(early, _) => Some(early.timestamp_millis()),
        LocalResult::None => None,
    }
}

fn decode_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

/// Consumes the record stream once, strictly in delivery order, and builds
/// the day model. Ordering matters twice over: the first Field record anchors
/// the day, and later Field records overwrite earlier ones slot by slot.
///
/// Any `Err` aborts the whole pass; the partial model is dropped, never
/// returned.
pub fn ingest<I>(records: I) -> Result<DayModel, IngestError>
where
    I: IntoIterator<Item = Result<Record, ArchiveError>>,
{
    let mut model = DayModel::new();
    let mut seen: u64 = 0;
    let mut dropped: u64 = 0;

    for record in records {
        let record = record?;
        seen += 1;

        match record.kind {
            RecordKind::Plan => {
                if model.plan().is_some() {
                    return Err(IngestError::DuplicatePlan);
                }
                let digest = content_digest(&record.payload);
                model.set_plan(decode_text(&record.payload), digest);
            }
            RecordKind::Field => {
                if model.day_start_ms().is_none() {
                    let start = local_midnight_ms(record.timestamp_ms)
                        .ok_or(ArchiveError::Corrupt("timestamp outside calendar range"))?;
                    model.anchor_day(start);
                    info!("day anchored at {}ms from first field record", start);
                }
                match model.second_index(record.timestamp_ms) {
                    Some(second) => model.put_field(second, decode_text(&record.payload)),
                    None => {
                        dropped += 1;
                        debug!("field record at {}ms outside the day, dropped", record.timestamp_ms);
                    }
                }
            }
            RecordKind::Engine => {
                // Engine records never anchor the day; anything seen before
                // the first Field record has no index to land on.
                if model.day_start_ms().is_none() {
                    dropped += 1;
                    debug!("engine record at {}ms before day anchor, dropped", record.timestamp_ms);
                    continue;
                }
                match model.second_index(record.timestamp_ms) {
                    Some(second) => model.push_engine(second, record.payload),
                    None => {
                        dropped += 1;
                        debug!("engine record at {}ms outside the day, dropped", record.timestamp_ms);
                    }
                }
            }
        }
    }

    info!("ingest complete: {} records, {} dropped", seen, dropped);
    Ok(model)
}
