use std::sync::Arc;

use serde::Serialize;

use crate::error::QueryError;
use crate::model::{DayModel, SLOTS_PER_DAY};
use crate::{IngestState, ServiceContext};

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATETIME: &str = match option_env!("BUILD_DATETIME") {
    Some(stamp) => stamp,
    None => "unknown",
};

/// Static build descriptor, served even before the model is ready.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    #[serde(rename = "buildVersion")]
    pub build_version: &'static str,
    #[serde(rename = "buildDatetime")]
    pub build_datetime: &'static str,
}

/// One second of the day: the field snapshot plus every engine event that
/// landed on it, tagged with the plan digest of the serving model.
#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    #[serde(rename = "modelHash")]
    pub model_hash: Option<String>,
    #[serde(rename = "modelField")]
    pub field: String,
    #[serde(rename = "modelEngines")]
    pub engines: Vec<Vec<u8>>,
}

/// Read-only query surface over the shared context. Everything except
/// `version` is gated on the ingestion pass having completed cleanly.
#[derive(Debug, Clone)]
pub struct QueryService {
    ctx: Arc<ServiceContext>,
}

impl QueryService {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn model(&self) -> Result<Arc<DayModel>, QueryError> {
        match self.ctx.snapshot() {
            IngestState::Loading => Err(QueryError::NotReady),
            IngestState::Failed(_) => Err(QueryError::IngestFailed),
            IngestState::Ready(model) => Ok(model),
        }
    }

    /// Readiness probe for routes that carry no data of their own.
    pub fn gate(&self) -> Result<(), QueryError> {
        self.model().map(|_| ())
    }

    pub fn plan(&self) -> Result<String, QueryError> {
        let model = self.model()?;
        model.plan().map(str::to_owned).ok_or(QueryError::NoPlan)
    }

    pub fn slice(&self, second: i64) -> Result<Slice, QueryError> {
        let model = self.model()?;
        let second = usize::try_from(second)
            .ok()
            .filter(|&s| s < SLOTS_PER_DAY)
            .ok_or(QueryError::NotFound)?;

        // Field presence gates the whole slice; engine data alone is never
        // served for an index.
        let field = model.field(second).ok_or(QueryError::NotFound)?.to_owned();

        Ok(Slice {
            model_hash: model.plan_digest().map(str::to_owned),
            field,
            engines: model.engines(second).to_vec(),
        })
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            name: SERVICE_NAME,
            build_version: BUILD_VERSION,
            build_datetime: BUILD_DATETIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::indexer;
    use crate::model::{content_digest, Record, RecordKind};
    use chrono::{Local, TimeZone};

    fn t0() -> i64 {
        Local
            .with_ymd_and_hms(2018, 1, 22, 8, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn ok(timestamp_ms: i64, kind: RecordKind, payload: &[u8]) -> Result<Record, ArchiveError> {
        Ok(Record {
            timestamp_ms,
            kind,
            payload: payload.to_vec(),
        })
    }

    fn ready_service(records: Vec<Result<Record, ArchiveError>>) -> QueryService {
        let ctx = Arc::new(ServiceContext::new());
        ctx.mark_ready(indexer::ingest(records).unwrap());
        QueryService::new(ctx)
    }

    #[test]
    fn gated_until_ready() {
        let svc = QueryService::new(Arc::new(ServiceContext::new()));
        assert_eq!(svc.plan(), Err(QueryError::NotReady));
        assert_eq!(svc.slice(0).unwrap_err(), QueryError::NotReady);
        assert_eq!(svc.version().name, "fieldmap");
    }

    #[test]
    fn failed_ingestion_is_terminal_for_queries() {
        let ctx = Arc::new(ServiceContext::new());
        ctx.mark_failed("multiple plans unsupported".to_string());
        let svc = QueryService::new(ctx);
        assert_eq!(svc.plan(), Err(QueryError::IngestFailed));
        assert_eq!(svc.slice(0).unwrap_err(), QueryError::IngestFailed);
        assert_eq!(svc.version().build_version, BUILD_VERSION);
    }

    #[test]
    fn slice_returns_field_and_engines() {
        let svc = ready_service(vec![
            ok(t0(), RecordKind::Plan, b"P1"),
            ok(t0(), RecordKind::Field, b"F1"),
            ok(t0(), RecordKind::Engine, b"E1"),
        ]);

        let slice = svc.slice(28_800).unwrap();
        assert_eq!(slice.field, "F1");
        assert_eq!(slice.engines, vec![b"E1".to_vec()]);
        assert_eq!(slice.model_hash.as_deref(), Some(content_digest(b"P1").as_str()));
    }

    #[test]
    fn engine_only_slots_stay_not_found() {
        // One field anchors the day, a second slot gets engine data only.
        let svc = ready_service(vec![
            ok(t0(), RecordKind::Field, b"F1"),
            ok(t0() + 1000, RecordKind::Engine, b"E1"),
        ]);

        assert_eq!(svc.slice(28_801).unwrap_err(), QueryError::NotFound);
    }

    #[test]
    fn slice_rejects_out_of_range_seconds() {
        let svc = ready_service(vec![ok(t0(), RecordKind::Field, b"F1")]);
        assert_eq!(svc.slice(-1).unwrap_err(), QueryError::NotFound);
        assert_eq!(svc.slice(86_400).unwrap_err(), QueryError::NotFound);
    }

    #[test]
    fn plan_without_ingested_plan_is_unavailable() {
        let svc = ready_service(vec![ok(t0(), RecordKind::Field, b"F1")]);
        assert_eq!(svc.plan(), Err(QueryError::NoPlan));

        let slice = svc.slice(28_800).unwrap();
        assert_eq!(slice.model_hash, None);
    }

    #[test]
    fn plan_round_trips() {
        let svc = ready_service(vec![ok(t0(), RecordKind::Plan, b"P1")]);
        assert_eq!(svc.plan().unwrap(), "P1");
    }
}
