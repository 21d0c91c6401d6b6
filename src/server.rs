use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use serde::Serialize;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::error::QueryError;
use crate::query::QueryService;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_reply(err: &QueryError) -> warp::reply::Response {
    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: err.to_string(),
        }),
        StatusCode::BAD_REQUEST,
    )
    .into_response()
}

fn slice_reply(
    svc: &QueryService,
    params: &HashMap<String, String>,
) -> Result<warp::reply::Response, QueryError> {
    let time = params.get("time").ok_or(QueryError::TimeNotSpecified)?;
    let second: i64 = time.parse().map_err(|_| QueryError::TimeNotSpecified)?;
    let slice = svc.slice(second)?;
    Ok(warp::reply::json(&slice).into_response())
}

pub fn routes(
    svc: QueryService,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    // 1. GET /api/model -> plan text
    let model = warp::get()
        .and(warp::path!("api" / "model"))
        .and(with_service(svc.clone()))
        .map(|svc: QueryService| match svc.plan() {
            Ok(text) => warp::reply::with_status(text, StatusCode::OK).into_response(),
            Err(err) => error_reply(&err),
        });

    // 2. GET /api/field?time=<secondOfDay> -> slice json
    let field = warp::get()
        .and(warp::path!("api" / "field"))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_service(svc.clone()))
        .map(
            |params: HashMap<String, String>, svc: QueryService| match slice_reply(&svc, &params) {
                Ok(reply) => reply,
                Err(err) => error_reply(&err),
            },
        );

    // 3. GET /api/version -> build descriptor, never gated
    let version = warp::get()
        .and(warp::path!("api" / "version"))
        .and(with_service(svc.clone()))
        .map(|svc: QueryService| warp::reply::json(&svc.version()).into_response());

    // 4. Every other /api/* path answers 400 until the model is ready, then
    //    falls through to the default 404.
    let fallback = warp::path("api")
        .and(warp::path::tail())
        .and(with_service(svc))
        .and_then(|_tail: warp::path::Tail, svc: QueryService| async move {
            match svc.gate() {
                Ok(()) => Err(warp::reject::not_found()),
                Err(err) => Ok::<_, Rejection>(error_reply(&err)),
            }
        });

    let cors = warp::cors().allow_any_origin().allow_method("GET");

    model.or(field).or(version).or(fallback).with(cors)
}

pub async fn run(svc: QueryService, port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("http api listening on {}", addr);
    warp::serve(routes(svc)).run(addr).await;
}

fn with_service(
    svc: QueryService,
) -> impl Filter<Extract = (QueryService,), Error = Infallible> + Clone {
    warp::any().map(move || svc.clone())
}
