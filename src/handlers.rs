//! The request dispatcher (C7): a single fallback handler that parses the
//! request the way the original `parseRequest`/`requestHandler` pair did,
//! rather than leaning on axum's route tree to disambiguate `/<entity>/new`
//! from `/<entity>/<id>`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::engine::dto;
use crate::engine::query::{LocationAvgFilter, UserVisitsFilter};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entity {
    Users,
    Locations,
    Visits,
}

#[derive(Debug, Clone, Copy)]
enum IdOrNew {
    New,
    Id(i32),
}

struct ParsedPath {
    entity: Entity,
    id_or_new: IdOrNew,
    action: Option<String>,
}

/// Splits `/ENTITY[/ID_OR_new][/ACTION]` into its parts. Returns `None` for
/// an unknown entity segment or a path with no id/new segment at all —
/// both are 400s.
fn parse_path(path: &str) -> Option<ParsedPath> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let entity = match segments.next()? {
        "users" => Entity::Users,
        "locations" => Entity::Locations,
        "visits" => Entity::Visits,
        _ => return None,
    };
    let id_segment = segments.next()?;
    let id_or_new = if id_segment == "new" {
        IdOrNew::New
    } else {
        match id_segment.parse::<i32>() {
            Ok(id) if id > 0 => IdOrNew::Id(id),
            _ => IdOrNew::Id(0),
        }
    };
    let action = segments.next().map(str::to_string);
    Some(ParsedPath { entity, id_or_new, action })
}

/// Tokenizes `key=val&key=val`, rejecting a malformed pair (missing `=` or
/// an empty value) the way the original query parser did.
fn parse_query(query: &str) -> Result<Vec<(String, String)>, ApiError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    query
        .split('&')
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ApiError::BadRequest(format!("malformed query parameter: {pair}")))?;
            if value.is_empty() {
                return Err(ApiError::BadRequest(format!("empty query value for {key}")));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

fn find_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn parse_i32_param(params: &[(String, String)], key: &str) -> Result<Option<i32>, ApiError> {
    match find_param(params, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(|v| if v == 0 { None } else { Some(v) })
            .map_err(|_| ApiError::BadRequest(format!("{key} must be an integer"))),
    }
}

fn parse_u32_param(params: &[(String, String)], key: &str) -> Result<Option<u32>, ApiError> {
    match find_param(params, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(|v| if v == 0 { None } else { Some(v) })
            .map_err(|_| ApiError::BadRequest(format!("{key} must be a non-negative integer"))),
    }
}

pub async fn dispatch(State(state): State<AppState>, req: Request<Body>) -> Response {
    state.queries.increment();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let Some(parsed) = parse_path(&path) else {
        return ApiError::BadRequest("unknown entity or malformed path".to_string()).into_response();
    };

    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::BadRequest("failed to read request body".to_string()).into_response(),
    };

    match route(&state, &method, &parsed, &query, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn route(state: &AppState, method: &Method, parsed: &ParsedPath, query: &str, body: &[u8]) -> ApiResult<Response> {
    let is_get = *method == Method::GET;

    if !is_get && matches!(parsed.id_or_new, IdOrNew::New) {
        return create(state, parsed.entity, body).await;
    }

    let IdOrNew::Id(id) = parsed.id_or_new else {
        // GET .../new isn't a route this API serves; treat like any other
        // nonexistent id.
        return Err(ApiError::NotFound);
    };
    if id <= 0 {
        return Err(ApiError::NotFound);
    }

    if !is_get {
        return update(state, parsed.entity, id, body).await;
    }

    match (&parsed.action, parsed.entity) {
        (None, _) => get_entity(state, parsed.entity, id),
        (Some(action), Entity::Users) if action == "visits" => user_visits(state, id, query),
        (Some(action), Entity::Locations) if action == "avg" => location_avg(state, id, query),
        _ => Err(ApiError::BadRequest("unknown action".to_string())),
    }
}

async fn create(state: &AppState, entity: Entity, body: &[u8]) -> ApiResult<Response> {
    match entity {
        Entity::Users => {
            let create: dto::UserCreate =
                serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.create_user(create)?;
        }
        Entity::Locations => {
            let create: dto::LocationCreate =
                serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.create_location(create)?;
        }
        Entity::Visits => {
            let create: dto::VisitCreate =
                serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.create_visit(create)?;
        }
    }
    Ok(empty_ok())
}

async fn update(state: &AppState, entity: Entity, id: i32, body: &[u8]) -> ApiResult<Response> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Existence is probed before any field-level validation, per the
    // 404-over-400 priority rule for a structurally valid update body.
    // Uses the cheap containment check rather than `get_*`, which would
    // clone the whole record (timeline/mark cache included) just to throw
    // it away.
    let exists = match entity {
        Entity::Users => state.engine.contains_user(id),
        Entity::Locations => state.engine.contains_location(id),
        Entity::Visits => state.engine.contains_visit(id),
    };
    if !exists {
        return Err(ApiError::NotFound);
    }
    if dto::body_carries_id(&raw) {
        return Err(ApiError::BadRequest("id must not appear in an update payload".to_string()));
    }

    match entity {
        Entity::Users => {
            let update: dto::UserUpdate = serde_json::from_value(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.update_user(id, update)?;
        }
        Entity::Locations => {
            let update: dto::LocationUpdate =
                serde_json::from_value(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.update_location(id, update)?;
        }
        Entity::Visits => {
            let update: dto::VisitUpdate = serde_json::from_value(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state.engine.update_visit(id, update)?;
        }
    }
    Ok(empty_ok())
}

fn get_entity(state: &AppState, entity: Entity, id: i32) -> ApiResult<Response> {
    let value = match entity {
        Entity::Users => state
            .engine
            .get_user(id)
            .map(|u| dto::user_to_value(&u))
            .ok_or(ApiError::NotFound)?,
        Entity::Locations => state
            .engine
            .get_location(id)
            .map(|l| serde_json::to_value(dto::LocationView::from_location(&l, &state.engine.countries)).unwrap())
            .ok_or(ApiError::NotFound)?,
        Entity::Visits => state
            .engine
            .get_visit(id)
            .map(|v| dto::visit_to_value(&v))
            .ok_or(ApiError::NotFound)?,
    };
    Ok(axum::Json(value).into_response())
}

fn user_visits(state: &AppState, id: i32, query: &str) -> ApiResult<Response> {
    let params = parse_query(query)?;
    let country_idx = match find_param(&params, "country") {
        None => None,
        Some(raw) => {
            let decoded = urlencoding::decode(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            Some(state.engine.countries.find(&decoded))
        }
    };
    let filter = UserVisitsFilter {
        from_date: parse_i32_param(&params, "fromDate")?,
        to_date: parse_i32_param(&params, "toDate")?,
        country_idx,
        to_distance: parse_u32_param(&params, "toDistance")?,
    };
    let response = state.engine.user_visits(id, &filter).ok_or(ApiError::NotFound)?;
    Ok(axum::Json(response).into_response())
}

fn location_avg(state: &AppState, id: i32, query: &str) -> ApiResult<Response> {
    let params = parse_query(query)?;
    let gender = match find_param(&params, "gender") {
        None => None,
        Some(raw) => {
            Some(dto::gender_from_str(raw).ok_or_else(|| ApiError::BadRequest("gender must be 'm' or 'f'".to_string()))?)
        }
    };
    let filter = LocationAvgFilter {
        from_date: parse_i32_param(&params, "fromDate")?,
        to_date: parse_i32_param(&params, "toDate")?,
        from_age: parse_u32_param(&params, "fromAge")?,
        to_age: parse_u32_param(&params, "toAge")?,
        gender,
    };
    let response = state
        .engine
        .location_avg(id, &filter, &state.ages)
        .ok_or(ApiError::NotFound)?;
    Ok(axum::Json(response).into_response())
}

fn empty_ok() -> Response {
    ([(axum::http::header::CONTENT_TYPE, "application/json")], "{}").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_path_splits_entity_id_action() {
        let parsed = parse_path("/users/5/visits").unwrap();
        assert_eq!(parsed.entity, Entity::Users);
        assert!(matches!(parsed.id_or_new, IdOrNew::Id(5)));
        assert_eq!(parsed.action.as_deref(), Some("visits"));
    }

    #[test]
    fn parse_path_rejects_unknown_entity() {
        assert!(parse_path("/widgets/5").is_none());
    }

    #[test]
    fn parse_path_new_is_not_numeric() {
        let parsed = parse_path("/users/new").unwrap();
        assert!(matches!(parsed.id_or_new, IdOrNew::New));
    }

    #[test]
    fn parse_path_non_numeric_id_becomes_zero() {
        let parsed = parse_path("/users/abc").unwrap();
        assert!(matches!(parsed.id_or_new, IdOrNew::Id(0)));
    }

    #[test]
    fn parse_query_rejects_missing_equals() {
        assert!(parse_query("fromDate").is_err());
    }

    #[test]
    fn parse_query_rejects_empty_value() {
        assert!(parse_query("fromDate=").is_err());
    }

    #[test]
    fn parse_query_parses_pairs() {
        let params = parse_query("fromDate=100&toDate=200").unwrap();
        assert_eq!(find_param(&params, "fromDate"), Some("100"));
        assert_eq!(find_param(&params, "toDate"), Some("200"));
    }
}
