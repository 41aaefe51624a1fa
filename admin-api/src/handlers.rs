//! inform/set/update/del route handlers (§6)
//!
//! grounded on `original_source/api/views.go`'s `inform`/`setOptions`/
//! `setBind`/`setACL`/`setReserve`/`updateOptions`/`updateBind`/`updateACL`/
//! `deleteBind`/`deleteACL`/`deleteReserve`.

use axum::extract::{Extension, Path, Query};
use axum::Json;

use dhcpd_core::error::Error;

use crate::models::{
    AclDeleteQuery, AclRequest, BindDeleteQuery, BindingRequest, OptionsRequest, ReserveDeleteQuery,
    ReserveRequest, ResMsg,
};
use crate::validation;
use crate::AppState;

fn store_err(err: Error) -> ResMsg {
    ResMsg::error(err)
}

/// `GET /api/v1/inform/{tag}`
pub async fn inform(
    Extension(state): Extension<AppState>,
    Path(tag): Path<String>,
) -> ResMsg {
    match tag.as_str() {
        "options" => match state.cache.query(state.store.as_ref()).await {
            Ok(opts) => ResMsg::success(opts),
            Err(err) => ResMsg::error(err),
        },
        "leases" => match state.store.lease_list().await {
            Ok(leases) => ResMsg::success(leases),
            Err(err) => store_err(err),
        },
        "acl" => match state.store.acl_list().await {
            Ok(rules) => ResMsg::success(rules),
            Err(err) => store_err(err),
        },
        "bind" => match state.store.binding_list().await {
            Ok(bindings) => ResMsg::success(bindings),
            Err(err) => store_err(err),
        },
        "reserve" => match state.store.reservation_list().await {
            Ok(reservations) => ResMsg::success(reservations),
            Err(err) => store_err(err),
        },
        other => ResMsg::error(format!("unknown inform tag {other:?}")),
    }
}

/// `POST /api/v1/set/options`
///
/// fails if an Options row already exists (§3 invariant 4); use
/// `update/options` to change it in place.
pub async fn set_options(
    Extension(state): Extension<AppState>,
    Json(req): Json<OptionsRequest>,
) -> ResMsg {
    let options = match validation::validate_options(req) {
        Ok(options) => options,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.options_create(&options).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `PUT /api/v1/update/options`
pub async fn update_options(
    Extension(state): Extension<AppState>,
    Json(req): Json<OptionsRequest>,
) -> ResMsg {
    let options = match validation::validate_options(req) {
        Ok(options) => options,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.options_save(&options).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `POST /api/v1/set/bind`
pub async fn set_bind(
    Extension(state): Extension<AppState>,
    Json(req): Json<BindingRequest>,
) -> ResMsg {
    let binding = match validation::validate_binding(state.store.as_ref(), req).await {
        Ok(binding) => binding,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.binding_create(&binding).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `PUT /api/v1/update/bind`
pub async fn update_bind(
    Extension(state): Extension<AppState>,
    Json(req): Json<BindingRequest>,
) -> ResMsg {
    let binding = match validation::validate_binding(state.store.as_ref(), req).await {
        Ok(binding) => binding,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.binding_save(&binding).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `DELETE /api/v1/del/bind?mac=...&ip=...`
pub async fn del_bind(
    Extension(state): Extension<AppState>,
    Query(query): Query<BindDeleteQuery>,
) -> ResMsg {
    let mac = match validation::parse_optional_mac(query.mac.as_deref()) {
        Ok(mac) => mac,
        Err(err) => return ResMsg::error(err),
    };
    let ip = match validation::parse_optional_ip(query.ip.as_deref()) {
        Ok(ip) => ip,
        Err(err) => return ResMsg::error(err),
    };
    if mac.is_none() && ip.is_none() {
        return ResMsg::error("please specify a valid mac or ip");
    }
    match state.store.binding_delete(mac, ip).await {
        Ok(_) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `POST /api/v1/set/acl`
pub async fn set_acl(
    Extension(state): Extension<AppState>,
    Json(req): Json<AclRequest>,
) -> ResMsg {
    let rule = match validation::validate_acl(req) {
        Ok(rule) => rule,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.acl_create(&rule).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `PUT /api/v1/update/acl`
pub async fn update_acl(
    Extension(state): Extension<AppState>,
    Json(req): Json<AclRequest>,
) -> ResMsg {
    let rule = match validation::validate_acl(req) {
        Ok(rule) => rule,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.acl_save(&rule).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `DELETE /api/v1/del/acl?mac=...`
pub async fn del_acl(
    Extension(state): Extension<AppState>,
    Query(query): Query<AclDeleteQuery>,
) -> ResMsg {
    let mac = match query.mac.as_deref() {
        Some(mac) => mac,
        None => return ResMsg::error("mac is required"),
    };
    let mac = match validation::parse_optional_mac(Some(mac)) {
        Ok(Some(mac)) => mac,
        Ok(None) => unreachable!(),
        Err(err) => return ResMsg::error(err),
    };
    match state.store.acl_delete(mac).await {
        Ok(_) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `POST /api/v1/set/reserve`
pub async fn set_reserve(
    Extension(state): Extension<AppState>,
    Json(req): Json<ReserveRequest>,
) -> ResMsg {
    let reservation = match validation::validate_reservation(state.store.as_ref(), req).await {
        Ok(reservation) => reservation,
        Err(err) => return ResMsg::error(err),
    };
    match state.store.reservation_create(&reservation).await {
        Ok(()) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}

/// `DELETE /api/v1/del/reserve?ip=...`
pub async fn del_reserve(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReserveDeleteQuery>,
) -> ResMsg {
    let ip = match query.ip.as_deref() {
        Some(ip) => ip,
        None => return ResMsg::error("invalid ip address"),
    };
    let addr = match validation::parse_optional_ip(Some(ip)) {
        Ok(Some(addr)) => addr,
        Ok(None) => unreachable!(),
        Err(err) => return ResMsg::error(err),
    };
    match state.store.reservation_delete(addr).await {
        Ok(_) => ResMsg::success("success"),
        Err(err) => store_err(err),
    }
}
