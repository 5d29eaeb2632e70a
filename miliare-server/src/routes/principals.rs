//! Group and affiliation administration

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use miliare_core::policy::is_platform_admin;
use miliare_core::{can_access, Group, Principal, PrincipalId, Requirement};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use super::session::require_principal;
use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{Affiliation, DataStore, SessionStore};
use crate::workflow::load_company;

fn load_principal<D: DataStore + ?Sized>(store: &D, id: &PrincipalId) -> Result<Principal, ServerError> {
    store
        .get_principal(id)?
        .ok_or_else(|| ServerError::not_found("principal", id.as_str()))
}

/// Check that `actor` may replace `target`'s groups with `groups`.
///
/// Granting or revoking `admin` needs the super-role itself, and nobody
/// grants `admin` to themselves.
fn check_group_change(
    actor: &Principal,
    target: &Principal,
    groups: &BTreeSet<Group>,
) -> Result<(), ServerError> {
    if !is_platform_admin(actor) {
        return Err(ServerError::forbidden("changing groups requires an admin"));
    }

    let had_admin = target.has_group(&Group::Admin);
    let gets_admin = groups.contains(&Group::Admin);
    if had_admin == gets_admin {
        return Ok(());
    }
    if !can_access(Some(actor), &Requirement::super_role()) {
        return Err(ServerError::forbidden("only admins grant or revoke admin"));
    }
    if gets_admin && actor.id == target.id {
        return Err(ServerError::forbidden("admin cannot be self-granted"));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct SetGroupsRequest {
    pub groups: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetGroupsResponse {
    pub success: bool,
    pub principal_id: PrincipalId,
    pub groups: BTreeSet<Group>,
}

/// PUT /api/principals/:principal_id/groups
pub async fn set_groups<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(principal_id): Path<String>,
    Json(req): Json<SetGroupsRequest>,
) -> Result<Json<SetGroupsResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let actor = require_principal(&state, &cookies, &headers)?;
    if !is_platform_admin(&actor) {
        return Err(ServerError::forbidden("changing groups requires an admin"));
    }

    let target = load_principal(state.data_store.as_ref(), &PrincipalId(principal_id))?;
    let groups: BTreeSet<Group> = req
        .groups
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .map(Group::from)
        .collect();

    if let Err(e) = check_group_change(&actor, &target, &groups) {
        tracing::warn!(
            principal_id = %target.id,
            actor = %actor.id,
            "Rejected change to admin membership"
        );
        return Err(e);
    }

    state.data_store.set_groups(&target.id, &groups)?;

    tracing::info!(
        principal_id = %target.id,
        actor = %actor.id,
        groups = ?groups,
        "Groups updated"
    );

    Ok(Json(SetGroupsResponse {
        success: true,
        principal_id: target.id,
        groups,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliationResponse {
    pub success: bool,
    pub principal_id: PrincipalId,
    pub affiliation: Affiliation,
}

/// PUT /api/principals/:principal_id/affiliation
///
/// Company and upline are assigned by admins, never self-declared. Referenced
/// companies and leads must exist.
pub async fn set_affiliation<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(principal_id): Path<String>,
    Json(affiliation): Json<Affiliation>,
) -> Result<Json<AffiliationResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let actor = require_principal(&state, &cookies, &headers)?;
    if !is_platform_admin(&actor) {
        return Err(ServerError::forbidden("changing affiliations requires an admin"));
    }

    let store = state.data_store.as_ref();
    let target = load_principal(store, &PrincipalId(principal_id))?;
    if let Some(company_id) = &affiliation.company_id {
        load_company(store, company_id)?;
    }
    for lead in [&affiliation.team_lead_id, &affiliation.org_lead_id].into_iter().flatten() {
        if lead == &target.id {
            return Err(miliare_core::Error::Validation("a principal cannot be their own lead".into()).into());
        }
        load_principal(store, lead)?;
    }

    store.set_affiliation(&target.id, &affiliation)?;

    tracing::info!(
        principal_id = %target.id,
        actor = %actor.id,
        company_id = ?affiliation.company_id,
        "Affiliation updated"
    );

    Ok(Json(AffiliationResponse {
        success: true,
        principal_id: target.id,
        affiliation,
    }))
}
