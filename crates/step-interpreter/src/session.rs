//! Session load/save actions: cookies plus the current origin's local
//! storage, delegated to the session store.

use crate::errors::{tolerable, InterpreterError};
use page_primitives::{BrowsingContext, OriginState, Page};
use session_store::SessionStore;
use tracing::{debug, warn};
use webharvest_core_types::ActionResult;

const LOCAL_STORAGE_DUMP: &str = "(() => { const out = {}; for (let i = 0; i < localStorage.length; i++) { const key = localStorage.key(i); out[key] = localStorage.getItem(key); } return out; })()";

pub(crate) async fn save(
    store: &SessionStore,
    page: &dyn Page,
    context: &dyn BrowsingContext,
    name: &str,
    ttl_hours: Option<u64>,
) -> Result<ActionResult, InterpreterError> {
    let cookies = match context.cookies().await {
        Ok(cookies) => cookies,
        Err(err) => {
            let err = tolerable(err)?;
            return Ok(ActionResult::fail(format!(
                "could not read cookies for session `{name}`: {err}"
            )));
        }
    };

    // Local storage is captured for the origin the page is currently on;
    // a dump failure degrades to a cookies-only snapshot.
    let mut origins = Vec::new();
    match page.current_origin().await {
        Ok(origin) => match page.evaluate(LOCAL_STORAGE_DUMP).await {
            Ok(serde_json::Value::Object(map)) => {
                let local_storage = map
                    .into_iter()
                    .filter_map(|(key, value)| value.as_str().map(|s| (key, s.to_string())))
                    .collect();
                origins.push(OriginState {
                    origin,
                    local_storage,
                });
            }
            Ok(_) => debug!(session = name, "local storage dump returned nothing"),
            Err(err) => {
                let err = tolerable(err)?;
                warn!(session = name, "local storage dump failed, saving cookies only: {err}");
            }
        },
        Err(err) => {
            let err = tolerable(err)?;
            warn!(session = name, "could not resolve page origin: {err}");
        }
    }

    let cookie_count = cookies.len();
    match store.save(name, cookies, origins, ttl_hours).await {
        Ok(()) => Ok(ActionResult::ok(format!(
            "session `{name}` saved ({cookie_count} cookie(s))"
        ))),
        Err(err) => Ok(ActionResult::fail(format!(
            "failed to save session `{name}`: {err}"
        ))),
    }
}

pub(crate) async fn load(
    store: &SessionStore,
    page: &dyn Page,
    context: &dyn BrowsingContext,
    name: &str,
) -> Result<ActionResult, InterpreterError> {
    let Some(snapshot) = store.load(name).await else {
        return Ok(ActionResult::fail(format!(
            "session `{name}` missing, malformed or expired"
        )));
    };

    if let Err(err) = context.add_cookies(&snapshot.cookies).await {
        let err = tolerable(err)?;
        return Ok(ActionResult::fail(format!(
            "could not restore cookies for session `{name}`: {err}"
        )));
    }

    match page.current_origin().await {
        Ok(origin) => {
            if let Some(state) = snapshot.origins.iter().find(|o| o.origin == origin) {
                if let Err(err) = page.evaluate(&restore_script(state)).await {
                    let err = tolerable(err)?;
                    warn!(session = name, origin, "local storage restore failed: {err}");
                }
            }
        }
        Err(err) => {
            let err = tolerable(err)?;
            debug!(session = name, "could not resolve page origin: {err}");
        }
    }

    Ok(ActionResult::ok(format!(
        "session `{name}` restored ({} cookie(s))",
        snapshot.cookies.len()
    )))
}

fn restore_script(state: &OriginState) -> String {
    let items =
        serde_json::to_string(&state.local_storage).unwrap_or_else(|_| "{}".to_string());
    format!(
        "(() => {{ const items = {items}; for (const [key, value] of Object.entries(items)) localStorage.setItem(key, value); return true; }})()"
    )
}
